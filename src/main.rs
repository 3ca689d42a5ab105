#[macro_use]
extern crate anyhow;
extern crate bincode;
extern crate bitvec;
extern crate byte_unit;
extern crate clap;
extern crate crc32fast;
extern crate serde;

mod demo;
mod inodefs;

use clap::{Arg, ArgMatches, Command};
use inodefs::config::{FsConfig, DEFAULT_BLOCK_COUNT, DEFAULT_INODE_COUNT};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let inodes = DEFAULT_INODE_COUNT.to_string();
    let blocks = DEFAULT_BLOCK_COUNT.to_string();
    let geometry = [
        Arg::new("inodes")
            .short('i')
            .long("inodes")
            .takes_value(true)
            .help("Number of inode slots, slot 0 is reserved")
            .default_value(&inodes),
        Arg::new("blocks")
            .short('b')
            .long("blocks")
            .takes_value(true)
            .help("Total number of 1 KiB blocks on the device, metadata included")
            .default_value(&blocks),
        Arg::new("reclaim")
            .long("reclaim")
            .help("Return the data blocks of unlinked files to the free pool"),
    ];

    let matches = Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .subcommand_required(true)
        .subcommand(
            Command::new("demo")
                .about("Format a device and walk through files and directories on it")
                .args(geometry.clone())
                .arg(
                    Arg::new("input")
                        .long("input")
                        .takes_value(true)
                        .help("Host file whose content is copied into the first file"),
                ),
        )
        .subcommand(
            Command::new("statfs")
                .about("Format a device and print its layout")
                .args(geometry),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("demo", matches)) => {
            let config = config_from(matches)?;
            demo::run(&config, matches.value_of("input"))
        }
        Some(("statfs", matches)) => demo::statfs(&config_from(matches)?),
        _ => Err(anyhow!("unknown subcommand")),
    }
}

fn config_from(matches: &ArgMatches) -> anyhow::Result<FsConfig> {
    let inode_count = parse_count(matches, "inodes")?;
    let block_count = parse_count(matches, "blocks")?;

    Ok(FsConfig::new(inode_count, block_count).with_reclaim(matches.is_present("reclaim")))
}

fn parse_count(matches: &ArgMatches, name: &str) -> anyhow::Result<u32> {
    let value = matches
        .value_of(name)
        .ok_or_else(|| anyhow!("--{} is required", name))?;

    value
        .parse::<u32>()
        .map_err(|e| anyhow!("invalid --{} {:?}: {}", name, value, e))
}
