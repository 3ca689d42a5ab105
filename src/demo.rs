use crate::inodefs::{
    config::FsConfig,
    dir::OpenMode,
    fs::{FsStats, InodeFS},
    types::Record,
    BLOCK_SIZE,
};
use byte_unit::Byte;
use log::info;
use std::{fs, path::Path};

const DEFAULT_CONTENT: &str = "Four score and seven years ago our fathers brought forth \
on this continent a new nation, conceived in liberty, and dedicated to the \
proposition that all men are created equal.\n";
const SUBDIR_CONTENT: &[u8] = b"Help I'm stuck in a virtual file System\n    ";

pub fn run<P: AsRef<Path>>(config: &FsConfig, input: Option<P>) -> anyhow::Result<()> {
    let content = match input {
        Some(path) => fs::read(path.as_ref())?,
        None => DEFAULT_CONTENT.as_bytes().to_vec(),
    };

    let mut fs = InodeFS::format(config)?;
    let root_index = fs.superblock().root_inode;
    let root = fs.root_inode()?;

    let (mut file, file_index) = fs
        .open(OpenMode::Create, "Text.txt", &root)?
        .ok_or_else(|| anyhow!("Text.txt was not created"))?;
    fs.write(&mut file, file_index, &content)?;
    let read_back = fs.read(&file)?;
    if read_back.get(..content.len()) != Some(&content[..]) {
        return Err(anyhow!("Text.txt does not read back what was written"));
    }
    println!(
        "Text.txt (inode {}): {}",
        file_index,
        String::from_utf8_lossy(&read_back[..content.len()])
    );

    let (_, dir_index) = fs
        .open(OpenMode::Create, "NewDir", &root)?
        .ok_or_else(|| anyhow!("NewDir was not created"))?;
    let (block, mut dir) = fs.create_directory(root_index, dir_index)?;
    fs.write(&mut dir, dir_index, &block.encode()?)?;

    let (mut nested, nested_index) = fs
        .open(OpenMode::Create, "FileInSubdir", &dir)?
        .ok_or_else(|| anyhow!("FileInSubdir was not created"))?;
    fs.write(&mut nested, nested_index, SUBDIR_CONTENT)?;

    let (nested, _) = fs
        .open(OpenMode::Read, "FileInSubdir", &dir)?
        .ok_or_else(|| anyhow!("FileInSubdir cannot be found"))?;
    let read_back = fs.read(&nested)?;
    println!(
        "NewDir/FileInSubdir (inode {}): {}",
        nested_index,
        String::from_utf8_lossy(&read_back[..SUBDIR_CONTENT.len()])
    );

    println!("/");
    for (name, index) in fs.list(&root)? {
        println!("  {:<20} {}", name, index);
    }
    print_stats(&fs.statfs());

    info!("removing Text.txt");
    fs.unlink_name("Text.txt", &root)?;
    let (archive, archive_index) = fs.mkdir("Archive", root_index)?;
    print_stats(&fs.statfs());

    let fs = InodeFS::mount(fs.into_store(), config.options)?;
    let root = fs.root_inode()?;
    let (_, found) = fs
        .lookup(&root, "Archive")?
        .ok_or_else(|| anyhow!("Archive is missing after remount"))?;
    if found != archive_index || !fs.list(&archive)?.is_empty() {
        return Err(anyhow!("Archive changed across remount"));
    }
    println!("remounted, root now holds:");
    for (name, index) in fs.list(&root)? {
        println!("  {:<20} {}", name, index);
    }

    Ok(())
}

pub fn statfs(config: &FsConfig) -> anyhow::Result<()> {
    let fs = InodeFS::format(config)?;
    let sb = fs.superblock();

    println!("superblock          block 0");
    println!("inode bitmap        block {}", sb.inode_bitmap_start);
    println!("block bitmap        block {}", sb.block_bitmap_start);
    println!("inode table         block {}", sb.inode_table_start);
    println!("data region         block {}", sb.data_region_start);
    println!("root inode          {}", sb.root_inode);
    print_stats(&fs.statfs());

    Ok(())
}

fn print_stats(stats: &FsStats) {
    let size = |blocks: u32| {
        Byte::from_bytes((blocks as u64 * BLOCK_SIZE as u64) as _).get_appropriate_unit(true)
    };

    println!(
        "{} blocks ({}), {} free of {} data blocks ({} free), {} of {} inodes free",
        stats.blocks,
        size(stats.blocks),
        stats.free_blocks,
        stats.data_blocks,
        size(stats.free_blocks),
        stats.free_inodes,
        stats.inodes
    );
}
