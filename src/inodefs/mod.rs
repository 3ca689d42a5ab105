pub mod config;
pub mod dir;
pub mod error;
pub mod file;
pub mod fs;
pub mod store;
pub mod types;
pub mod util;

const INODEFS_MAGIC: u32 = 0x1b0d_e5f5;
const LAYOUT_VERSION: u16 = 1;

pub const BLOCK_SIZE: usize = 1024;
pub const INODE_SIZE: usize = 64;
pub const SUPERBLOCK_INDEX: u32 = 0;
pub const ROOT_INODE: u32 = 1;
pub const NULL_INODE: u32 = 0;
pub const NULL_BLOCK: u32 = 0;

pub const DIRECT_POINTERS: usize = 3;
pub const INDIRECT_POINTERS: usize = 128;
pub const MAX_FILE_BLOCKS: usize = DIRECT_POINTERS + INDIRECT_POINTERS;

pub const DIR_ENTRIES: usize = 32;
pub const NAME_LEN: usize = 20;
