use super::{error::FsError, BLOCK_SIZE, INODE_SIZE, SUPERBLOCK_INDEX};
use std::time::{self, SystemTime};

pub fn calculate_checksum<S>(kind: &'static str, s: &S) -> Result<u32, FsError>
where
    S: serde::Serialize,
{
    let bytes = bincode::serialize(s).map_err(|e| FsError::corrupt(kind, e))?;
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&bytes);
    Ok(hasher.finalize())
}

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn blocks_for(bytes: u64) -> u32 {
    ((bytes + BLOCK_SIZE as u64 - 1) / BLOCK_SIZE as u64) as u32
}

// Bitmaps spend one byte per tracked slot.
pub fn inode_bitmap_blocks(inode_count: u32) -> u32 {
    blocks_for(inode_count as u64)
}

pub fn block_bitmap_blocks(block_count: u32) -> u32 {
    blocks_for(block_count as u64)
}

pub fn inode_table_blocks(inode_count: u32) -> u32 {
    blocks_for(inode_count as u64 * INODE_SIZE as u64)
}

pub fn inode_bitmap_start() -> u32 {
    SUPERBLOCK_INDEX + 1
}

pub fn block_bitmap_start(inode_count: u32) -> u32 {
    inode_bitmap_start() + inode_bitmap_blocks(inode_count)
}

pub fn inode_table_start(inode_count: u32, block_count: u32) -> u32 {
    block_bitmap_start(inode_count) + block_bitmap_blocks(block_count)
}

pub fn data_region_start(inode_count: u32, block_count: u32) -> u32 {
    inode_table_start(inode_count, block_count) + inode_table_blocks(inode_count)
}
