use super::{error::FsError, util, ROOT_INODE};

pub const DEFAULT_INODE_COUNT: u32 = 512;
pub const DEFAULT_BLOCK_COUNT: u32 = 6184;

#[derive(Debug, Clone, Copy)]
pub struct FsConfig {
    pub inode_count: u32,
    pub block_count: u32,
    pub options: FsOptions,
}

/// Behaviour switches that do not change the on-device layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsOptions {
    /// Return the data blocks of an unlinked inode to the block bitmap.
    pub reclaim_on_unlink: bool,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            inode_count: DEFAULT_INODE_COUNT,
            block_count: DEFAULT_BLOCK_COUNT,
            options: FsOptions::default(),
        }
    }
}

impl FsConfig {
    pub fn new(inode_count: u32, block_count: u32) -> Self {
        Self {
            inode_count,
            block_count,
            ..Self::default()
        }
    }

    pub fn with_reclaim(mut self, reclaim_on_unlink: bool) -> Self {
        self.options.reclaim_on_unlink = reclaim_on_unlink;
        self
    }

    pub fn validate(&self) -> Result<(), FsError> {
        if self.inode_count <= ROOT_INODE + 1 {
            return Err(FsError::InvalidGeometry(format!(
                "at least {} inode slots are needed, got {}",
                ROOT_INODE + 2,
                self.inode_count
            )));
        }

        let data_start = util::data_region_start(self.inode_count, self.block_count);
        if data_start >= self.block_count {
            return Err(FsError::InvalidGeometry(format!(
                "{} blocks cannot hold the metadata regions ({} blocks) and any data",
                self.block_count, data_start
            )));
        }

        Ok(())
    }
}
