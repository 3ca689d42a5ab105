use super::{
    config::{FsConfig, FsOptions},
    error::{FsError, Result},
    store::BlockStore,
    types::{Bitmap, DirectoryBlock, Inode, Record, Superblock},
    BLOCK_SIZE, INODE_SIZE, NULL_INODE, SUPERBLOCK_INDEX,
};
use log::{debug, info};

#[derive(Debug)]
pub struct InodeFS {
    pub(super) store: BlockStore,
    pub(super) sb: Superblock,
    pub(super) inode_bitmap: Bitmap,
    pub(super) block_bitmap: Bitmap,
    pub(super) options: FsOptions,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FsStats {
    pub block_size: u32,
    pub blocks: u32,
    pub data_blocks: u32,
    pub free_blocks: u32,
    pub inodes: u32,
    pub free_inodes: u32,
}

impl InodeFS {
    /// Formats a brand new device: superblock, both bitmaps, an all-invalid
    /// inode table and the root directory.
    pub fn format(config: &FsConfig) -> Result<Self> {
        config.validate()?;

        let sb = Superblock::new(config);
        let mut fs = Self {
            store: BlockStore::new(config.block_count),
            inode_bitmap: Bitmap::new(sb.inode_count as usize),
            block_bitmap: Bitmap::new(sb.block_count as usize),
            sb,
            options: config.options,
        };

        // Initialize starts from a blank device
        fs.store.zero();
        fs.store.write_block(SUPERBLOCK_INDEX, &fs.sb.encode()?);
        fs.save_bitmaps()?;
        for index in 0..fs.sb.inode_count {
            fs.put_inode(index, &Inode::default())?;
        }
        fs.create_root()?;

        info!(
            "formatted {} blocks with {} inodes, data region starts at block {}",
            fs.sb.block_count, fs.sb.inode_count, fs.sb.data_region_start
        );

        Ok(fs)
    }

    /// Rebuilds a context from a device that was formatted before.
    pub fn mount(store: BlockStore, options: FsOptions) -> Result<Self> {
        let sb = Superblock::decode(store.block(SUPERBLOCK_INDEX))?;
        if sb.block_count != store.block_count() {
            return Err(FsError::corrupt(
                Superblock::KIND,
                format!(
                    "superblock describes {} blocks but the device has {}",
                    sb.block_count,
                    store.block_count()
                ),
            ));
        }

        let inode_bitmap =
            Bitmap::decode(store.region(sb.inode_bitmap_start, sb.inode_count as usize))?;
        let block_bitmap =
            Bitmap::decode(store.region(sb.block_bitmap_start, sb.block_count as usize))?;

        info!(
            "mounted {} blocks, {} of {} inodes in use",
            sb.block_count,
            inode_bitmap.count_set(),
            sb.inode_count
        );

        Ok(Self {
            store,
            sb,
            inode_bitmap,
            block_bitmap,
            options,
        })
    }

    pub fn into_store(self) -> BlockStore {
        self.store
    }

    pub fn superblock(&self) -> Superblock {
        self.sb.clone()
    }

    pub fn root_inode(&self) -> Result<Inode> {
        self.get_inode(self.sb.root_inode)
    }

    pub fn statfs(&self) -> FsStats {
        let data_blocks = self.sb.block_count - self.sb.data_region_start;
        let used_data_blocks = (self.sb.data_region_start as usize..self.block_bitmap.len())
            .filter(|&i| self.block_bitmap.is_set(i))
            .count() as u32;
        // slot 0 is never handed out
        let usable_inodes = self.sb.inode_count - 1;

        FsStats {
            block_size: self.sb.block_size,
            blocks: self.sb.block_count,
            data_blocks,
            free_blocks: data_blocks - used_data_blocks,
            inodes: usable_inodes,
            free_inodes: usable_inodes - self.inode_bitmap.count_set() as u32,
        }
    }

    fn create_root(&mut self) -> Result<()> {
        let root = self.sb.root_inode;
        self.inode_bitmap.set(root as usize);
        self.save_bitmap_bit(BitmapKind::Inode, root as usize);

        let mut inode = Inode::new();
        inode.is_directory = true;
        inode.direct_blocks[0] = self.allocate_block()?;
        self.put_inode(root, &inode)?;

        let (block, _) = self.create_directory(NULL_INODE, root)?;
        self.store.write_block(inode.direct_blocks[0], &block.encode()?);

        debug!(
            "root directory is inode {} in block {}",
            root, inode.direct_blocks[0]
        );
        Ok(())
    }

    /// Claims the first free inode after the root and persists a fresh
    /// regular-file record in its slot.
    pub fn allocate_inode(&mut self) -> Result<(Inode, u32)> {
        let first = self.sb.root_inode as usize + 1;
        let index = self
            .inode_bitmap
            .first_clear_from(first)
            .ok_or(FsError::ExhaustedInodes)?;

        self.inode_bitmap.set(index);
        self.save_bitmap_bit(BitmapKind::Inode, index);

        let inode = Inode::new();
        self.put_inode(index as u32, &inode)?;

        debug!("allocated inode {}", index);
        Ok((inode, index as u32))
    }

    /// Claims the first free block of the data region. The block's previous
    /// contents are left as they are.
    pub fn allocate_block(&mut self) -> Result<u32> {
        let index = self
            .block_bitmap
            .first_clear_from(self.sb.data_region_start as usize)
            .ok_or(FsError::ExhaustedBlocks)?;

        self.block_bitmap.set(index);
        self.save_bitmap_bit(BitmapKind::Block, index);

        debug!("allocated block {}", index);
        Ok(index as u32)
    }

    pub fn free_inode(&mut self, index: u32) -> Result<()> {
        let mut inode = self.get_inode(index)?;
        inode.is_valid = false;
        self.put_inode(index, &inode)?;

        self.inode_bitmap.clear(index as usize);
        self.save_bitmap_bit(BitmapKind::Inode, index as usize);

        debug!("freed inode {}", index);
        Ok(())
    }

    // Only reachable when `reclaim_on_unlink` is enabled.
    pub(super) fn free_block(&mut self, index: u32) {
        self.block_bitmap.clear(index as usize);
        self.save_bitmap_bit(BitmapKind::Block, index as usize);
        debug!("freed block {}", index);
    }

    pub fn get_inode(&self, index: u32) -> Result<Inode> {
        let (block, offset) = self.inode_location(index)?;
        Inode::decode(&self.store.block(block)[offset..offset + INODE_SIZE])
    }

    pub fn put_inode(&mut self, index: u32, inode: &Inode) -> Result<()> {
        let (block, offset) = self.inode_location(index)?;
        let mut slot = inode.encode()?;
        slot.resize(INODE_SIZE, 0);
        self.store.write_at(block, offset, &slot);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn is_inode_allocated(&self, index: u32) -> bool {
        self.inode_bitmap.is_set(index as usize)
    }

    #[cfg(test)]
    pub(crate) fn is_block_allocated(&self, index: u32) -> bool {
        self.block_bitmap.is_set(index as usize)
    }

    // (block, byte offset inside the block)
    fn inode_location(&self, index: u32) -> Result<(u32, usize)> {
        if index >= self.sb.inode_count {
            return Err(FsError::NotFound(index));
        }

        let byte = index as usize * INODE_SIZE;
        let block = self.sb.inode_table_start + (byte / BLOCK_SIZE) as u32;
        Ok((block, byte % BLOCK_SIZE))
    }

    fn save_bitmaps(&mut self) -> Result<()> {
        for kind in [BitmapKind::Inode, BitmapKind::Block].iter() {
            let (start, bitmap) = self.bitmap(*kind);
            let bytes = bitmap.encode()?;
            for (nth, chunk) in bytes.chunks(BLOCK_SIZE).enumerate() {
                self.store.write_block(start + nth as u32, chunk);
            }
        }

        Ok(())
    }

    // Persists the single bitmap block holding bit `i`.
    fn save_bitmap_bit(&mut self, kind: BitmapKind, i: usize) {
        let (start, bitmap) = self.bitmap(kind);
        let nth = i / BLOCK_SIZE;
        let bytes = bitmap.encode_block(nth);
        self.store.write_block(start + nth as u32, &bytes);
    }

    fn bitmap(&self, kind: BitmapKind) -> (u32, &Bitmap) {
        match kind {
            BitmapKind::Inode => (self.sb.inode_bitmap_start, &self.inode_bitmap),
            BitmapKind::Block => (self.sb.block_bitmap_start, &self.block_bitmap),
        }
    }

    /// Decoded directory block of `dir`.
    pub fn read_directory(&self, dir: &Inode) -> Result<DirectoryBlock> {
        if !dir.is_valid || !dir.is_directory {
            return Err(FsError::InvalidDirectory);
        }
        let block = dir.direct(0).ok_or(FsError::InvalidDirectory)?;
        DirectoryBlock::decode(self.store.block(block))
    }
}

#[derive(Debug, Clone, Copy)]
enum BitmapKind {
    Inode,
    Block,
}
