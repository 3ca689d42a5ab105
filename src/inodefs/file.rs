use super::{
    error::{FsError, Result},
    fs::InodeFS,
    types::{IndirectBlock, Inode, Record},
    util, BLOCK_SIZE, DIRECT_POINTERS, MAX_FILE_BLOCKS, NULL_BLOCK,
};
use log::debug;

impl InodeFS {
    /// Contents of a regular file as whole blocks, in order. The length of a
    /// file is not recorded, so the last block comes back with its padding.
    /// Invalid inodes and directories read as empty.
    pub fn read(&self, inode: &Inode) -> Result<Vec<u8>> {
        if !inode.is_file() {
            return Ok(Vec::new());
        }

        let blocks = self.owned_data_blocks(inode)?;
        let mut content = Vec::with_capacity(blocks.len() * BLOCK_SIZE);
        for block in blocks {
            content.extend_from_slice(self.store.block(block));
        }

        Ok(content)
    }

    /// Stores `data` from the beginning of the file, allocating data blocks
    /// (and the indirect block) on first use, then persists the inode.
    /// Blocks beyond the end of `data` stay attached to the inode.
    pub fn write(&mut self, inode: &mut Inode, index: u32, data: &[u8]) -> Result<()> {
        let max = MAX_FILE_BLOCKS * BLOCK_SIZE;
        if data.len() > max {
            return Err(FsError::FileTooLarge {
                size: data.len(),
                max,
            });
        }

        let mut indirect = None;
        for (position, chunk) in data.chunks(BLOCK_SIZE).enumerate() {
            let block = self.block_at(inode, position, &mut indirect)?;
            self.store.write_at(block, 0, chunk);
        }

        if let Some((location, block)) = indirect {
            self.store.write_block(location, &block.encode()?);
        }

        inode.modified_at = util::now();
        inode.version = inode.version.wrapping_add(1);
        self.put_inode(index, inode)?;

        debug!("wrote {} bytes to inode {}", data.len(), index);
        Ok(())
    }

    // Block backing `position` of the file, allocating it if needed. The
    // indirect block is loaded once per write and kept in `indirect`.
    fn block_at(
        &mut self,
        inode: &mut Inode,
        position: usize,
        indirect: &mut Option<(u32, IndirectBlock)>,
    ) -> Result<u32> {
        if position < DIRECT_POINTERS {
            if inode.direct_blocks[position] == NULL_BLOCK {
                inode.direct_blocks[position] = self.allocate_data_block()?;
            }
            return Ok(inode.direct_blocks[position]);
        }

        let (location, mut block) = match indirect.take() {
            Some(loaded) => loaded,
            None => self.load_indirect(inode)?,
        };

        let slot = position - DIRECT_POINTERS;
        if block.pointers[slot] == NULL_BLOCK {
            block.pointers[slot] = self.allocate_data_block()?;
        }
        let pointer = block.pointers[slot];
        *indirect = Some((location, block));
        Ok(pointer)
    }

    fn load_indirect(&mut self, inode: &mut Inode) -> Result<(u32, IndirectBlock)> {
        match inode.indirect() {
            Some(location) => Ok((location, IndirectBlock::decode(self.store.block(location))?)),
            None => {
                let location = self.allocate_data_block()?;
                inode.indirect_block = location;
                debug!("indirect block of inode is {}", location);
                Ok((location, IndirectBlock::default()))
            }
        }
    }

    fn allocate_data_block(&mut self) -> Result<u32> {
        let block = self.allocate_block()?;
        self.store.zero_block(block);
        Ok(block)
    }

    // Data blocks in read order: the first direct pointer gates the whole
    // file, the other two are taken when set, then the indirect slots up to
    // the first empty one.
    fn owned_data_blocks(&self, inode: &Inode) -> Result<Vec<u32>> {
        let first = match inode.direct(0) {
            Some(block) => block,
            None => return Ok(Vec::new()),
        };

        let mut blocks = vec![first];
        blocks.extend((1..DIRECT_POINTERS).filter_map(|i| inode.direct(i)));
        if let Some(location) = inode.indirect() {
            blocks.extend(IndirectBlock::decode(self.store.block(location))?.blocks());
        }

        Ok(blocks)
    }

    /// Every block attached to `inode`, including its indirect block.
    pub(super) fn owned_blocks(&self, inode: &Inode) -> Result<Vec<u32>> {
        let mut blocks: Vec<u32> = (0..DIRECT_POINTERS).filter_map(|i| inode.direct(i)).collect();
        if let Some(location) = inode.indirect() {
            blocks.extend(IndirectBlock::decode(self.store.block(location))?.blocks());
            blocks.push(location);
        }

        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inodefs::{
        config::FsConfig, dir::OpenMode, fs::tests::make_fs, INDIRECT_POINTERS,
    };

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn new_file(fs: &mut InodeFS, name: &str) -> anyhow::Result<(Inode, u32)> {
        let root = fs.root_inode()?;
        Ok(fs
            .open(OpenMode::Create, name, &root)?
            .ok_or_else(|| anyhow::anyhow!("{} was not created", name))?)
    }

    #[test]
    fn empty_file_reads_empty() -> anyhow::Result<()> {
        let mut fs = make_fs()?;
        let (inode, _) = new_file(&mut fs, "empty")?;
        assert!(fs.read(&inode)?.is_empty());
        Ok(())
    }

    #[test]
    fn read_fails_closed() -> anyhow::Result<()> {
        let fs = make_fs()?;
        assert!(fs.read(&fs.root_inode()?)?.is_empty());
        assert!(fs.read(&Inode::default())?.is_empty());
        Ok(())
    }

    #[test]
    fn write_2500_bytes() -> anyhow::Result<()> {
        let mut fs = InodeFS::format(&FsConfig::new(256, 6184))?;
        let (mut inode, index) = new_file(&mut fs, "a.txt")?;
        let data = pattern(2500);

        fs.write(&mut inode, index, &data)?;
        let content = fs.read(&inode)?;
        assert!(content.len() >= 2500);
        assert_eq!(content.len(), 3 * BLOCK_SIZE);
        assert_eq!(&content[..2500], &data[..]);
        assert!(content[2500..].iter().all(|&b| b == 0));

        assert!(inode.direct(2).is_some());
        assert_eq!(inode.indirect(), None);
        Ok(())
    }

    #[test]
    fn round_trip_various_lengths() -> anyhow::Result<()> {
        let mut fs = make_fs()?;
        for (i, &len) in [1, BLOCK_SIZE - 1, BLOCK_SIZE, BLOCK_SIZE + 1, 4 * BLOCK_SIZE + 17]
            .iter()
            .enumerate()
        {
            let (mut inode, index) = new_file(&mut fs, &format!("f{}", i))?;
            let data = pattern(len);
            fs.write(&mut inode, index, &data)?;

            let content = fs.read(&fs.get_inode(index)?)?;
            assert_eq!(content.len() % BLOCK_SIZE, 0);
            assert_eq!(&content[..len], &data[..]);
        }
        Ok(())
    }

    #[test]
    fn write_persists_inode() -> anyhow::Result<()> {
        let mut fs = make_fs()?;
        let (mut inode, index) = new_file(&mut fs, "persisted")?;
        fs.write(&mut inode, index, b"hello")?;

        let stored = fs.get_inode(index)?;
        assert_eq!(stored.direct_blocks, inode.direct_blocks);
        assert_eq!(stored.version, 1);
        assert!(stored.modified_at >= stored.created_at);
        assert_eq!(&fs.read(&stored)?[..5], b"hello");
        Ok(())
    }

    #[test]
    fn indirect_block_is_populated() -> anyhow::Result<()> {
        let mut fs = make_fs()?;
        let (mut inode, index) = new_file(&mut fs, "big")?;
        let data = pattern(8 * BLOCK_SIZE + 100);

        fs.write(&mut inode, index, &data)?;
        let location = inode.indirect().expect("indirect block");
        let indirect = IndirectBlock::decode(fs.store.block(location))?;
        assert_eq!(indirect.blocks().count(), 6);
        assert!(indirect.pointers[6..].iter().all(|&p| p == NULL_BLOCK));

        let content = fs.read(&fs.get_inode(index)?)?;
        assert_eq!(content.len(), 9 * BLOCK_SIZE);
        assert_eq!(&content[..data.len()], &data[..]);
        Ok(())
    }

    #[test]
    fn largest_file() -> anyhow::Result<()> {
        let mut fs = InodeFS::format(&FsConfig::new(256, 6184))?;
        let (mut inode, index) = new_file(&mut fs, "largest")?;
        let data = pattern(MAX_FILE_BLOCKS * BLOCK_SIZE);

        fs.write(&mut inode, index, &data)?;
        let content = fs.read(&inode)?;
        assert_eq!(content, data);

        let indirect = IndirectBlock::decode(fs.store.block(inode.indirect_block))?;
        assert_eq!(indirect.blocks().count(), INDIRECT_POINTERS);
        Ok(())
    }

    #[test]
    fn too_large_is_rejected_before_allocating() -> anyhow::Result<()> {
        let mut fs = InodeFS::format(&FsConfig::new(256, 6184))?;
        let (mut inode, index) = new_file(&mut fs, "huge")?;
        let free = fs.statfs().free_blocks;

        let data = vec![1u8; MAX_FILE_BLOCKS * BLOCK_SIZE + 1];
        assert!(matches!(
            fs.write(&mut inode, index, &data),
            Err(FsError::FileTooLarge { .. })
        ));
        assert_eq!(fs.statfs().free_blocks, free);
        Ok(())
    }

    #[test]
    fn overwrite_reuses_blocks() -> anyhow::Result<()> {
        let mut fs = make_fs()?;
        let (mut inode, index) = new_file(&mut fs, "again")?;
        fs.write(&mut inode, index, &pattern(5 * BLOCK_SIZE))?;
        let pointers = (inode.direct_blocks, inode.indirect_block);
        let free = fs.statfs().free_blocks;

        fs.write(&mut inode, index, b"short")?;
        assert_eq!((inode.direct_blocks, inode.indirect_block), pointers);
        assert_eq!(fs.statfs().free_blocks, free);
        assert_eq!(inode.version, 2);

        // shrinking keeps the old tail attached
        let content = fs.read(&inode)?;
        assert_eq!(content.len(), 5 * BLOCK_SIZE);
        assert_eq!(&content[..5], b"short");
        assert_eq!(content[5], pattern(6)[5]);
        Ok(())
    }

    #[test]
    fn grow_existing_indirect() -> anyhow::Result<()> {
        let mut fs = make_fs()?;
        let (mut inode, index) = new_file(&mut fs, "grow")?;
        fs.write(&mut inode, index, &pattern(4 * BLOCK_SIZE))?;
        let location = inode.indirect_block;

        let data = pattern(7 * BLOCK_SIZE);
        fs.write(&mut inode, index, &data)?;
        assert_eq!(inode.indirect_block, location);
        assert_eq!(fs.read(&inode)?, data);
        Ok(())
    }

    #[test]
    fn exhausted_blocks_mid_write() -> anyhow::Result<()> {
        // four metadata blocks, eight data blocks with one taken by the root
        let mut fs = InodeFS::format(&FsConfig::new(16, 12))?;
        let (mut inode, index) = new_file(&mut fs, "partial")?;
        assert_eq!(fs.statfs().free_blocks, 7);

        // three direct blocks, the indirect block, then four indirect slots
        let data = vec![3u8; 8 * BLOCK_SIZE];
        assert!(matches!(
            fs.write(&mut inode, index, &data),
            Err(FsError::ExhaustedBlocks)
        ));
        // nothing is rolled back
        assert_eq!(fs.statfs().free_blocks, 0);
        Ok(())
    }
}
