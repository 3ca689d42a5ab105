use super::{
    error::{FsError, Result},
    fs::InodeFS,
    types::{DirectoryBlock, DirectoryEntry, Inode, Record},
};
use log::{debug, warn};

/// Intent passed to [`InodeFS::open`]. Only `Create` changes behaviour: a
/// missing name is created instead of reported as absent.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpenMode {
    Create,
    Read,
    Write,
    Append,
}

impl InodeFS {
    /// Resolves `name` inside `parent`. Entries sitting after the first free
    /// slot of the directory are not visited.
    pub fn lookup(&self, parent: &Inode, name: &str) -> Result<Option<(Inode, u32)>> {
        let block = self.read_directory(parent)?;
        match block.find(name) {
            Some(slot) => {
                let index = block.entries[slot].inode;
                Ok(Some((self.get_inode(index)?, index)))
            }
            None => Ok(None),
        }
    }

    pub fn open(
        &mut self,
        mode: OpenMode,
        name: &str,
        parent: &Inode,
    ) -> Result<Option<(Inode, u32)>> {
        if let Some(found) = self.lookup(parent, name)? {
            return Ok(Some(found));
        }
        if mode != OpenMode::Create {
            return Ok(None);
        }

        let mut block = self.read_directory(parent)?;
        let slot = match block.first_unused() {
            Some(slot) => slot,
            None => {
                warn!("cannot create {:?}, its directory is full", name);
                return Err(FsError::DirectoryFull);
            }
        };

        let (inode, index) = self.allocate_inode()?;
        block.entries[slot] = DirectoryEntry::new(name, index);
        self.save_directory_block(parent, &block)?;

        debug!("created {:?} as inode {} in slot {}", name, index, slot);
        Ok(Some((inode, index)))
    }

    /// Builds the "." and ".." entries of a new directory and turns
    /// `new_index` into a directory inode. The returned block still has to
    /// be written into the inode's data region by the caller.
    pub fn create_directory(
        &mut self,
        parent_index: u32,
        new_index: u32,
    ) -> Result<(DirectoryBlock, Inode)> {
        let block = DirectoryBlock::new(parent_index, new_index);
        let mut inode = self.get_inode(new_index)?;

        if new_index != self.sb.root_inode {
            inode.is_directory = true;
            inode.is_valid = true;
            self.put_inode(new_index, &inode)?;
        }

        Ok((block, inode))
    }

    /// Creates a sub-directory called `name` inside the directory stored in
    /// inode `parent_index`.
    pub fn mkdir(&mut self, name: &str, parent_index: u32) -> Result<(Inode, u32)> {
        let parent = self.get_inode(parent_index)?;
        if let Some((existing, index)) = self.lookup(&parent, name)? {
            if !existing.is_directory {
                return Err(FsError::InvalidDirectory);
            }
            return Ok((existing, index));
        }

        let (_, index) = self
            .open(OpenMode::Create, name, &parent)?
            .ok_or(FsError::InvalidDirectory)?;

        let (block, mut inode) = self.create_directory(parent_index, index)?;
        self.write(&mut inode, index, &block.encode()?)?;
        Ok((inode, index))
    }

    /// Removes the entry of `parent` referencing inode `index` and frees the
    /// inode.
    pub fn unlink(&mut self, index: u32, parent: &Inode) -> Result<()> {
        let mut block = self.read_directory(parent)?;
        let slot = block
            .position_of(index)
            .ok_or(FsError::EntryNotFound { inode: index })?;

        block.entries[slot].clear();
        self.save_directory_block(parent, &block)?;

        if self.options.reclaim_on_unlink {
            self.reclaim_blocks(index)?;
        }
        self.free_inode(index)?;

        debug!("unlinked inode {} from slot {}", index, slot);
        Ok(())
    }

    /// Unlinks the entry called `name` in `parent`.
    pub fn unlink_name(&mut self, name: &str, parent: &Inode) -> Result<()> {
        let (_, index) = self
            .lookup(parent, name)?
            .ok_or_else(|| FsError::NameNotFound(name.to_string()))?;
        self.unlink(index, parent)
    }

    /// Names and inodes of the entries in `dir`, without "." and "..".
    pub fn list(&self, dir: &Inode) -> Result<Vec<(String, u32)>> {
        let block = self.read_directory(dir)?;
        Ok(block
            .children()
            .map(|entry| (entry.name_str(), entry.inode))
            .collect())
    }

    fn save_directory_block(&mut self, dir: &Inode, block: &DirectoryBlock) -> Result<()> {
        let location = dir.direct(0).ok_or(FsError::InvalidDirectory)?;
        self.store.write_block(location, &block.encode()?);
        Ok(())
    }

    fn reclaim_blocks(&mut self, index: u32) -> Result<()> {
        let blocks = self.owned_blocks(&self.get_inode(index)?)?;
        for block in blocks.iter() {
            self.free_block(*block);
        }

        debug!("reclaimed {} blocks of inode {}", blocks.len(), index);
        Ok(())
    }
}
