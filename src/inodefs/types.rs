use super::{
    config::FsConfig,
    error::{FsError, Result},
    util, BLOCK_SIZE, DIRECT_POINTERS, DIR_ENTRIES, INDIRECT_POINTERS, INODEFS_MAGIC,
    LAYOUT_VERSION, NAME_LEN, NULL_BLOCK, NULL_INODE, ROOT_INODE,
};
use bitvec::{order::Lsb0, vec::BitVec};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

/// A fixed-shape structure that is stored inside a single block.
pub trait Record: Sized {
    const KIND: &'static str;

    fn encode(&self) -> Result<Vec<u8>>;
    fn decode(buf: &[u8]) -> Result<Self>;
}

fn to_bytes<S: Serialize>(kind: &'static str, s: &S) -> Result<Vec<u8>> {
    let bytes = bincode::serialize(s).map_err(|e| FsError::corrupt(kind, e))?;
    if bytes.len() > BLOCK_SIZE {
        return Err(FsError::corrupt(
            kind,
            format!("{} bytes do not fit in a block", bytes.len()),
        ));
    }

    Ok(bytes)
}

fn from_bytes<D: DeserializeOwned>(kind: &'static str, buf: &[u8]) -> Result<D> {
    bincode::deserialize_from(buf).map_err(|e| FsError::corrupt(kind, e))
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct Superblock {
    pub magic: u32,
    pub version: u16,
    pub block_size: u32,
    pub block_count: u32,
    pub inode_count: u32,
    pub inode_bitmap_start: u32,
    pub block_bitmap_start: u32,
    pub inode_table_start: u32,
    pub root_inode: u32,
    pub data_region_start: u32,
    pub created_at: u64,
    pub checksum: u32,
}

impl Superblock {
    pub fn new(config: &FsConfig) -> Self {
        let (inodes, blocks) = (config.inode_count, config.block_count);
        Self {
            magic: INODEFS_MAGIC,
            version: LAYOUT_VERSION,
            block_size: BLOCK_SIZE as u32,
            block_count: blocks,
            inode_count: inodes,
            inode_bitmap_start: util::inode_bitmap_start(),
            block_bitmap_start: util::block_bitmap_start(inodes),
            inode_table_start: util::inode_table_start(inodes, blocks),
            root_inode: ROOT_INODE,
            data_region_start: util::data_region_start(inodes, blocks),
            created_at: util::now(),
            checksum: 0,
        }
    }

    fn sealed_checksum(&self) -> Result<u32> {
        let mut unsealed = self.clone();
        unsealed.checksum = 0;
        util::calculate_checksum(Self::KIND, &unsealed)
    }
}

impl Record for Superblock {
    const KIND: &'static str = "superblock";

    fn encode(&self) -> Result<Vec<u8>> {
        let mut sealed = self.clone();
        sealed.checksum = self.sealed_checksum()?;
        to_bytes(Self::KIND, &sealed)
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let sb: Self = from_bytes(Self::KIND, buf)?;
        if sb.magic != INODEFS_MAGIC {
            return Err(FsError::corrupt(
                Self::KIND,
                format!("bad magic number {:#x}", sb.magic),
            ));
        }
        if sb.version != LAYOUT_VERSION {
            return Err(FsError::corrupt(
                Self::KIND,
                format!("unsupported layout version {}", sb.version),
            ));
        }
        if sb.block_size as usize != BLOCK_SIZE {
            return Err(FsError::corrupt(
                Self::KIND,
                format!("unsupported block size {}", sb.block_size),
            ));
        }
        if sb.checksum != sb.sealed_checksum()? {
            return Err(FsError::corrupt(Self::KIND, "checksum verification failed"));
        }

        Ok(sb)
    }
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct Inode {
    pub is_valid: bool,
    pub is_directory: bool,
    pub version: u32,
    pub direct_blocks: [u32; DIRECT_POINTERS],
    pub indirect_block: u32,
    pub created_at: u64,
    pub modified_at: u64,
    pub checksum: u32,
}

impl Inode {
    /// A freshly allocated regular file without any data block.
    pub fn new() -> Self {
        let now = util::now();
        Self {
            is_valid: true,
            created_at: now,
            modified_at: now,
            ..Self::default()
        }
    }

    pub fn direct(&self, position: usize) -> Option<u32> {
        self.direct_blocks
            .get(position)
            .copied()
            .filter(|&block| block != NULL_BLOCK)
    }

    pub fn indirect(&self) -> Option<u32> {
        Some(self.indirect_block).filter(|&block| block != NULL_BLOCK)
    }

    pub fn is_file(&self) -> bool {
        self.is_valid && !self.is_directory
    }

    fn sealed_checksum(&self) -> Result<u32> {
        let mut unsealed = self.clone();
        unsealed.checksum = 0;
        util::calculate_checksum(Self::KIND, &unsealed)
    }
}

impl Record for Inode {
    const KIND: &'static str = "inode";

    fn encode(&self) -> Result<Vec<u8>> {
        let mut sealed = self.clone();
        sealed.checksum = self.sealed_checksum()?;
        to_bytes(Self::KIND, &sealed)
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let inode: Self = from_bytes(Self::KIND, buf)?;
        if inode.checksum != inode.sealed_checksum()? {
            return Err(FsError::corrupt(Self::KIND, "checksum verification failed"));
        }

        Ok(inode)
    }
}

#[derive(Serialize, Deserialize, Default, Clone, Copy, PartialEq)]
pub struct DirectoryEntry {
    pub inode: u32,
    pub name: [u8; NAME_LEN],
}

impl DirectoryEntry {
    /// Builds an entry, silently truncating `name` to `NAME_LEN` bytes.
    pub fn new(name: &str, inode: u32) -> Self {
        Self {
            inode,
            name: encode_name(name),
        }
    }

    pub fn name_str(&self) -> String {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_LEN);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name == encode_name(name)
    }

    pub fn is_dot(&self) -> bool {
        self.matches(".") || self.matches("..")
    }

    /// "." and ".." may legitimately point at inode 0 (the root has no
    /// parent), every other entry with inode 0 is a free slot.
    pub fn is_unused(&self) -> bool {
        self.inode == NULL_INODE && !self.is_dot()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Debug for DirectoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unused() {
            write!(f, "DirectoryEntry(<free>)")
        } else {
            write!(
                f,
                "DirectoryEntry({}, inode={})",
                self.name_str(),
                self.inode
            )
        }
    }
}

pub fn encode_name(name: &str) -> [u8; NAME_LEN] {
    let mut buf = [0u8; NAME_LEN];
    let bytes = name.as_bytes();
    let len = bytes.len().min(NAME_LEN);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct DirectoryBlock {
    pub entries: [DirectoryEntry; DIR_ENTRIES],
}

impl DirectoryBlock {
    pub fn new(parent: u32, this: u32) -> Self {
        let mut block = Self::default();
        block.entries[0] = DirectoryEntry::new(".", this);
        block.entries[1] = DirectoryEntry::new("..", parent);
        block
    }

    /// Slot of `name`, scanning in stored order and giving up at the first
    /// free slot.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .take_while(|entry| !entry.is_unused())
            .position(|entry| entry.matches(name))
    }

    pub fn first_unused(&self) -> Option<usize> {
        self.entries.iter().position(DirectoryEntry::is_unused)
    }

    /// Slot of the named entry referencing `inode`, ignoring "." and ".."
    /// and free slots.
    pub fn position_of(&self, inode: u32) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.inode == inode && !entry.is_dot() && !entry.is_unused())
    }

    /// Live entries other than "." and "..".
    pub fn children(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.entries
            .iter()
            .filter(|entry| !entry.is_unused() && !entry.is_dot())
    }
}

impl Record for DirectoryBlock {
    const KIND: &'static str = "directory block";

    fn encode(&self) -> Result<Vec<u8>> {
        to_bytes(Self::KIND, self)
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        from_bytes(Self::KIND, buf)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IndirectBlock {
    pub pointers: Vec<u32>,
}

impl Default for IndirectBlock {
    fn default() -> Self {
        Self {
            pointers: vec![NULL_BLOCK; INDIRECT_POINTERS],
        }
    }
}

impl IndirectBlock {
    /// Allocated pointers, up to the first empty slot.
    pub fn blocks(&self) -> impl Iterator<Item = u32> + '_ {
        self.pointers
            .iter()
            .copied()
            .take_while(|&block| block != NULL_BLOCK)
    }
}

impl Record for IndirectBlock {
    const KIND: &'static str = "indirect block";

    fn encode(&self) -> Result<Vec<u8>> {
        to_bytes(Self::KIND, self)
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let block: Self = from_bytes(Self::KIND, buf)?;
        if block.pointers.len() != INDIRECT_POINTERS {
            return Err(FsError::corrupt(
                Self::KIND,
                format!("expected {} pointers, found {}", INDIRECT_POINTERS, block.pointers.len()),
            ));
        }

        Ok(block)
    }
}

/// Occupancy of inode slots or blocks, stored as one byte per bit.
#[derive(Debug, Default, Clone)]
pub struct Bitmap {
    pub bits: BitVec<Lsb0, u8>,
}

impl Bitmap {
    pub fn new(len: usize) -> Self {
        let mut bits = BitVec::<Lsb0, u8>::with_capacity(len);
        bits.resize(len, false);
        Self { bits }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_set(&self, i: usize) -> bool {
        self.bits.get(i).unwrap_or(&false) == &true
    }

    pub fn set(&mut self, i: usize) {
        self.bits.set(i, true);
    }

    pub fn clear(&mut self, i: usize) {
        self.bits.set(i, false);
    }

    pub fn first_clear_from(&self, from: usize) -> Option<usize> {
        (from..self.len()).find(|&i| !self.bits[i])
    }

    pub fn count_set(&self) -> usize {
        (0..self.len()).filter(|&i| self.bits[i]).count()
    }

    /// Encoded bytes of the `nth` block of the bitmap region.
    pub fn encode_block(&self, nth: usize) -> Vec<u8> {
        let start = (nth * BLOCK_SIZE).min(self.len());
        let end = (start + BLOCK_SIZE).min(self.len());
        (start..end).map(|i| self.bits[i] as u8).collect()
    }
}

impl Record for Bitmap {
    const KIND: &'static str = "bitmap";

    fn encode(&self) -> Result<Vec<u8>> {
        Ok((0..self.len()).map(|i| self.bits[i] as u8).collect())
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let mut bitmap = Self::new(buf.len());
        for (i, &byte) in buf.iter().enumerate() {
            match byte {
                0 => {}
                1 => bitmap.set(i),
                other => {
                    return Err(FsError::corrupt(
                        Self::KIND,
                        format!("byte {} holds {:#x}", i, other),
                    ))
                }
            }
        }

        Ok(bitmap)
    }
}
