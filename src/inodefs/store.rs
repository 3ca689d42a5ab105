use super::BLOCK_SIZE;

/// Flat array of fixed-size blocks standing in for a disk.
///
/// Block indices are bounded by the layout computed at format time, so an
/// out-of-range access is a bug and panics instead of returning an error.
#[derive(Debug, Clone)]
pub struct BlockStore {
    data: Vec<u8>,
}

impl BlockStore {
    pub fn new(block_count: u32) -> Self {
        Self {
            data: vec![0u8; block_count as usize * BLOCK_SIZE],
        }
    }

    pub fn block_count(&self) -> u32 {
        (self.data.len() / BLOCK_SIZE) as u32
    }

    pub fn zero(&mut self) {
        self.data.iter_mut().for_each(|b| *b = 0);
    }

    pub fn block(&self, index: u32) -> &[u8] {
        let start = self.offset(index);
        &self.data[start..start + BLOCK_SIZE]
    }

    pub fn block_mut(&mut self, index: u32) -> &mut [u8] {
        let start = self.offset(index);
        &mut self.data[start..start + BLOCK_SIZE]
    }

    /// Bytes starting at the beginning of `index`, possibly spanning the
    /// following blocks.
    pub fn region(&self, index: u32, len: usize) -> &[u8] {
        let start = self.offset(index);
        assert!(
            start + len <= self.data.len(),
            "region of {} bytes at block {} runs past the device",
            len,
            index
        );
        &self.data[start..start + len]
    }

    /// Copies `buf` into block `index` at `offset`; bytes outside of that
    /// range are left untouched.
    pub fn write_at(&mut self, index: u32, offset: usize, buf: &[u8]) {
        assert!(
            offset + buf.len() <= BLOCK_SIZE,
            "write of {} bytes at offset {} overflows block {}",
            buf.len(),
            offset,
            index
        );
        self.block_mut(index)[offset..offset + buf.len()].copy_from_slice(buf);
    }

    /// Writes a record into its own block, zeroing the rest of it.
    pub fn write_block(&mut self, index: u32, buf: &[u8]) {
        self.zero_block(index);
        self.write_at(index, 0, buf);
    }

    pub fn zero_block(&mut self, index: u32) {
        self.block_mut(index).iter_mut().for_each(|b| *b = 0);
    }

    fn offset(&self, index: u32) -> usize {
        assert!(
            index < self.block_count(),
            "block {} is outside of the device ({} blocks)",
            index,
            self.block_count()
        );
        index as usize * BLOCK_SIZE
    }
}
