//! Byte-range growth, truncation and block-local I/O of file data.
//!
//! Bytes between `size` and the end of the last block are undefined on disk:
//! a shrink only moves `size`, so every extension zero-fills what it exposes.
use super::{fs_layout::Storage, ExtentFs, FsError, Inode, Result, BLOCK_SIZE};

fn block_offset(offset: u64) -> usize {
    (offset % BLOCK_SIZE as u64) as usize
}

/// for file data management
impl<S: Storage> ExtentFs<S> {
    /// Image address of byte `offset` of `inode`.
    ///
    /// Only defined for `offset < inode.size`, the block holding it must be backed.
    pub(crate) fn offset_to_address(&self, inode: &Inode, offset: u64) -> Result<usize> {
        let block = self.logical_to_data_block(inode, offset / BLOCK_SIZE as u64)?;
        self.image.data_address(block, block_offset(offset))
    }

    fn zero_fill(&mut self, inode: &Inode, offset: u64, len: usize) -> Result<()> {
        let address = self.offset_to_address(inode, offset)?;
        self.image.bytes_mut(address, len)?.fill(0);
        Ok(())
    }

    /// Grow `inode` by `additional` zero bytes.
    ///
    /// On failure every block acquired by this call is released again and
    /// `inode` is back to its original size and extents.
    pub(crate) fn extend(&mut self, inode: &mut Inode, additional: u64) -> Result<()> {
        let original = inode.size;
        if let Err(e) = self.grow(inode, additional) {
            log::warn!(
                "extending inode {} by {additional} bytes failed ({e}), rolling back to {original} bytes",
                inode.inode_number
            );
            let grown = inode.size - original;
            self.shrink(inode, grown)?;
            return Err(e);
        }
        Ok(())
    }

    fn grow(&mut self, inode: &mut Inode, additional: u64) -> Result<()> {
        let mut remaining = additional;
        let tail = inode.tail_fill();
        if tail > 0 && remaining > 0 {
            let in_place = remaining.min((BLOCK_SIZE - tail) as u64);
            self.zero_fill(inode, inode.size, in_place as usize)?;
            inode.size += in_place;
            remaining -= in_place;
        }
        while remaining > 0 {
            let wanted = remaining
                .div_ceil(BLOCK_SIZE as u64)
                .min(u32::MAX as u64) as u32;
            let run = self.acquire_run(inode, wanted)?;
            log::debug!(
                "inode {} backed by {run:?}, {remaining} bytes to go",
                inode.inode_number
            );
            for block in run.start..run.end() {
                self.image.data_block_mut(block)?.fill(0);
                let filled = remaining.min(BLOCK_SIZE as u64);
                inode.size += filled;
                remaining -= filled;
            }
        }
        Ok(())
    }

    /// Drop the last `bytes` bytes of `inode`, releasing the blocks that no
    /// longer hold any of its data.
    pub(crate) fn shrink(&mut self, inode: &mut Inode, bytes: u64) -> Result<()> {
        if bytes >= inode.size {
            self.release_all_extents(inode)?;
            inode.size = 0;
            return Ok(());
        }
        let new_size = inode.size - bytes;
        let kept_blocks = new_size.div_ceil(BLOCK_SIZE as u64);
        let released = inode.data_blocks() - kept_blocks;
        self.release_tail_blocks(inode, released as u32)?;
        inode.size = new_size;
        Ok(())
    }

    /// Resize `inode` to exactly `new_size` bytes.
    pub(crate) fn set_size(&mut self, inode: &mut Inode, new_size: u64) -> Result<()> {
        let size = inode.size;
        if new_size > size {
            self.extend(inode, new_size - size)
        } else {
            self.shrink(inode, size - new_size)
        }
    }

    /// Read from a range that stays inside one block.
    /// # Return
    /// the number of bytes backed by file data, the rest of `buf` is zero-filled
    fn read_piece(&self, inode: &Inode, offset: u64, buf: &mut [u8]) -> Result<usize> {
        debug_assert!(block_offset(offset) + buf.len() <= BLOCK_SIZE);
        if offset >= inode.size {
            buf.fill(0);
            return Ok(0);
        }
        let backed = buf.len().min((inode.size - offset) as usize);
        let address = self.offset_to_address(inode, offset)?;
        buf[..backed].copy_from_slice(self.image.bytes(address, backed)?);
        buf[backed..].fill(0);
        Ok(backed)
    }

    fn write_piece(&mut self, inode: &Inode, offset: u64, data: &[u8]) -> Result<()> {
        debug_assert!(block_offset(offset) + data.len() <= BLOCK_SIZE);
        let address = self.offset_to_address(inode, offset)?;
        self.image.bytes_mut(address, data.len())?.copy_from_slice(data);
        Ok(())
    }

    /// Read `buf.len()` bytes at `offset`, one block-local piece at a time.
    /// # Return
    /// the number of bytes backed by file data, `0` at or past end of file
    pub(crate) fn read_at(&self, inode: &Inode, offset: u64, buf: &mut [u8]) -> Result<usize> {
        end_of(offset, buf.len())?;
        let mut done = 0;
        let mut backed = 0;
        while done < buf.len() {
            let position = offset + done as u64;
            let len = (buf.len() - done).min(BLOCK_SIZE - block_offset(position));
            backed += self.read_piece(inode, position, &mut buf[done..done + len])?;
            done += len;
        }
        Ok(backed)
    }

    /// Write `data` at `offset`, first extending the file when the range
    /// ends past its size. A failed extension leaves the file untouched.
    pub(crate) fn write_at(&mut self, inode: &mut Inode, offset: u64, data: &[u8]) -> Result<usize> {
        let end = end_of(offset, data.len())?;
        let size = inode.size;
        if end > size {
            self.extend(inode, end - size)?;
        }
        let mut done = 0;
        while done < data.len() {
            let position = offset + done as u64;
            let len = (data.len() - done).min(BLOCK_SIZE - block_offset(position));
            self.write_piece(inode, position, &data[done..done + len])?;
            done += len;
        }
        Ok(data.len())
    }
}

fn end_of(offset: u64, len: usize) -> Result<u64> {
    offset.checked_add(len as u64).ok_or_else(|| {
        FsError::InvalidArgument(format!("range of {len} bytes at {offset} overflows"))
    })
}
