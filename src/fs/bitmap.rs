//! inode and block bitmaps: first-fit bit allocation with running free counts
use super::{fs_layout::Storage, ExtentFs, FsError, Result, SuperBlock};

/// which bitmap an allocation works on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmapKind {
    /// one bit per inode
    Inode,
    /// one bit per data block
    Block,
}

impl BitmapKind {
    fn free_count(self, superblock: &mut SuperBlock) -> &mut u32 {
        match self {
            BitmapKind::Inode => &mut superblock.free_inodes,
            BitmapKind::Block => &mut superblock.free_blocks,
        }
    }
}

/// for inode and data block allocation
impl<S: Storage> ExtentFs<S> {
    /// number of clear bits in a bitmap, as recorded by the superblock
    pub(crate) fn free_count(&self, kind: BitmapKind) -> Result<u32> {
        let mut superblock = self.image.superblock()?;
        Ok(*kind.free_count(&mut superblock))
    }

    /// Allocate the first clear bit of a bitmap.
    /// # Return
    /// the index of the bit, or [FsError::NoSpace] if the bitmap is full
    pub(crate) fn allocate_bit(&mut self, kind: BitmapKind) -> Result<u32> {
        if self.free_count(kind)? == 0 {
            return Err(FsError::NoSpace);
        }
        let index = self
            .image
            .bitmap(kind)
            .first_zero()
            .ok_or(FsError::NoSpace)? as u32;
        self.set_bits(kind, index, 1)?;
        log::debug!("allocated {kind:?} bit {index}");
        Ok(index)
    }

    /// mark `count` bits starting at `index` as allocated
    pub(crate) fn set_bits(&mut self, kind: BitmapKind, index: u32, count: u32) -> Result<()> {
        let range = self.bit_range(kind, index, count)?;
        let bits = &mut self.image.bitmap_mut(kind)[range];
        debug_assert!(bits.not_any(), "{kind:?} bits {index}+{count} already set");
        bits.fill(true);
        self.update_superblock(|sb| {
            let free = kind.free_count(sb);
            *free = free.saturating_sub(count);
        })
    }

    /// mark `count` bits starting at `index` as free
    pub(crate) fn clear_bits(&mut self, kind: BitmapKind, index: u32, count: u32) -> Result<()> {
        let range = self.bit_range(kind, index, count)?;
        let bits = &mut self.image.bitmap_mut(kind)[range];
        debug_assert!(bits.all(), "{kind:?} bits {index}+{count} already clear");
        bits.fill(false);
        self.update_superblock(|sb| *kind.free_count(sb) += count)
    }

    fn bit_range(
        &self,
        kind: BitmapKind,
        index: u32,
        count: u32,
    ) -> Result<std::ops::Range<usize>> {
        let len = self.image.bitmap(kind).len();
        let end = index as usize + count as usize;
        if end > len {
            return Err(FsError::OutOfBounds {
                region: match kind {
                    BitmapKind::Inode => "inode bitmap",
                    BitmapKind::Block => "block bitmap",
                },
                index: end as u64,
                limit: len as u64,
            });
        }
        Ok(index as usize..end)
    }
}
