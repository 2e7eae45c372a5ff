//! contiguous-run block allocation and per-inode extent lists
use super::{
    fs_layout::Storage, BitmapKind, Extent, ExtentFs, FsError, Inode, Result, BLOCK_SIZE,
    MAX_EXTENTS,
};

/// Outcome of a contiguous-run search over the block bitmap.
///
/// Whatever run is returned has already been marked allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunSearch {
    /// a run of exactly the requested length
    Full(Extent),
    /// no run was long enough; this is the longest one seen, shorter than requested
    Partial(Extent),
    /// not a single free block
    NoSpace,
}

impl<S: Storage> ExtentFs<S> {
    /// First-fit search for `length` contiguous free data blocks.
    ///
    /// Falls back to the longest free run when no run is long enough, the
    /// caller loops on [RunSearch::Partial] until it has what it needs.
    pub(crate) fn find_run(&mut self, length: u32) -> Result<RunSearch> {
        if length == 0 {
            return Err(FsError::InvalidArgument("empty block run requested".into()));
        }
        let bits = self.image.bitmap(BitmapKind::Block);
        let mut longest = Extent::default();
        let mut current = Extent::default();
        let mut full = None;
        for (index, allocated) in bits.iter().by_vals().enumerate() {
            if allocated {
                if current.count > longest.count {
                    longest = current;
                }
                current = Extent::new(index as u32 + 1, 0);
                continue;
            }
            current.count += 1;
            if current.count == length {
                full = Some(current);
                break;
            }
        }
        if current.count > longest.count {
            longest = current;
        }

        let search = match full {
            Some(run) => RunSearch::Full(run),
            None if longest.count > 0 => RunSearch::Partial(longest),
            None => RunSearch::NoSpace,
        };
        if let RunSearch::Full(run) | RunSearch::Partial(run) = search {
            self.set_bits(BitmapKind::Block, run.start, run.count)?;
        }
        log::debug!("find_run({length}) -> {search:?}");
        Ok(search)
    }

    /// Claim the blocks `start..start + length` if every one of them is free.
    /// # Return
    /// `false`, with nothing modified, when the range is taken or leaves the data region
    pub(crate) fn find_run_at(&mut self, start: u32, length: u32) -> Result<bool> {
        let bits = self.image.bitmap(BitmapKind::Block);
        let end = start as usize + length as usize;
        let free = length > 0 && end <= bits.len() && bits[start as usize..end].not_any();
        if free {
            self.set_bits(BitmapKind::Block, start, length)?;
        }
        log::debug!("find_run_at({start}, {length}) -> {free}");
        Ok(free)
    }

    pub(crate) fn release_run(&mut self, run: Extent) -> Result<()> {
        self.clear_bits(BitmapKind::Block, run.start, run.count)
    }

    /// Record `extent` after the last extent of `inode`.
    ///
    /// The first extent also claims a block for the extent list. The caller
    /// owns `extent` until this succeeds and persists `inode` afterwards.
    pub(crate) fn append_extent(&mut self, inode: &mut Inode, extent: Extent) -> Result<()> {
        if inode.extent_count >= MAX_EXTENTS {
            log::debug!(
                "inode {} reached the cap of {MAX_EXTENTS} extents",
                inode.inode_number
            );
            return Err(FsError::NoSpace);
        }
        if inode.extent_count == 0 {
            let list = match self.find_run(1)? {
                RunSearch::Full(list) => list,
                _ => return Err(FsError::NoSpace),
            };
            self.image.data_block_mut(list.start)?.fill(0);
            inode.extent_block = list.start;
        }
        self.image
            .write_extent(inode.extent_block, inode.extent_count, &extent)?;
        inode.extent_count += 1;
        Ok(())
    }

    fn write_last_extent(&mut self, inode: &Inode, extent: &Extent) -> Result<()> {
        self.image
            .write_extent(inode.extent_block, inode.extent_count - 1, extent)
    }

    /// Back up to `wanted` more blocks at the logical end of `inode`.
    ///
    /// Grows the last extent in place when the blocks right after it are free,
    /// otherwise takes the first-fit run and appends it as a new extent.
    /// # Return
    /// the newly backed blocks, possibly fewer than `wanted`
    pub(crate) fn acquire_run(&mut self, inode: &mut Inode, wanted: u32) -> Result<Extent> {
        let last = self.last_extent(inode)?;
        if let Some(last) = last {
            if self.find_run_at(last.end(), wanted)? {
                self.write_last_extent(inode, &Extent::new(last.start, last.count + wanted))?;
                return Ok(Extent::new(last.end(), wanted));
            }
        }

        let run = match self.find_run(wanted)? {
            RunSearch::Full(run) | RunSearch::Partial(run) => run,
            RunSearch::NoSpace => return Err(FsError::NoSpace),
        };
        match last {
            Some(last) if last.end() == run.start => {
                self.write_last_extent(inode, &Extent::new(last.start, last.count + run.count))?;
            }
            _ => {
                if let Err(e) = self.append_extent(inode, run) {
                    self.release_run(run)?;
                    return Err(e);
                }
            }
        }
        Ok(run)
    }

    /// Release the last `count` data blocks of `inode`, dropping extents that
    /// become empty and the extent list once no extent is left.
    pub(crate) fn release_tail_blocks(&mut self, inode: &mut Inode, mut count: u32) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        while count > 0 {
            let last = self.last_extent(inode)?.ok_or_else(|| {
                FsError::Corrupted(format!(
                    "inode {} has fewer blocks than its size",
                    inode.inode_number
                ))
            })?;
            let taken = count.min(last.count);
            self.release_run(Extent::new(last.end() - taken, taken))?;
            count -= taken;
            if taken == last.count {
                inode.extent_count -= 1;
            } else {
                self.write_last_extent(inode, &Extent::new(last.start, last.count - taken))?;
            }
        }
        if inode.extent_count == 0 {
            self.release_extent_list(inode)?;
        }
        Ok(())
    }

    /// Release every extent of `inode` and its extent list.
    pub(crate) fn release_all_extents(&mut self, inode: &mut Inode) -> Result<()> {
        if inode.extent_count == 0 {
            return Ok(());
        }
        for extent in self.extent_list(inode)? {
            self.release_run(extent)?;
        }
        inode.extent_count = 0;
        self.release_extent_list(inode)
    }

    /// only called once the last extent is gone, while the list block is still held
    fn release_extent_list(&mut self, inode: &mut Inode) -> Result<()> {
        self.release_run(Extent::new(inode.extent_block, 1))?;
        inode.extent_block = 0;
        Ok(())
    }

    /// Data block holding logical block `index` of `inode`.
    pub(crate) fn logical_to_data_block(&self, inode: &Inode, index: u64) -> Result<u32> {
        let mut skipped = 0u64;
        for extent in self.extent_list(inode)? {
            if index < skipped + extent.count as u64 {
                return Ok(extent.start + (index - skipped) as u32);
            }
            skipped += extent.count as u64;
        }
        Err(FsError::Corrupted(format!(
            "inode {} has no block at offset {}",
            inode.inode_number,
            index * BLOCK_SIZE as u64
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{fs_layout::tests::test_fs, FileKind};

    #[test]
    fn test_find_run_first_fit() -> anyhow::Result<()> {
        let mut fs = test_fs(256, 64);
        assert_eq!(fs.find_run(3)?, RunSearch::Full(Extent::new(0, 3)));
        assert_eq!(fs.find_run(2)?, RunSearch::Full(Extent::new(3, 2)));
        fs.clear_bits(BitmapKind::Block, 1, 1)?;
        // the hole at block 1 is too small for two blocks
        assert_eq!(fs.find_run(2)?, RunSearch::Full(Extent::new(5, 2)));
        assert_eq!(fs.find_run(1)?, RunSearch::Full(Extent::new(1, 1)));
        Ok(())
    }

    #[test]
    fn test_find_run_partial_then_no_space() -> anyhow::Result<()> {
        let mut fs = test_fs(64, 16);
        let data_blocks = fs.image.layout().data_block_count();
        // leave free: 0..2 and 10..15
        fs.set_bits(BitmapKind::Block, 2, 8)?;
        fs.set_bits(BitmapKind::Block, 15, data_blocks - 15)?;
        assert_eq!(fs.find_run(8)?, RunSearch::Partial(Extent::new(10, 5)));
        assert_eq!(fs.find_run(8)?, RunSearch::Partial(Extent::new(0, 2)));
        assert_eq!(fs.find_run(8)?, RunSearch::NoSpace);
        assert_eq!(fs.free_count(BitmapKind::Block)?, 0);
        Ok(())
    }

    #[test]
    fn test_find_run_at_only_commits_free_ranges() -> anyhow::Result<()> {
        let mut fs = test_fs(64, 16);
        let data_blocks = fs.image.layout().data_block_count();
        fs.set_bits(BitmapKind::Block, 4, 1)?;
        let free = fs.free_count(BitmapKind::Block)?;
        assert!(!fs.find_run_at(2, 3)?);
        assert!(!fs.find_run_at(data_blocks - 1, 2)?);
        assert_eq!(fs.free_count(BitmapKind::Block)?, free);
        assert!(fs.find_run_at(1, 3)?);
        assert_eq!(fs.free_count(BitmapKind::Block)?, free - 3);
        Ok(())
    }

    #[test]
    fn test_append_extent_claims_list_block_and_caps() -> anyhow::Result<()> {
        let mut fs = test_fs(256, 64);
        let mut inode = Inode::new(1, FileKind::RegularFile, 0o644);
        fs.append_extent(&mut inode, Extent::new(100, 1))?;
        assert_eq!(inode.extent_count, 1);
        assert_eq!(inode.extent_block, 0);
        assert_eq!(fs.extent_list(&inode)?, vec![Extent::new(100, 1)]);

        inode.extent_count = MAX_EXTENTS;
        assert_eq!(
            fs.append_extent(&mut inode, Extent::new(101, 1)),
            Err(FsError::NoSpace)
        );
        assert_eq!(inode.extent_count, MAX_EXTENTS);
        Ok(())
    }

    #[test]
    fn test_acquire_run_grows_last_extent_in_place() -> anyhow::Result<()> {
        let mut fs = test_fs(256, 64);
        let mut inode = Inode::new(1, FileKind::RegularFile, 0o644);
        let first = fs.acquire_run(&mut inode, 2)?;
        assert_eq!(first, Extent::new(0, 2));
        // the extent list took block 2, so the next run cannot be contiguous
        let second = fs.acquire_run(&mut inode, 1)?;
        assert_eq!(second, Extent::new(3, 1));
        assert_eq!(inode.extent_count, 2);
        let third = fs.acquire_run(&mut inode, 2)?;
        assert_eq!(third, Extent::new(4, 2));
        assert_eq!(
            fs.extent_list(&inode)?,
            vec![Extent::new(0, 2), Extent::new(3, 3)]
        );
        assert_eq!(fs.logical_to_data_block(&inode, 0)?, 0);
        assert_eq!(fs.logical_to_data_block(&inode, 2)?, 3);
        assert_eq!(fs.logical_to_data_block(&inode, 4)?, 5);
        assert!(fs.logical_to_data_block(&inode, 5).is_err());
        Ok(())
    }

    #[test]
    fn test_release_tail_blocks_drops_extents_and_list() -> anyhow::Result<()> {
        let mut fs = test_fs(256, 64);
        let free = fs.free_count(BitmapKind::Block)?;
        let mut inode = Inode::new(1, FileKind::RegularFile, 0o644);
        fs.acquire_run(&mut inode, 2)?;
        fs.acquire_run(&mut inode, 3)?;
        assert_eq!(fs.free_count(BitmapKind::Block)?, free - 6);

        fs.release_tail_blocks(&mut inode, 4)?;
        assert_eq!(inode.extent_count, 1);
        assert_eq!(fs.extent_list(&inode)?, vec![Extent::new(0, 1)]);
        fs.release_tail_blocks(&mut inode, 1)?;
        assert_eq!(inode.extent_count, 0);
        assert_eq!(fs.free_count(BitmapKind::Block)?, free);
        Ok(())
    }

    #[test]
    fn test_release_all_extents() -> anyhow::Result<()> {
        let mut fs = test_fs(256, 64);
        let free = fs.free_count(BitmapKind::Block)?;
        let mut inode = Inode::new(1, FileKind::RegularFile, 0o644);
        fs.acquire_run(&mut inode, 2)?;
        fs.set_bits(BitmapKind::Block, 10, 1)?;
        fs.acquire_run(&mut inode, 9)?;
        fs.release_all_extents(&mut inode)?;
        assert_eq!(inode.extent_count, 0);
        assert_eq!(fs.free_count(BitmapKind::Block)?, free - 1);
        Ok(())
    }
}
