//! Directory entries and the directory entry manager.
//!
//! A directory's data is a packed array of [DENTRY_SIZE] records spread over
//! its extents, entry `i` living in logical block `i / DENTRIES_PER_BLOCK`.
//! Entries are always appended at the end and removed by moving the last entry
//! into the hole, so the array never has gaps and its order is not stable.
use crate::utils::codec::OnDiskRecord;

use super::{
    fs_layout::Storage, ExtentFs, FsError, Inode, Result, BLOCK_SIZE, DENTRIES_PER_BLOCK,
    DENTRY_SIZE, NAME_MAX,
};

const INODE_FIELD: usize = 4;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirEntry {
    pub inode_number: u32,
    pub name: String,
}

impl DirEntry {
    /// # Params
    /// - `name`: a single path component, shorter than [NAME_MAX] bytes
    pub fn new(inode_number: u32, name: &str) -> Result<Self> {
        if name.len() >= NAME_MAX {
            return Err(FsError::NameTooLong);
        }
        if name.is_empty() || name.contains(['/', '\0']) {
            return Err(FsError::InvalidArgument(format!(
                "{name:?} is not a valid file name"
            )));
        }
        Ok(DirEntry {
            inode_number,
            name: name.to_string(),
        })
    }
}

impl OnDiskRecord for DirEntry {
    const SLOT_SIZE: usize = DENTRY_SIZE;

    fn encode_into(&self, slot: &mut [u8]) -> Result<usize> {
        let name = self.name.as_bytes();
        if slot.len() < DENTRY_SIZE || name.len() >= NAME_MAX {
            return Err(FsError::Codec(format!(
                "directory entry {:?} does not fit a {}-byte slot",
                self.name,
                slot.len()
            )));
        }
        let (ino, name_field) = slot[..DENTRY_SIZE].split_at_mut(INODE_FIELD);
        ino.copy_from_slice(&self.inode_number.to_le_bytes());
        name_field.fill(0);
        name_field[..name.len()].copy_from_slice(name);
        Ok(DENTRY_SIZE)
    }

    fn decode_from(slot: &[u8]) -> Result<Self> {
        if slot.len() < DENTRY_SIZE {
            return Err(FsError::Codec(format!(
                "a directory entry needs {DENTRY_SIZE} bytes, got {}",
                slot.len()
            )));
        }
        let mut ino = [0u8; INODE_FIELD];
        ino.copy_from_slice(&slot[..INODE_FIELD]);
        let name_field = &slot[INODE_FIELD..DENTRY_SIZE];
        let len = name_field
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| FsError::Codec("unterminated directory entry name".into()))?;
        let name = std::str::from_utf8(&name_field[..len])
            .map_err(|e| FsError::Codec(e.to_string()))?;
        Ok(DirEntry {
            inode_number: u32::from_le_bytes(ino),
            name: name.to_string(),
        })
    }
}

/// directory entry management
impl<S: Storage> ExtentFs<S> {
    /// data block and slot of entry `index` of `dir`
    fn entry_slot(&self, dir: &Inode, index: u64) -> Result<(u32, usize)> {
        let per_block = DENTRIES_PER_BLOCK as u64;
        let block = self.logical_to_data_block(dir, index / per_block)?;
        Ok((block, (index % per_block) as usize))
    }

    /// every entry of `dir`, in storage order
    pub(crate) fn entries(&self, dir: &Inode) -> Result<Vec<DirEntry>> {
        let total = (dir.size / DENTRY_SIZE as u64) as usize;
        let mut entries = Vec::new();
        entries.try_reserve(total)?;
        'extents: for extent in self.extent_list(dir)? {
            for block in extent.start..extent.end() {
                for slot in 0..DENTRIES_PER_BLOCK {
                    if entries.len() == total {
                        break 'extents;
                    }
                    entries.push(self.image.dentry(block, slot)?);
                }
            }
        }
        if entries.len() != total {
            return Err(FsError::Corrupted(format!(
                "directory {} holds {} of its {total} entries",
                dir.inode_number,
                entries.len()
            )));
        }
        Ok(entries)
    }

    /// Linear scan of `dir` for `name`.
    /// # Return
    /// the position of the entry in storage order together with the entry
    pub(crate) fn find_entry(&self, dir: &Inode, name: &str) -> Result<Option<(usize, DirEntry)>> {
        Ok(self
            .entries(dir)?
            .into_iter()
            .enumerate()
            .find(|(_, entry)| entry.name == name))
    }

    /// Append `entry` to `dir`, growing it by a block when its last block is full.
    ///
    /// The caller persists `dir`.
    pub(crate) fn add_entry(&mut self, dir: &mut Inode, entry: &DirEntry) -> Result<()> {
        if dir.size % BLOCK_SIZE as u64 == 0 {
            let block = self.acquire_run(dir, 1)?;
            self.image.data_block_mut(block.start)?.fill(0);
        }
        let index = dir.size / DENTRY_SIZE as u64;
        let (block, slot) = self.entry_slot(dir, index)?;
        self.image.write_dentry(block, slot, entry)?;
        dir.size += DENTRY_SIZE as u64;
        dir.hard_links += 1;
        dir.update_modified_at();
        log::debug!(
            "added entry {:?} -> {} at slot {index} of directory {}",
            entry.name,
            entry.inode_number,
            dir.inode_number
        );
        Ok(())
    }

    /// Remove the entry at `index` by moving the last entry into its place.
    ///
    /// The trailing block is released once it holds no entry. The caller
    /// persists `dir`.
    pub(crate) fn remove_entry(&mut self, dir: &mut Inode, index: usize) -> Result<()> {
        let count = dir.size / DENTRY_SIZE as u64;
        let index = index as u64;
        if index >= count {
            return Err(FsError::NotFound);
        }
        let last = self.entry_slot(dir, count - 1)?;
        if index != count - 1 {
            let moved = self.image.dentry(last.0, last.1)?;
            let (block, slot) = self.entry_slot(dir, index)?;
            self.image.write_dentry(block, slot, &moved)?;
        }
        self.image.write_dentry(last.0, last.1, &DirEntry::default())?;
        dir.size -= DENTRY_SIZE as u64;
        dir.hard_links = dir.hard_links.saturating_sub(1);
        dir.update_modified_at();
        if dir.size % BLOCK_SIZE as u64 == 0 {
            self.release_tail_blocks(dir, 1)?;
        }
        Ok(())
    }
}
