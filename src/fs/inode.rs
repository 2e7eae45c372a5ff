use serde::{Deserialize, Serialize};

use crate::utils::{
    codec::{decode_record, encode_record, OnDiskRecord},
    time_util::{self, Timestamp},
};

use super::{filekind::FileKind, Result, BLOCK_SIZE, INODE_SIZE};

/// One slot of the inode table.
///
/// `extent_block` is the data block holding this inode's extent list; it is only
/// meaningful while `extent_count > 0`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Inode {
    /// file type and permission bits
    pub mode: u32,
    /// index of this inode in the inode table
    pub inode_number: u32,
    pub extent_block: u32,
    pub hard_links: u32,
    pub modified_at: Timestamp,
    /// file size in bytes
    pub size: u64,
    pub extent_count: u32,
}

impl Inode {
    pub fn new(index: u32, file_kind: FileKind, permissions: u32) -> Self {
        Inode {
            inode_number: index,
            mode: file_kind.mode_bits() | (permissions & 0o7777),
            modified_at: time_util::now(),
            ..Inode::default()
        }
    }

    pub fn file_kind(&self) -> FileKind {
        FileKind::from(self.mode)
    }

    pub fn is_dir(&self) -> bool {
        self.file_kind() == FileKind::Directory
    }

    pub fn update_modified_at(&mut self) {
        self.modified_at = time_util::now();
    }

    /// number of data blocks backing `size` bytes
    pub fn data_blocks(&self) -> u64 {
        self.size.div_ceil(BLOCK_SIZE as u64)
    }

    /// bytes in use in the last data block, `0` when the last block is full or there is none
    pub fn tail_fill(&self) -> usize {
        (self.size % BLOCK_SIZE as u64) as usize
    }
}

impl OnDiskRecord for Inode {
    const SLOT_SIZE: usize = INODE_SIZE;

    fn encode_into(&self, slot: &mut [u8]) -> Result<usize> {
        encode_record(self, slot)
    }

    fn decode_from(slot: &[u8]) -> Result<Self> {
        decode_record(slot)
    }
}
