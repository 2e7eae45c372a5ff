use serde::{Deserialize, Serialize};

use crate::utils::codec::{decode_record, encode_record, OnDiskRecord};

use super::{Result, BLOCK_SIZE, FS_MAGIC};

/// The superblock of this filesystem, stored at the start of block 1.
///
/// Region locations are absolute block numbers inside the image.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SuperBlock {
    /// magic number
    pub magic: u64,
    /// total image size in bytes
    pub size: u64,
    pub inode_count: u32,
    /// total number of blocks in the image, block 0 included
    pub block_count: u32,
    pub inode_bitmap: u32,
    pub block_bitmap: u32,
    pub inode_table: u32,
    pub first_data_block: u32,
    pub dir_count: u32,
    pub free_blocks: u32,
    pub free_inodes: u32,
}

impl SuperBlock {
    /// number of blocks in the data region, each tracked by one bit of the block bitmap
    pub fn data_block_count(&self) -> u32 {
        self.block_count.saturating_sub(self.first_data_block)
    }

    pub fn has_magic(&self) -> bool {
        self.magic == FS_MAGIC
    }
}

impl OnDiskRecord for SuperBlock {
    const SLOT_SIZE: usize = BLOCK_SIZE;

    fn encode_into(&self, slot: &mut [u8]) -> Result<usize> {
        encode_record(self, slot)
    }

    fn decode_from(slot: &[u8]) -> Result<Self> {
        decode_record(slot)
    }
}
