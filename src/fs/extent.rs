use serde::{Deserialize, Serialize};

use crate::utils::codec::{decode_record, encode_record, OnDiskRecord};

use super::{Result, EXTENT_SIZE};

/// A contiguous run of data blocks: `count` blocks starting at data block `start`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extent {
    pub start: u32,
    pub count: u32,
}

impl Extent {
    pub fn new(start: u32, count: u32) -> Self {
        Extent { start, count }
    }

    /// first data block past the end of this run
    pub fn end(&self) -> u32 {
        self.start + self.count
    }
}

impl OnDiskRecord for Extent {
    const SLOT_SIZE: usize = EXTENT_SIZE;

    fn encode_into(&self, slot: &mut [u8]) -> Result<usize> {
        encode_record(self, slot)
    }

    fn decode_from(slot: &[u8]) -> Result<Self> {
        decode_record(slot)
    }
}
