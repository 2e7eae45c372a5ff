//! This module contains functions to calculate the size of different fs regions,
//! all of them measured in blocks of [BLOCK_SIZE]

use crate::fs::{BLOCK_SIZE, INODE_SIZE};

/// number of bits a single bitmap block can track
pub const BITS_PER_BLOCK: u64 = BLOCK_SIZE as u64 * 8;

/// calculate how many blocks a bitmap tracking `element_count` elements needs
/// # Example
/// ```
/// use extentfs::utils::fs_size_calculator::bitmap_blocks;
/// assert_eq!(bitmap_blocks(64), 1);
/// assert_eq!(bitmap_blocks(4096 * 8), 1);
/// assert_eq!(bitmap_blocks(4096 * 8 + 1), 2);
/// ```
pub const fn bitmap_blocks(element_count: u64) -> u64 {
    element_count.div_ceil(BITS_PER_BLOCK)
}

/// calculate needed Inode Table size in blocks
/// # Example
/// ```
/// use extentfs::utils::fs_size_calculator::inode_table_blocks;
/// assert_eq!(inode_table_blocks(64), 1);
/// assert_eq!(inode_table_blocks(65), 2);
/// ```
pub const fn inode_table_blocks(inode_count: u64) -> u64 {
    (inode_count * INODE_SIZE as u64).div_ceil(BLOCK_SIZE as u64)
}

/// Split the blocks left after the fixed regions between the block bitmap and
/// the data blocks it tracks.
/// # Return
/// `(block_bitmap_blocks, data_blocks)`
/// # Example
/// ```
/// use extentfs::utils::fs_size_calculator::split_data_region;
/// assert_eq!(split_data_region(252), (1, 251));
/// assert_eq!(split_data_region(0), (0, 0));
/// ```
pub const fn split_data_region(available_blocks: u64) -> (u64, u64) {
    // every data block costs one bit, every bitmap block holds BITS_PER_BLOCK of them
    let bitmap = available_blocks.div_ceil(BITS_PER_BLOCK + 1);
    (bitmap, available_blocks - bitmap)
}

/// number of 512-byte sectors covering `blocks` filesystem blocks
pub const fn sectors(blocks: u64) -> u64 {
    blocks * (BLOCK_SIZE as u64 / 512)
}
