//! lay out a fresh filesystem on a raw image buffer
use crate::utils::fs_size_calculator::{bitmap_blocks, inode_table_blocks, split_data_region};

use super::{
    image::{read_superblock, Image, Layout},
    BitmapKind, FileKind, FsError, Inode, Result, SuperBlock, BLOCK_SIZE, FS_MAGIC, ROOT_INODE,
    SUPERBLOCK_BLOCK,
};

/// Compute the region layout for an image of `block_count` blocks holding `inode_count` inodes.
///
/// Regions follow the superblock in this order: inode bitmap, block bitmap,
/// inode table, data. The block bitmap is sized for the data blocks that
/// remain once it is carved out.
pub fn compute_layout(block_count: u64, inode_count: u32) -> Result<Layout> {
    if inode_count == 0 {
        return Err(FsError::InvalidLayout(
            "at least one inode is needed for the root directory".into(),
        ));
    }
    let inode_bitmap_blocks = bitmap_blocks(inode_count as u64);
    let inode_table_blocks = inode_table_blocks(inode_count as u64);
    let fixed = SUPERBLOCK_BLOCK as u64 + 1 + inode_bitmap_blocks + inode_table_blocks;
    let available = block_count.saturating_sub(fixed);
    let (block_bitmap_blocks, data_blocks) = split_data_region(available);
    if data_blocks == 0 {
        return Err(FsError::InvalidLayout(format!(
            "{block_count} blocks leave no data block for {inode_count} inodes"
        )));
    }
    let block_count = u32::try_from(block_count).map_err(|_| {
        FsError::InvalidLayout(format!("{block_count} blocks exceed the addressable range"))
    })?;

    let inode_bitmap = SUPERBLOCK_BLOCK + 1;
    let block_bitmap = inode_bitmap + inode_bitmap_blocks as u32;
    let inode_table = block_bitmap + block_bitmap_blocks as u32;
    Ok(Layout {
        block_count,
        inode_count,
        inode_bitmap,
        block_bitmap,
        inode_table,
        first_data_block: inode_table + inode_table_blocks as u32,
    })
}

/// format the first `total_size` bytes of `image`
/// # Params
/// - `total_size`: a whole number of blocks, no larger than `image`
/// - `inode_count`: size of the inode table, the root directory included
/// # Return
/// [FsError::InvalidLayout] when the geometry leaves no room for the root
/// directory and at least one data block
pub fn format(image: &mut [u8], total_size: u64, inode_count: u32) -> Result<()> {
    log::info!("format() called with size: {total_size}, inode count: {inode_count}");
    if total_size > image.len() as u64 {
        return Err(FsError::InvalidArgument(format!(
            "{total_size} bytes requested from an image of {} bytes",
            image.len()
        )));
    }
    if total_size % BLOCK_SIZE as u64 != 0 {
        return Err(FsError::InvalidLayout(format!(
            "image size {total_size} is not a multiple of the block size {BLOCK_SIZE}"
        )));
    }
    let layout = compute_layout(total_size / BLOCK_SIZE as u64, inode_count)?;

    let image = &mut image[..total_size as usize];
    image[..layout.first_data_block as usize * BLOCK_SIZE].fill(0);
    let mut image = Image::with_layout(image, layout)?;

    image.write_superblock(&SuperBlock {
        magic: FS_MAGIC,
        size: total_size,
        inode_count,
        block_count: layout.block_count,
        inode_bitmap: layout.inode_bitmap,
        block_bitmap: layout.block_bitmap,
        inode_table: layout.inode_table,
        first_data_block: layout.first_data_block,
        dir_count: 1,
        free_blocks: layout.data_block_count(),
        free_inodes: inode_count - 1,
    })?;
    image
        .bitmap_mut(BitmapKind::Inode)
        .set(ROOT_INODE as usize, true);
    let mut root = Inode::new(ROOT_INODE, FileKind::Directory, 0o777);
    root.hard_links = 2;
    image.write_inode(&root)?;

    log::info!("formatted image: {layout:?}");
    Ok(())
}

/// whether `image` already carries an extentfs superblock
pub fn is_formatted(image: &[u8]) -> bool {
    read_superblock(image)
        .map(|superblock| superblock.has_magic())
        .unwrap_or(false)
}
