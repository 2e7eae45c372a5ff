//! our extent-based filesystem engine
pub mod allocator;
pub mod bitmap;
mod directory;
pub mod error;
pub mod extent;
mod file_data;
pub mod filekind;
pub mod format;
mod fs_api_impl;
pub mod fs_layout;
pub mod image;
pub mod inode;
mod path;
pub mod superblock;
pub use allocator::RunSearch;
pub use bitmap::BitmapKind;
pub use directory::DirEntry;
pub use error::{FsError, Result};
pub use extent::Extent;
pub use filekind::FileKind;
pub use format::{format, is_formatted};
pub use fs_api_impl::{Attributes, FsStats, MtimeUpdate};
pub use fs_layout::ExtentFs;
pub use image::{Image, Layout};
pub use inode::Inode;
pub use superblock::SuperBlock;

/// Every allocation unit, metadata region and data extent is measured in blocks of this size.
pub const BLOCK_SIZE: usize = 4096;
pub const FS_MAGIC: u64 = 0xC5C3_69A1_C5C3_69A1;
/// Block 0 is reserved, the superblock lives in block 1.
pub const SUPERBLOCK_BLOCK: u32 = 1;
pub const ROOT_INODE: u32 = 0;
/// On-disk slot of one inode record; a block holds an integral number of them.
pub const INODE_SIZE: usize = 64;
pub const DENTRY_SIZE: usize = 256;
/// Maximum length of a path component, terminator included.
pub const NAME_MAX: usize = 252;
/// Maximum length of a path, terminator included.
pub const PATH_MAX: usize = 4096;
pub const EXTENT_SIZE: usize = 8;
/// Per-inode extent cap. The extent list of an inode lives in one block.
pub const MAX_EXTENTS: u32 = 512;
pub const DENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DENTRY_SIZE;
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;

const _: () = assert!(BLOCK_SIZE % INODE_SIZE == 0);
const _: () = assert!(BLOCK_SIZE % DENTRY_SIZE == 0);
const _: () = assert!(MAX_EXTENTS as usize <= BLOCK_SIZE / EXTENT_SIZE);
const _: () = assert!(DENTRY_SIZE == 4 + NAME_MAX);
