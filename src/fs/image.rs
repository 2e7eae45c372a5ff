//! A bounds-checked view over the raw image buffer.
//!
//! The image is laid out as:
//! - block 0: reserved
//! - block 1: superblock
//! - inode bitmap
//! - block bitmap, one bit per data block
//! - inode table
//! - data region: directory blocks, file blocks and extent-list blocks, interleaved
//!
//! Every access names its region and index and is validated against the
//! [Layout] computed once when the image is opened.
use std::ops::Range;

use bitvec::prelude::*;

use crate::utils::{codec::OnDiskRecord, fs_size_calculator::BITS_PER_BLOCK};

use super::{
    BitmapKind, DirEntry, Extent, FsError, Inode, Result, SuperBlock, BLOCK_SIZE,
    DENTRIES_PER_BLOCK, DENTRY_SIZE, EXTENT_SIZE, INODES_PER_BLOCK, INODE_SIZE, MAX_EXTENTS,
    SUPERBLOCK_BLOCK,
};

/// Block ranges of every region, taken from the superblock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub block_count: u32,
    pub inode_count: u32,
    pub inode_bitmap: u32,
    pub block_bitmap: u32,
    pub inode_table: u32,
    pub first_data_block: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    InodeBitmap,
    BlockBitmap,
    InodeTable,
    Data,
}

impl Region {
    fn name(self) -> &'static str {
        match self {
            Region::InodeBitmap => "inode bitmap",
            Region::BlockBitmap => "block bitmap",
            Region::InodeTable => "inode table",
            Region::Data => "data region",
        }
    }
}

impl Layout {
    /// Validate the region geometry recorded in `superblock` against an image of `image_len` bytes.
    pub fn from_superblock(superblock: &SuperBlock, image_len: usize) -> Result<Self> {
        let layout = Layout {
            block_count: superblock.block_count,
            inode_count: superblock.inode_count,
            inode_bitmap: superblock.inode_bitmap,
            block_bitmap: superblock.block_bitmap,
            inode_table: superblock.inode_table,
            first_data_block: superblock.first_data_block,
        };
        layout.validate(image_len)?;
        Ok(layout)
    }

    pub(crate) fn validate(&self, image_len: usize) -> Result<()> {
        let invalid = |reason: String| Err(FsError::InvalidLayout(reason));
        if self.inode_count == 0 {
            return invalid("the inode table must hold at least the root inode".into());
        }
        if !(SUPERBLOCK_BLOCK < self.inode_bitmap
            && self.inode_bitmap < self.block_bitmap
            && self.block_bitmap < self.inode_table
            && self.inode_table < self.first_data_block
            && self.first_data_block <= self.block_count)
        {
            return invalid(format!("regions are out of order: {self:?}"));
        }
        if self.block_count as u64 * BLOCK_SIZE as u64 > image_len as u64 {
            return invalid(format!(
                "{} blocks do not fit in an image of {image_len} bytes",
                self.block_count
            ));
        }
        if self.blocks(Region::InodeBitmap).len() as u64 * BITS_PER_BLOCK < self.inode_count as u64 {
            return invalid("inode bitmap is too small".into());
        }
        if (self.blocks(Region::BlockBitmap).len() as u64) * BITS_PER_BLOCK
            < self.data_block_count() as u64
        {
            return invalid("block bitmap is too small".into());
        }
        if (self.blocks(Region::InodeTable).len() as u64) * (INODES_PER_BLOCK as u64)
            < self.inode_count as u64
        {
            return invalid("inode table is too small".into());
        }
        Ok(())
    }

    pub fn data_block_count(&self) -> u32 {
        self.block_count - self.first_data_block
    }

    fn blocks(&self, region: Region) -> Range<u32> {
        match region {
            Region::InodeBitmap => self.inode_bitmap..self.block_bitmap,
            Region::BlockBitmap => self.block_bitmap..self.inode_table,
            Region::InodeTable => self.inode_table..self.first_data_block,
            Region::Data => self.first_data_block..self.block_count,
        }
    }

    fn bytes(&self, region: Region) -> Range<usize> {
        let blocks = self.blocks(region);
        blocks.start as usize * BLOCK_SIZE..blocks.end as usize * BLOCK_SIZE
    }
}

/// The storage image together with its validated [Layout].
///
/// `S` is any contiguous byte buffer: a `Vec<u8>`, a `&mut [u8]` or a memory map.
#[derive(Debug)]
pub struct Image<S> {
    storage: S,
    layout: Layout,
}

impl<S> Image<S>
where
    S: AsRef<[u8]> + AsMut<[u8]>,
{
    /// Open a formatted image: decode the superblock, check the magic number and the layout.
    pub fn open(storage: S) -> Result<Self> {
        let superblock = read_superblock(storage.as_ref())?;
        if !superblock.has_magic() {
            return Err(FsError::BadMagic {
                found: superblock.magic,
            });
        }
        let layout = Layout::from_superblock(&superblock, storage.as_ref().len())?;
        Ok(Image { storage, layout })
    }

    /// wrap a buffer whose layout was computed by the formatter
    pub(crate) fn with_layout(storage: S, layout: Layout) -> Result<Self> {
        layout.validate(storage.as_ref().len())?;
        Ok(Image { storage, layout })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn into_inner(self) -> S {
        self.storage
    }

    fn region(&self, region: Region) -> &[u8] {
        &self.storage.as_ref()[self.layout.bytes(region)]
    }

    fn region_mut(&mut self, region: Region) -> &mut [u8] {
        let range = self.layout.bytes(region);
        &mut self.storage.as_mut()[range]
    }

    fn slot(&self, region: Region, offset: usize, len: usize) -> Result<&[u8]> {
        let bytes = self.region(region);
        bytes.get(offset..offset + len).ok_or(FsError::OutOfBounds {
            region: region.name(),
            index: offset as u64,
            limit: bytes.len() as u64,
        })
    }

    fn slot_mut(&mut self, region: Region, offset: usize, len: usize) -> Result<&mut [u8]> {
        let bytes = self.region_mut(region);
        let limit = bytes.len() as u64;
        bytes
            .get_mut(offset..offset + len)
            .ok_or(FsError::OutOfBounds {
                region: region.name(),
                index: offset as u64,
                limit,
            })
    }

    pub fn superblock(&self) -> Result<SuperBlock> {
        read_superblock(self.storage.as_ref())
    }

    pub fn write_superblock(&mut self, superblock: &SuperBlock) -> Result<()> {
        let start = SUPERBLOCK_BLOCK as usize * BLOCK_SIZE;
        let slot = &mut self.storage.as_mut()[start..start + SuperBlock::SLOT_SIZE];
        superblock.encode_into(slot).map(|_| ())
    }

    /// The live bits of a bitmap, one per inode or per data block.
    pub fn bitmap(&self, kind: BitmapKind) -> &BitSlice<u8, Lsb0> {
        let (region, len) = self.bitmap_extent(kind);
        &self.region(region).view_bits::<Lsb0>()[..len]
    }

    pub fn bitmap_mut(&mut self, kind: BitmapKind) -> &mut BitSlice<u8, Lsb0> {
        let (region, len) = self.bitmap_extent(kind);
        &mut self.region_mut(region).view_bits_mut::<Lsb0>()[..len]
    }

    fn bitmap_extent(&self, kind: BitmapKind) -> (Region, usize) {
        match kind {
            BitmapKind::Inode => (Region::InodeBitmap, self.layout.inode_count as usize),
            BitmapKind::Block => (Region::BlockBitmap, self.layout.data_block_count() as usize),
        }
    }

    fn check_inode(&self, ino: u32) -> Result<usize> {
        if ino >= self.layout.inode_count {
            return Err(FsError::OutOfBounds {
                region: Region::InodeTable.name(),
                index: ino as u64,
                limit: self.layout.inode_count as u64,
            });
        }
        Ok(ino as usize * INODE_SIZE)
    }

    pub fn inode(&self, ino: u32) -> Result<Inode> {
        let offset = self.check_inode(ino)?;
        Inode::decode_from(self.slot(Region::InodeTable, offset, INODE_SIZE)?)
    }

    pub fn write_inode(&mut self, inode: &Inode) -> Result<()> {
        let offset = self.check_inode(inode.inode_number)?;
        let slot = self.slot_mut(Region::InodeTable, offset, INODE_SIZE)?;
        slot.fill(0);
        inode.encode_into(slot).map(|_| ())
    }

    fn check_data_block(&self, block: u32) -> Result<usize> {
        if block >= self.layout.data_block_count() {
            return Err(FsError::OutOfBounds {
                region: Region::Data.name(),
                index: block as u64,
                limit: self.layout.data_block_count() as u64,
            });
        }
        Ok(block as usize * BLOCK_SIZE)
    }

    pub fn data_block(&self, block: u32) -> Result<&[u8]> {
        let offset = self.check_data_block(block)?;
        self.slot(Region::Data, offset, BLOCK_SIZE)
    }

    pub fn data_block_mut(&mut self, block: u32) -> Result<&mut [u8]> {
        let offset = self.check_data_block(block)?;
        self.slot_mut(Region::Data, offset, BLOCK_SIZE)
    }

    fn extent_offset(&self, list_block: u32, index: u32) -> Result<usize> {
        if index >= MAX_EXTENTS {
            return Err(FsError::OutOfBounds {
                region: "extent list",
                index: index as u64,
                limit: MAX_EXTENTS as u64,
            });
        }
        Ok(self.check_data_block(list_block)? + index as usize * EXTENT_SIZE)
    }

    /// the `index`-th record of the extent list stored in data block `list_block`
    pub fn extent(&self, list_block: u32, index: u32) -> Result<Extent> {
        let offset = self.extent_offset(list_block, index)?;
        Extent::decode_from(self.slot(Region::Data, offset, EXTENT_SIZE)?)
    }

    pub fn write_extent(&mut self, list_block: u32, index: u32, extent: &Extent) -> Result<()> {
        let offset = self.extent_offset(list_block, index)?;
        extent
            .encode_into(self.slot_mut(Region::Data, offset, EXTENT_SIZE)?)
            .map(|_| ())
    }

    fn dentry_offset(&self, block: u32, slot: usize) -> Result<usize> {
        if slot >= DENTRIES_PER_BLOCK {
            return Err(FsError::OutOfBounds {
                region: "directory block",
                index: slot as u64,
                limit: DENTRIES_PER_BLOCK as u64,
            });
        }
        Ok(self.check_data_block(block)? + slot * DENTRY_SIZE)
    }

    pub fn dentry(&self, block: u32, slot: usize) -> Result<DirEntry> {
        let offset = self.dentry_offset(block, slot)?;
        DirEntry::decode_from(self.slot(Region::Data, offset, DENTRY_SIZE)?)
    }

    pub fn write_dentry(&mut self, block: u32, slot: usize, entry: &DirEntry) -> Result<()> {
        let offset = self.dentry_offset(block, slot)?;
        entry
            .encode_into(self.slot_mut(Region::Data, offset, DENTRY_SIZE)?)
            .map(|_| ())
    }

    /// Byte address, inside the whole image, of `offset` bytes into data block `block`.
    pub fn data_address(&self, block: u32, offset: usize) -> Result<usize> {
        let block_offset = self.check_data_block(block)?;
        if offset >= BLOCK_SIZE {
            return Err(FsError::OutOfBounds {
                region: "data block",
                index: offset as u64,
                limit: BLOCK_SIZE as u64,
            });
        }
        Ok(self.layout.bytes(Region::Data).start + block_offset + offset)
    }

    fn check_address(&self, address: usize, len: usize) -> Result<Range<usize>> {
        let data = self.layout.bytes(Region::Data);
        if address < data.start || address + len > data.end {
            return Err(FsError::OutOfBounds {
                region: Region::Data.name(),
                index: address as u64,
                limit: data.end as u64,
            });
        }
        Ok(address..address + len)
    }

    /// `len` bytes at an image address returned by [Image::data_address]
    pub fn bytes(&self, address: usize, len: usize) -> Result<&[u8]> {
        let range = self.check_address(address, len)?;
        Ok(&self.storage.as_ref()[range])
    }

    pub fn bytes_mut(&mut self, address: usize, len: usize) -> Result<&mut [u8]> {
        let range = self.check_address(address, len)?;
        Ok(&mut self.storage.as_mut()[range])
    }
}

/// decode the superblock of a raw image buffer
pub(crate) fn read_superblock(image: &[u8]) -> Result<SuperBlock> {
    let start = SUPERBLOCK_BLOCK as usize * BLOCK_SIZE;
    let slot = image
        .get(start..start + SuperBlock::SLOT_SIZE)
        .ok_or_else(|| {
            FsError::InvalidLayout(format!(
                "image of {} bytes is too small to hold a superblock",
                image.len()
            ))
        })?;
    SuperBlock::decode_from(slot)
}
