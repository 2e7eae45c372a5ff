//! the mounted filesystem: a storage image plus the helpers every component shares

use memmap2::MmapMut;

use super::{
    image::Image, BitmapKind, Extent, FsError, Inode, Result, SuperBlock,
};

/// Any contiguous, exclusively owned byte buffer can back an [ExtentFs].
pub trait Storage: AsRef<[u8]> + AsMut<[u8]> {}

impl<T> Storage for T where T: AsRef<[u8]> + AsMut<[u8]> {}

/// A mounted extentfs image.
///
/// The engine is single-threaded: it owns its storage and every operation runs
/// to completion against it. Nothing is cached, each call reads the metadata it
/// needs from the image and writes its changes straight back.
#[derive(Debug)]
pub struct ExtentFs<S = MmapMut> {
    pub(crate) image: Image<S>,
}

impl<S: Storage> ExtentFs<S> {
    /// mount a formatted image
    /// # Params
    /// - `storage`: the whole image, usually a memory map of the image file
    /// # Return
    /// a [Result] which contains an [ExtentFs] instance if the superblock
    /// carries the magic number and describes a layout that fits `storage`
    pub fn mount(storage: S) -> Result<Self> {
        let image = Image::open(storage)?;
        log::info!("mounted extentfs image: {:?}", image.layout());
        Ok(ExtentFs { image })
    }

    /// unmount and give the storage back, e.g. to flush a memory map
    pub fn into_inner(self) -> S {
        self.image.into_inner()
    }

    pub fn superblock(&self) -> Result<SuperBlock> {
        self.image.superblock()
    }

    /// read-modify-write the superblock in place
    pub(crate) fn update_superblock<F>(&mut self, update: F) -> Result<()>
    where
        F: FnOnce(&mut SuperBlock),
    {
        let mut superblock = self.image.superblock()?;
        update(&mut superblock);
        self.image.write_superblock(&superblock)
    }

    /// Load an allocated inode.
    ///
    /// An inode whose bit is clear in the inode bitmap does not exist.
    pub(crate) fn find_inode(&self, ino: u32) -> Result<Inode> {
        let allocated = self
            .image
            .bitmap(BitmapKind::Inode)
            .get(ino as usize)
            .map(|bit| *bit)
            .unwrap_or(false);
        if !allocated {
            return Err(FsError::NotFound);
        }
        self.image.inode(ino)
    }

    pub(crate) fn save_inode(&mut self, inode: &Inode) -> Result<()> {
        self.image.write_inode(inode)
    }

    /// the extents of `inode`, in acquisition order
    pub(crate) fn extent_list(&self, inode: &Inode) -> Result<Vec<Extent>> {
        (0..inode.extent_count)
            .map(|index| self.image.extent(inode.extent_block, index))
            .collect()
    }

    pub(crate) fn last_extent(&self, inode: &Inode) -> Result<Option<Extent>> {
        match inode.extent_count {
            0 => Ok(None),
            count => self.image.extent(inode.extent_block, count - 1).map(Some),
        }
    }
}
