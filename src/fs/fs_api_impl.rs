use log::info;

use crate::utils::{
    fs_size_calculator::sectors,
    time_util::{self, Timestamp},
};

use super::{
    fs_layout::Storage, BitmapKind, DirEntry, ExtentFs, FileKind, FsError, Inode, Result,
    BLOCK_SIZE, MAX_EXTENTS, NAME_MAX,
};

/// What `stat` reports about an inode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes {
    pub ino: u32,
    pub kind: FileKind,
    /// file type and permission bits
    pub mode: u32,
    pub links: u32,
    pub size: u64,
    pub mtime: Timestamp,
    /// 512-byte sectors held by the inode, its extent-list block included
    pub blocks: u64,
    pub extents: u32,
}

/// How `set_mtime` changes the modification time, after `utimensat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MtimeUpdate {
    Now,
    /// leave the modification time alone
    Omit,
    At(Timestamp),
}

/// Global counters, in the shape of `statvfs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsStats {
    pub block_size: u32,
    pub total_blocks: u32,
    pub free_blocks: u32,
    pub total_inodes: u32,
    pub free_inodes: u32,
    pub directories: u32,
    pub name_max: u32,
}

impl From<&Inode> for Attributes {
    fn from(inode: &Inode) -> Self {
        let list_block = u64::from(inode.extent_count > 0);
        Attributes {
            ino: inode.inode_number,
            kind: inode.file_kind(),
            mode: inode.mode,
            links: inode.hard_links,
            size: inode.size,
            mtime: inode.modified_at,
            blocks: sectors(inode.data_blocks() + list_block),
            extents: inode.extent_count,
        }
    }
}

/// Operations a system-call layer is built on.
///
/// Paths are absolute, inode numbers come from [ExtentFs::lookup] or from
/// the return value of a creating call.
impl<S: Storage> ExtentFs<S> {
    /// # Return
    /// the inode number `path` resolves to
    pub fn lookup(&self, path: &str) -> Result<u32> {
        info!("lookup() called with path: {path:?}");
        self.resolve(path)
    }

    pub fn stat(&self, ino: u32) -> Result<Attributes> {
        info!("stat() called with inode number: {ino}");
        let inode = self.find_inode(ino)?;
        Ok(Attributes::from(&inode))
    }

    /// Names in directory `ino`, `.` and `..` first and the rest in storage order.
    ///
    /// The order of stored entries changes whenever an entry is removed.
    pub fn list_entries(&self, ino: u32) -> Result<Vec<String>> {
        info!("list_entries() called with inode number: {ino}");
        let dir = self.find_inode(ino)?;
        if !dir.is_dir() {
            return Err(FsError::NotDirectory);
        }
        let entries = self.entries(&dir)?;
        let mut names = Vec::new();
        names.try_reserve(entries.len() + 2)?;
        names.push(".".to_string());
        names.push("..".to_string());
        names.extend(entries.into_iter().map(|entry| entry.name));
        Ok(names)
    }

    /// create a directory
    /// # Return
    /// the inode number of the new directory
    pub fn mkdir(&mut self, path: &str, mode: u32) -> Result<u32> {
        info!("mkdir() called with path: {path:?}, mode: {mode:o}");
        let ino = self.create_entry(path, FileKind::Directory, mode)?;
        self.update_superblock(|sb| sb.dir_count += 1)?;
        Ok(ino)
    }

    /// create an empty regular file
    /// # Return
    /// the inode number of the new file
    pub fn create_file(&mut self, path: &str, mode: u32) -> Result<u32> {
        info!("create_file() called with path: {path:?}, mode: {mode:o}");
        self.create_entry(path, FileKind::RegularFile, mode)
    }

    fn create_entry(&mut self, path: &str, kind: FileKind, mode: u32) -> Result<u32> {
        let (mut parent, name) = self.resolve_parent(path)?;
        if self.find_entry(&parent, &name)?.is_some() {
            return Err(FsError::AlreadyExists);
        }
        self.check_room_for_entry(&parent)?;

        let ino = self.allocate_bit(BitmapKind::Inode)?;
        let added = DirEntry::new(ino, &name).and_then(|entry| self.add_entry(&mut parent, &entry));
        if let Err(e) = added {
            self.clear_bits(BitmapKind::Inode, ino, 1)?;
            return Err(e);
        }
        let mut inode = Inode::new(ino, kind, mode);
        inode.hard_links = match kind {
            FileKind::Directory => 2,
            _ => 1,
        };
        self.save_inode(&inode)?;
        self.save_inode(&parent)?;
        Ok(ino)
    }

    /// Fail early with [FsError::NoSpace] unless an inode is free and `dir`
    /// can take one more entry.
    fn check_room_for_entry(&self, dir: &Inode) -> Result<()> {
        let superblock = self.superblock()?;
        if superblock.free_inodes == 0 {
            return Err(FsError::NoSpace);
        }
        if dir.size % BLOCK_SIZE as u64 == 0 {
            // a fresh directory block, and the extent list of an empty directory
            let needed = 1 + u32::from(dir.extent_count == 0);
            if superblock.free_blocks < needed || dir.extent_count >= MAX_EXTENTS {
                return Err(FsError::NoSpace);
            }
        }
        Ok(())
    }

    /// Fail early with [FsError::NoSpace] unless `inode` can grow to `new_size` bytes.
    fn check_room_for_size(&self, inode: &Inode, new_size: u64) -> Result<()> {
        let blocks = new_size.div_ceil(BLOCK_SIZE as u64);
        if blocks <= inode.data_blocks() {
            return Ok(());
        }
        let list_block = u64::from(inode.extent_count == 0);
        let needed = blocks - inode.data_blocks() + list_block;
        if needed > self.superblock()?.free_blocks as u64 {
            return Err(FsError::NoSpace);
        }
        Ok(())
    }

    /// remove an empty directory
    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        info!("rmdir() called with path: {path:?}");
        let (mut parent, name) = self.resolve_parent(path)?;
        let (index, entry) = self.find_entry(&parent, &name)?.ok_or(FsError::NotFound)?;
        let mut dir = self.find_inode(entry.inode_number)?;
        if !dir.is_dir() {
            return Err(FsError::NotDirectory);
        }
        if dir.size > 0 {
            return Err(FsError::NotEmpty);
        }
        self.remove_entry(&mut parent, index)?;
        self.save_inode(&parent)?;
        self.release_all_extents(&mut dir)?;
        self.clear_bits(BitmapKind::Inode, dir.inode_number, 1)?;
        self.update_superblock(|sb| sb.dir_count = sb.dir_count.saturating_sub(1))
    }

    /// remove a regular file and release its data
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        info!("unlink() called with path: {path:?}");
        let (mut parent, name) = self.resolve_parent(path)?;
        let (index, entry) = self.find_entry(&parent, &name)?.ok_or(FsError::NotFound)?;
        let mut file = self.find_inode(entry.inode_number)?;
        if file.is_dir() {
            return Err(FsError::IsDirectory);
        }
        self.remove_entry(&mut parent, index)?;
        self.save_inode(&parent)?;
        self.release_all_extents(&mut file)?;
        self.clear_bits(BitmapKind::Inode, file.inode_number, 1)
    }

    pub fn set_mtime(&mut self, ino: u32, update: MtimeUpdate) -> Result<()> {
        info!("set_mtime() called with inode number: {ino}, update: {update:?}");
        let mut inode = self.find_inode(ino)?;
        inode.modified_at = match update {
            MtimeUpdate::Omit => return Ok(()),
            MtimeUpdate::Now => time_util::now(),
            MtimeUpdate::At(time) => time,
        };
        self.save_inode(&inode)
    }

    /// Truncate or zero-extend a regular file to `new_size` bytes.
    ///
    /// A failed extension leaves the file exactly as it was.
    pub fn resize(&mut self, ino: u32, new_size: u64) -> Result<()> {
        info!("resize() called with inode number: {ino}, new size: {new_size}");
        let mut file = self.find_file(ino)?;
        self.check_room_for_size(&file, new_size)?;
        self.set_size(&mut file, new_size)?;
        file.update_modified_at();
        self.save_inode(&file)
    }

    /// read `buf.len()` bytes at `offset`
    /// # Return
    /// the number of bytes backed by file data, the rest of `buf` is zero-filled
    pub fn read(&self, ino: u32, offset: u64, buf: &mut [u8]) -> Result<usize> {
        info!(
            "read() called with inode number: {ino}, offset: {offset}, size: {}",
            buf.len()
        );
        let file = self.find_file(ino)?;
        self.read_at(&file, offset, buf)
    }

    /// Write `data` at `offset`, growing the file first when the range ends past it.
    /// # Return
    /// the number of bytes written, always `data.len()`
    pub fn write(&mut self, ino: u32, offset: u64, data: &[u8]) -> Result<usize> {
        info!(
            "write() called with inode number: {ino}, offset: {offset}, size: {}",
            data.len()
        );
        let mut file = self.find_file(ino)?;
        let end = offset.saturating_add(data.len() as u64);
        self.check_room_for_size(&file, end)?;
        let written = self.write_at(&mut file, offset, data)?;
        file.update_modified_at();
        self.save_inode(&file)?;
        Ok(written)
    }

    fn find_file(&self, ino: u32) -> Result<Inode> {
        let inode = self.find_inode(ino)?;
        if inode.is_dir() {
            return Err(FsError::IsDirectory);
        }
        Ok(inode)
    }

    pub fn filesystem_stats(&self) -> Result<FsStats> {
        info!("filesystem_stats() called");
        let superblock = self.superblock()?;
        Ok(FsStats {
            block_size: BLOCK_SIZE as u32,
            total_blocks: superblock.block_count,
            free_blocks: superblock.free_blocks,
            total_inodes: superblock.inode_count,
            free_inodes: superblock.free_inodes,
            directories: superblock.dir_count,
            name_max: NAME_MAX as u32 - 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::fs::{fs_layout::tests::test_fs, ROOT_INODE};

    /// a 1 MiB image with 64 inodes
    fn small_fs() -> ExtentFs<Vec<u8>> {
        test_fs(256, 64)
    }

    fn counts<S: Storage>(fs: &ExtentFs<S>) -> (u32, u32) {
        let stats = fs.filesystem_stats().expect("stats");
        (stats.free_inodes, stats.free_blocks)
    }

    #[test]
    fn test_fresh_root() -> anyhow::Result<()> {
        let fs = small_fs();
        let root = fs.stat(fs.lookup("/")?)?;
        assert_eq!(root.ino, ROOT_INODE);
        assert_eq!(root.kind, FileKind::Directory);
        assert_eq!((root.links, root.size, root.blocks), (2, 0, 0));
        assert_eq!(fs.filesystem_stats()?.free_inodes, 63);
        assert_eq!(fs.list_entries(ROOT_INODE)?, [".", ".."]);
        Ok(())
    }

    #[test]
    fn test_nested_directories() -> anyhow::Result<()> {
        let mut fs = small_fs();
        let a = fs.mkdir("/a", 0o755)?;
        let b = fs.mkdir("/a/b", 0o755)?;
        assert_eq!(fs.lookup("/a")?, a);
        assert_eq!(fs.lookup("/a/b")?, b);
        assert_eq!(fs.lookup("/a/b/c"), Err(FsError::NotFound));
        assert_eq!(fs.list_entries(a)?, [".", "..", "b"]);
        assert_eq!(fs.stat(b)?.mode, libc::S_IFDIR as u32 | 0o755);
        assert_eq!(fs.filesystem_stats()?.directories, 3);
        assert_eq!(fs.mkdir("/a", 0o755), Err(FsError::AlreadyExists));
        Ok(())
    }

    #[test]
    fn test_write_and_read_ten_thousand_bytes() -> anyhow::Result<()> {
        let mut fs = small_fs();
        let ino = fs.create_file("/f", 0o644)?;
        let data: Vec<u8> = (0..10_000u32).map(|i| (i * 7 % 251) as u8).collect();
        assert_eq!(fs.write(ino, 0, &data)?, data.len());

        let attributes = fs.stat(ino)?;
        assert_eq!(attributes.size, 10_000);
        // 4096 + 4096 + 1808 bytes, plus the extent list
        assert_eq!(attributes.blocks, sectors(4));
        let mut buf = vec![0u8; data.len()];
        assert_eq!(fs.read(ino, 0, &mut buf)?, data.len());
        assert_eq!(buf, data);
        Ok(())
    }

    #[test]
    fn test_truncate_to_zero_frees_every_block() -> anyhow::Result<()> {
        let mut fs = small_fs();
        let ino = fs.create_file("/f", 0o644)?;
        let (_, free_blocks) = counts(&fs);
        fs.write(ino, 0, &[1u8; 10_000])?;
        assert_eq!(counts(&fs).1, free_blocks - 4);
        fs.resize(ino, 0)?;
        assert_eq!(counts(&fs).1, free_blocks);
        let attributes = fs.stat(ino)?;
        assert_eq!((attributes.size, attributes.extents), (0, 0));
        Ok(())
    }

    #[test]
    fn test_rmdir_non_empty_directory() -> anyhow::Result<()> {
        let mut fs = small_fs();
        let before = counts(&fs);
        fs.mkdir("/d", 0o755)?;
        fs.create_file("/d/x", 0o644)?;
        assert_eq!(fs.rmdir("/d"), Err(FsError::NotEmpty));

        fs.unlink("/d/x")?;
        fs.rmdir("/d")?;
        assert_eq!(counts(&fs), before);
        assert_eq!(fs.lookup("/d"), Err(FsError::NotFound));
        let root = fs.stat(ROOT_INODE)?;
        assert_eq!((root.links, root.size), (2, 0));
        assert_eq!(fs.filesystem_stats()?.directories, 1);
        Ok(())
    }

    #[test]
    fn test_wrong_kind_errors() -> anyhow::Result<()> {
        let mut fs = small_fs();
        let dir = fs.mkdir("/d", 0o755)?;
        let file = fs.create_file("/f", 0o644)?;
        assert_eq!(fs.unlink("/d"), Err(FsError::IsDirectory));
        assert_eq!(fs.rmdir("/f"), Err(FsError::NotDirectory));
        assert_eq!(fs.create_file("/f/x", 0o644), Err(FsError::NotDirectory));
        assert_eq!(fs.list_entries(file), Err(FsError::NotDirectory));
        assert_eq!(fs.resize(dir, 10), Err(FsError::IsDirectory));
        assert_eq!(fs.read(dir, 0, &mut [0u8; 4]), Err(FsError::IsDirectory));
        assert!(matches!(fs.rmdir("/"), Err(FsError::InvalidArgument(_))));
        assert_eq!(fs.unlink("/nothing"), Err(FsError::NotFound));
        assert_eq!(
            fs.create_file(&format!("/{}", "n".repeat(NAME_MAX)), 0o644),
            Err(FsError::NameTooLong)
        );
        Ok(())
    }

    #[test]
    fn test_inode_exhaustion() -> anyhow::Result<()> {
        let mut fs = test_fs(64, 4);
        for name in ["/a", "/b", "/c"] {
            fs.create_file(name, 0o644)?;
        }
        let before = counts(&fs);
        assert_eq!(fs.create_file("/d", 0o644), Err(FsError::NoSpace));
        assert_eq!(counts(&fs), before);
        assert_eq!(fs.list_entries(ROOT_INODE)?.len(), 5);
        Ok(())
    }

    #[test]
    fn test_resize_without_space_changes_nothing() -> anyhow::Result<()> {
        let mut fs = test_fs(64, 16);
        let ino = fs.create_file("/f", 0o644)?;
        fs.write(ino, 0, b"abc")?;
        let before = counts(&fs);
        assert_eq!(fs.resize(ino, 1 << 30), Err(FsError::NoSpace));
        assert_eq!(counts(&fs), before);
        assert_eq!(fs.stat(ino)?.size, 3);
        Ok(())
    }

    #[test]
    fn test_extent_cap_is_no_space() -> anyhow::Result<()> {
        let mut fs = test_fs(1200, 16);
        let data_blocks = fs.image.layout().data_block_count();
        // occupy every odd block so no two acquisitions are contiguous
        for block in (1..data_blocks).step_by(2) {
            fs.set_bits(BitmapKind::Block, block, 1)?;
        }
        let ino = fs.create_file("/fragmented", 0o644)?;
        let chunk = [0x5au8; BLOCK_SIZE];
        for i in 0..MAX_EXTENTS as u64 {
            fs.write(ino, i * BLOCK_SIZE as u64, &chunk)?;
        }
        assert_eq!(fs.stat(ino)?.extents, MAX_EXTENTS);

        let before = counts(&fs);
        assert!(before.1 > 0);
        let size = fs.stat(ino)?.size;
        assert_eq!(fs.write(ino, size, &chunk), Err(FsError::NoSpace));
        assert_eq!(counts(&fs), before);
        let attributes = fs.stat(ino)?;
        assert_eq!((attributes.size, attributes.extents), (size, MAX_EXTENTS));
        Ok(())
    }

    #[test]
    fn test_write_fills_two_block_holes() -> anyhow::Result<()> {
        let mut fs = test_fs(64, 16);
        let data_blocks = fs.image.layout().data_block_count();
        // every third block is taken, leaving holes of two blocks
        for block in (2..data_blocks).step_by(3) {
            fs.set_bits(BitmapKind::Block, block, 1)?;
        }
        let before = counts(&fs);
        let ino = fs.create_file("/scattered", 0o644)?;
        let data: Vec<u8> = (0..5 * BLOCK_SIZE).map(|i| (i % 253) as u8).collect();
        fs.write(ino, 0, &data)?;

        let attributes = fs.stat(ino)?;
        assert_eq!((attributes.size, attributes.extents), (data.len() as u64, 3));
        let mut buf = vec![0u8; data.len()];
        assert_eq!(fs.read(ino, 0, &mut buf)?, data.len());
        assert_eq!(buf, data);

        fs.unlink("/scattered")?;
        assert_eq!(counts(&fs), before);
        Ok(())
    }

    #[test]
    fn test_set_mtime() -> anyhow::Result<()> {
        let mut fs = small_fs();
        let ino = fs.create_file("/f", 0o644)?;
        let at = Timestamp { sec: 1_000, nsec: 5 };
        fs.set_mtime(ino, MtimeUpdate::At(at))?;
        assert_eq!(fs.stat(ino)?.mtime, at);
        fs.set_mtime(ino, MtimeUpdate::Omit)?;
        assert_eq!(fs.stat(ino)?.mtime, at);
        fs.set_mtime(ino, MtimeUpdate::Now)?;
        assert!(fs.stat(ino)?.mtime > at);
        assert_eq!(fs.set_mtime(40, MtimeUpdate::Now), Err(FsError::NotFound));
        Ok(())
    }

    #[test]
    fn test_listing_order_after_removal() -> anyhow::Result<()> {
        let mut fs = small_fs();
        for name in ["/a", "/b", "/c"] {
            fs.create_file(name, 0o644)?;
        }
        fs.unlink("/a")?;
        assert_eq!(fs.list_entries(ROOT_INODE)?, [".", "..", "c", "b"]);
        Ok(())
    }

    #[test]
    fn test_state_survives_remount() -> anyhow::Result<()> {
        let mut fs = small_fs();
        fs.mkdir("/dir", 0o700)?;
        let ino = fs.create_file("/dir/file", 0o600)?;
        fs.write(ino, 0, b"persisted")?;
        let fs = ExtentFs::mount(fs.into_inner())?;
        let ino = fs.lookup("/dir/file")?;
        let mut buf = [0u8; 9];
        fs.read(ino, 0, &mut buf)?;
        assert_eq!(&buf, b"persisted");
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn create_then_delete_restores_free_counts(
            sizes in proptest::collection::vec(0_usize..20_000, 1..24),
        ) {
            let mut fs = small_fs();
            let before = counts(&fs);
            fs.mkdir("/d", 0o755).unwrap();
            for (i, size) in sizes.iter().enumerate() {
                let ino = fs.create_file(&format!("/d/f{i}"), 0o644).unwrap();
                fs.write(ino, 0, &vec![i as u8; *size]).unwrap();
            }
            for i in 0..sizes.len() {
                fs.unlink(&format!("/d/f{i}")).unwrap();
            }
            fs.rmdir("/d").unwrap();
            prop_assert_eq!(counts(&fs), before);
        }

        #[test]
        fn write_then_read_returns_written_bytes(
            offset in 0_u64..(3 * BLOCK_SIZE as u64),
            data in proptest::collection::vec(any::<u8>(), 1..6_000),
        ) {
            let mut fs = small_fs();
            let ino = fs.create_file("/f", 0o644).unwrap();
            fs.write(ino, 0, &[0xee; 100]).unwrap();
            fs.write(ino, offset, &data).unwrap();
            let mut buf = vec![0u8; data.len()];
            prop_assert_eq!(fs.read(ino, offset, &mut buf).unwrap(), data.len());
            prop_assert_eq!(buf, data);
        }

        #[test]
        fn extend_then_truncate_restores_content(
            original in proptest::collection::vec(any::<u8>(), 0..9_000),
            extra in 1_u64..20_000,
        ) {
            let mut fs = small_fs();
            let ino = fs.create_file("/f", 0o644).unwrap();
            fs.write(ino, 0, &original).unwrap();
            let (_, free_blocks) = counts(&fs);

            let len = original.len() as u64;
            fs.resize(ino, len + extra).unwrap();
            let mut tail = vec![0xffu8; extra as usize];
            fs.read(ino, len, &mut tail).unwrap();
            prop_assert!(tail.iter().all(|&b| b == 0));

            fs.resize(ino, len).unwrap();
            prop_assert_eq!(counts(&fs).1, free_blocks);
            let mut buf = vec![0u8; original.len()];
            fs.read(ino, 0, &mut buf).unwrap();
            prop_assert_eq!(buf, original);
        }

        #[test]
        fn read_past_end_is_zero_filled(
            len in 0_usize..5_000,
            gap in 0_u64..10_000,
            want in 1_usize..5_000,
        ) {
            let mut fs = small_fs();
            let ino = fs.create_file("/f", 0o644).unwrap();
            fs.write(ino, 0, &vec![7u8; len]).unwrap();
            let mut buf = vec![0xffu8; want];
            prop_assert_eq!(fs.read(ino, len as u64 + gap, &mut buf).unwrap(), 0);
            prop_assert!(buf.iter().all(|&b| b == 0));
        }
    }
}
