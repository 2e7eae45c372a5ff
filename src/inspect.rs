//! look inside an image file from the command line
use crate::fs::{ExtentFs, FsStats};
use anyhow::anyhow;
use byte_unit::Byte;
use memmap2::MmapMut;
use std::{fs::OpenOptions, path::Path};

/// map an image file and mount the filesystem it holds
pub fn open_image<P>(image_file_path: P) -> anyhow::Result<ExtentFs<MmapMut>>
where
    P: AsRef<Path>,
{
    let image_file_path = image_file_path.as_ref();
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(image_file_path)
        .map_err(|e| anyhow!("cannot open {}: {e}", image_file_path.display()))?;
    let image = unsafe { MmapMut::map_mut(&file)? };
    ExtentFs::mount(image)
        .map_err(|e| anyhow!("cannot mount {}: {e}", image_file_path.display()))
}

pub fn stats<P: AsRef<Path>>(image_file_path: P) -> anyhow::Result<FsStats> {
    Ok(open_image(image_file_path)?.filesystem_stats()?)
}

/// names in a directory, `.` and `..` included
pub fn list<P: AsRef<Path>>(image_file_path: P, path: &str) -> anyhow::Result<Vec<String>> {
    let fs = open_image(image_file_path)?;
    let ino = fs.lookup(path)?;
    Ok(fs.list_entries(ino)?)
}

/// the whole content of a regular file
pub fn cat<P: AsRef<Path>>(image_file_path: P, path: &str) -> anyhow::Result<Vec<u8>> {
    let fs = open_image(image_file_path)?;
    let ino = fs.lookup(path)?;
    let size = usize::try_from(fs.stat(ino)?.size)?;
    let mut content = Vec::new();
    content.try_reserve_exact(size)?;
    content.resize(size, 0);
    fs.read(ino, 0, &mut content)?;
    Ok(content)
}

/// human readable report of [FsStats]
pub fn render_stats(stats: &FsStats) -> String {
    let bytes = |blocks: u32| {
        Byte::from_bytes(blocks as u128 * stats.block_size as u128).get_appropriate_unit(true)
    };
    format!(
        "block size:  {}\n\
         blocks:      {} total, {} free ({} of {})\n\
         inodes:      {} total, {} free\n\
         directories: {}\n\
         name max:    {}",
        stats.block_size,
        stats.total_blocks,
        stats.free_blocks,
        bytes(stats.free_blocks),
        bytes(stats.total_blocks),
        stats.total_inodes,
        stats.free_inodes,
        stats.directories,
        stats.name_max
    )
}
