//! create our filesystem on an image file
use crate::fs::{self, BLOCK_SIZE};
use anyhow::anyhow;
use byte_unit::Byte;
use memmap2::MmapMut;
use std::{fs::OpenOptions, path::Path};

/// create a new filesystem in an image file
/// # Params
/// - `image_file_path`: the path of the image file
/// - `file_size`: create or resize the image file to this many bytes, rounded
///   down to whole blocks; `None` formats the file at its current size
/// - `inode_count`: the number of inodes
/// - `force`: overwrite an image that already holds a filesystem
/// - `zero`: zero the whole image before formatting
///
/// # Return
/// an [anyhow::Result] type to indicate whether the operation is successful
pub fn mkfs<P>(
    image_file_path: P,
    file_size: Option<u64>,
    inode_count: u32,
    force: bool,
    zero: bool,
) -> anyhow::Result<()>
where
    P: AsRef<Path>,
{
    let image_file_path = image_file_path.as_ref();
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(file_size.is_some())
        .open(image_file_path)
        .map_err(|e| anyhow!("cannot open {}: {e}", image_file_path.display()))?;
    // the image must be left untouched when it is refused
    if !force && file.metadata()?.len() > 0 {
        let existing = unsafe { MmapMut::map_mut(&file)? };
        if fs::is_formatted(&existing) {
            return Err(anyhow!(
                "{} already contains a filesystem, pass --force to overwrite it",
                image_file_path.display()
            ));
        }
    }
    if let Some(size) = file_size {
        file.set_len(size - size % BLOCK_SIZE as u64)?;
    }

    let file_len = file.metadata()?.len();
    let total_size = file_len - file_len % BLOCK_SIZE as u64;
    if total_size == 0 {
        return Err(anyhow!(
            "{} is {}, smaller than one block of {}",
            image_file_path.display(),
            Byte::from_bytes(file_len as _).get_appropriate_unit(true),
            Byte::from_bytes(BLOCK_SIZE as _).get_appropriate_unit(true)
        ));
    }

    let mut image = unsafe { MmapMut::map_mut(&file)? };
    if zero {
        image.fill(0);
    }
    fs::format(&mut image, total_size, inode_count).map_err(|e| {
        anyhow!(
            "cannot format {} of {} with {inode_count} inodes: {e}",
            image_file_path.display(),
            Byte::from_bytes(total_size as _).get_appropriate_unit(true)
        )
    })?;
    image.flush()?;
    log::info!(
        "created a filesystem of {} in {}",
        Byte::from_bytes(total_size as _).get_appropriate_unit(true),
        image_file_path.display()
    );
    Ok(())
}
