use serde::{Deserialize, Serialize};

/// an enum to describe the type of a file, derived from the mode bits of its inode
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// an regular file
    RegularFile,
    /// a directory
    Directory,
    /// Unknown
    #[default]
    Unknown,
}

impl FileKind {
    /// the `S_IFMT` bits of a mode describing this kind
    pub fn mode_bits(self) -> u32 {
        match self {
            FileKind::RegularFile => libc::S_IFREG as u32,
            FileKind::Directory => libc::S_IFDIR as u32,
            FileKind::Unknown => 0,
        }
    }
}

/// extract the [FileKind] from a full mode (type bits and permission bits)
impl From<u32> for FileKind {
    fn from(mode: u32) -> Self {
        let format = mode & libc::S_IFMT as u32;
        if format == libc::S_IFDIR as u32 {
            FileKind::Directory
        } else if format == libc::S_IFREG as u32 {
            FileKind::RegularFile
        } else {
            FileKind::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_mode() {
        assert_eq!(FileKind::from(libc::S_IFDIR as u32 | 0o777), FileKind::Directory);
        assert_eq!(FileKind::from(libc::S_IFREG as u32 | 0o644), FileKind::RegularFile);
        assert_eq!(FileKind::from(0o644), FileKind::Unknown);
        assert_eq!(
            FileKind::from(FileKind::Directory.mode_bits()),
            FileKind::Directory
        );
    }
}
