use thiserror::Error;

/// raw POSIX error number, what a kernel-facing layer replies with
pub type Errno = i32;

pub type Result<T> = std::result::Result<T, FsError>;

/// Errors returned by every engine operation.
///
/// None of them is fatal to the engine: a failed call leaves the image mountable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FsError {
    /// no free inode, no free block, or the extent cap of an inode was reached
    #[error("no space left on the filesystem")]
    NoSpace,
    #[error("no such file or directory")]
    NotFound,
    #[error("a path component is not a directory")]
    NotDirectory,
    #[error("is a directory")]
    IsDirectory,
    #[error("file name or path too long")]
    NameTooLong,
    #[error("directory not empty")]
    NotEmpty,
    #[error("entry already exists")]
    AlreadyExists,
    /// could not reserve memory for a temporary value
    #[error("memory allocation failed")]
    AllocationFailure,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid filesystem layout: {0}")]
    InvalidLayout(String),
    #[error("bad magic number {found:#x}, not an extentfs image")]
    BadMagic { found: u64 },
    /// metadata contradicts itself, e.g. a non-empty directory without extents
    #[error("corrupted metadata: {0}")]
    Corrupted(String),
    #[error("on-disk record codec error: {0}")]
    Codec(String),
    #[error("{region} access out of bounds: index {index}, limit {limit}")]
    OutOfBounds {
        region: &'static str,
        index: u64,
        limit: u64,
    },
}

impl FsError {
    /// Map this error to the errno a system-call layer should report.
    pub fn errno(&self) -> Errno {
        match self {
            FsError::NoSpace => libc::ENOSPC,
            FsError::NotFound => libc::ENOENT,
            FsError::NotDirectory => libc::ENOTDIR,
            FsError::IsDirectory => libc::EISDIR,
            FsError::NameTooLong => libc::ENAMETOOLONG,
            FsError::NotEmpty => libc::ENOTEMPTY,
            FsError::AlreadyExists => libc::EEXIST,
            FsError::AllocationFailure => libc::ENOMEM,
            FsError::InvalidArgument(_) | FsError::InvalidLayout(_) | FsError::BadMagic { .. } => {
                libc::EINVAL
            }
            FsError::Corrupted(_) | FsError::Codec(_) | FsError::OutOfBounds { .. } => libc::EIO,
        }
    }
}

impl From<std::collections::TryReserveError> for FsError {
    fn from(_: std::collections::TryReserveError) -> Self {
        FsError::AllocationFailure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(FsError::NoSpace.errno(), libc::ENOSPC);
        assert_eq!(FsError::NotFound.errno(), libc::ENOENT);
        assert_eq!(FsError::NotDirectory.errno(), libc::ENOTDIR);
        assert_eq!(FsError::NameTooLong.errno(), libc::ENAMETOOLONG);
        assert_eq!(FsError::NotEmpty.errno(), libc::ENOTEMPTY);
        assert_eq!(FsError::AllocationFailure.errno(), libc::ENOMEM);
        assert_eq!(FsError::BadMagic { found: 0 }.errno(), libc::EINVAL);
        assert_eq!(
            FsError::OutOfBounds {
                region: "inode table",
                index: 9,
                limit: 8
            }
            .errno(),
            libc::EIO
        );
    }

    #[test]
    fn test_try_reserve_failure_is_allocation_failure() {
        let mut s = String::new();
        let err: FsError = s.try_reserve(usize::MAX).unwrap_err().into();
        assert_eq!(err, FsError::AllocationFailure);
    }
}
