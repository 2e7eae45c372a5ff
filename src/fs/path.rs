//! absolute path resolution, restarting from the root on every call
use super::{fs_layout::Storage, ExtentFs, FsError, Inode, Result, NAME_MAX, PATH_MAX, ROOT_INODE};

fn check_path(path: &str) -> Result<()> {
    if path.len() >= PATH_MAX {
        return Err(FsError::NameTooLong);
    }
    if !path.starts_with('/') {
        return Err(FsError::InvalidArgument(format!(
            "{path:?} is not an absolute path"
        )));
    }
    Ok(())
}

fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|component| !component.is_empty())
}

/// Split an absolute path into its parent directory and its last component.
/// # Example
/// `/a/b/c` gives (`/a/b`, `c`) and `/c` gives (`/`, `c`)
pub(crate) fn split_parent(path: &str) -> Result<(String, String)> {
    check_path(path)?;
    let trimmed = path.trim_end_matches('/');
    let (parent, name) = trimmed.rsplit_once('/').unwrap_or(("", trimmed));
    if name.is_empty() || name == "." || name == ".." {
        return Err(FsError::InvalidArgument(format!(
            "{path:?} does not name a new entry"
        )));
    }
    if name.len() >= NAME_MAX {
        return Err(FsError::NameTooLong);
    }
    let parent = if parent.is_empty() { "/" } else { parent };

    let mut parent_path = String::new();
    parent_path.try_reserve(parent.len())?;
    parent_path.push_str(parent);
    let mut file_name = String::new();
    file_name.try_reserve(name.len())?;
    file_name.push_str(name);
    Ok((parent_path, file_name))
}

/// path resolution
impl<S: Storage> ExtentFs<S> {
    /// Walk `path` from the root directory.
    /// # Return
    /// the inode number the path names
    pub(crate) fn resolve(&self, path: &str) -> Result<u32> {
        check_path(path)?;
        // inode numbers of the directories walked so far, for ".."
        let mut walked = vec![ROOT_INODE];
        for component in components(path) {
            if component.len() >= NAME_MAX {
                return Err(FsError::NameTooLong);
            }
            let current = *walked.last().unwrap_or(&ROOT_INODE);
            let dir = self.find_inode(current)?;
            if !dir.is_dir() {
                return Err(FsError::NotDirectory);
            }
            match component {
                "." => {}
                ".." => {
                    if walked.len() > 1 {
                        walked.pop();
                    }
                }
                name => {
                    let (_, entry) = self.find_entry(&dir, name)?.ok_or(FsError::NotFound)?;
                    walked.push(entry.inode_number);
                }
            }
        }
        let ino = *walked.last().unwrap_or(&ROOT_INODE);
        // a trailing slash only names a directory
        if path.ends_with('/') && !self.find_inode(ino)?.is_dir() {
            return Err(FsError::NotDirectory);
        }
        Ok(ino)
    }

    /// Resolve the directory that holds the last component of `path`.
    /// # Return
    /// the parent directory inode and the last component
    pub(crate) fn resolve_parent(&self, path: &str) -> Result<(Inode, String)> {
        let (parent_path, name) = split_parent(path)?;
        let parent = self.find_inode(self.resolve(&parent_path)?)?;
        if !parent.is_dir() {
            return Err(FsError::NotDirectory);
        }
        Ok((parent, name))
    }
}
