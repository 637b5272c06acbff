//! Filesystem access behind a narrow capability trait.
//!
//! The table repository and the mount lifecycle never touch `std::fs`
//! directly; they go through [`FileSystemGateway`] so tests can substitute
//! an in-memory implementation.

use std::fs;
use std::io;
use std::path::Path;

/// The file and directory operations the mount machinery needs.
pub trait FileSystemGateway {
    /// Reads a whole file into a string.
    fn read_file(&self, path: &Path) -> io::Result<String>;

    /// Writes a whole file, replacing any previous content.
    fn write_file(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Returns true if a file exists at `path`.
    fn file_exists(&self, path: &Path) -> bool;

    /// Creates a directory, including missing parents.
    fn create_directory(&self, path: &Path) -> io::Result<()>;

    /// Removes a directory and its contents.
    fn remove_directory(&self, path: &Path) -> io::Result<()>;

    /// Returns true if a directory exists at `path`.
    fn directory_exists(&self, path: &Path) -> bool;

    /// Returns true if the directory has no entries. A missing directory
    /// counts as empty.
    fn directory_empty(&self, path: &Path) -> io::Result<bool>;
}

/// [`FileSystemGateway`] backed by the host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

impl FileSystemGateway for RealFileSystem {
    fn read_file(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write_file(&self, path: &Path, content: &str) -> io::Result<()> {
        fs::write(path, content)
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn create_directory(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn remove_directory(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }

    fn directory_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn directory_empty(&self, path: &Path) -> io::Result<bool> {
        if !path.is_dir() {
            return Ok(true);
        }
        Ok(fs::read_dir(path)?.next().is_none())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_real_fs_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table");

        let fs = RealFileSystem;
        assert!(!fs.file_exists(&path));

        fs.write_file(&path, "a b c\n").unwrap();
        assert!(fs.file_exists(&path));
        assert_eq!(fs.read_file(&path).unwrap(), "a b c\n");
    }

    #[test]
    fn test_real_fs_directory_lifecycle() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("shares").join("a");

        let fs = RealFileSystem;
        assert!(!fs.directory_exists(&target));
        assert!(fs.directory_empty(&target).unwrap());

        fs.create_directory(&target).unwrap();
        assert!(fs.directory_exists(&target));
        assert!(fs.directory_empty(&target).unwrap());

        fs.write_file(&target.join("marker"), "x").unwrap();
        assert!(!fs.directory_empty(&target).unwrap());

        fs.remove_directory(&target).unwrap();
        assert!(!fs.directory_exists(&target));
    }

    #[test]
    fn test_memory_fs_clones_share_state() {
        let fs = memory::MemoryFileSystem::new();
        let clone = fs.clone();

        clone.add_file("/etc/fstab", "content");
        assert_eq!(fs.file_content("/etc/fstab").unwrap(), "content");
    }
}
