//! Unified error types for the sharemount-core library.
//!
//! Uses SNAFU for context-rich error handling, especially useful when the same
//! underlying error type (like `std::io::Error`) appears in different contexts.

use snafu::{ResultExt, Snafu};
use std::path::PathBuf;

use crate::mount::MountType;

/// Result type alias using the library's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all core library operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Attempted to persist a mount whose type has no protocol mapping.
    #[snafu(display("mount type '{mount_type}' is not supported"))]
    UnsupportedMountType { mount_type: MountType },

    /// OS mount invocation failed.
    #[snafu(display("failed to mount {path}: {message}"))]
    Mount { path: String, message: String },

    /// OS unmount failed, the mount point could not be removed, or the
    /// mount point was not empty when an unmount was attempted.
    #[snafu(display("failed to unmount {path}: {message}"))]
    Unmount { path: String, message: String },

    /// Mount table cleanup failed.
    #[snafu(display("mount table cleanup failed: {source}"))]
    Cleanup {
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },

    /// Required configuration value or referenced file/path missing.
    #[snafu(display("invalid configuration: {message}"))]
    Config { message: String },

    /// Mount table file not found or cannot be read.
    #[snafu(display("failed to read mount table at {}", path.display()))]
    TableRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write the mount table file.
    #[snafu(display("failed to write mount table at {}", path.display()))]
    TableWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read the desired mounts file.
    #[snafu(display("failed to read desired mounts at {}", path.display()))]
    DesiredMountsRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Desired mounts file is not a valid JSON mount list.
    #[snafu(display("failed to parse desired mounts at {}", path.display()))]
    DesiredMountsParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Failed to execute a system command.
    #[snafu(display("failed to execute command '{command}'"))]
    CommandExecution {
        command: String,
        source: std::io::Error,
    },

    /// Command ran past its deadline and was killed.
    #[snafu(display("command '{command}' timed out after {timeout_secs}s"))]
    CommandTimeout { command: String, timeout_secs: u64 },

    /// Mount point creation failed.
    #[snafu(display("failed to create mount point at {}", path.display()))]
    MountPointCreation {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Extension trait for adding context to io::Error results.
pub trait IoResultExt<T> {
    /// Add context for command execution errors.
    fn command_context(self, command: impl Into<String>) -> Result<T>;

    /// Add context for mount table read errors.
    fn table_read_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for mount table write errors.
    fn table_write_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for mount point creation errors.
    fn mount_point_context(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, std::io::Error> {
    fn command_context(self, command: impl Into<String>) -> Result<T> {
        self.context(CommandExecutionSnafu {
            command: command.into(),
        })
    }

    fn table_read_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(TableReadSnafu { path: path.into() })
    }

    fn table_write_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(TableWriteSnafu { path: path.into() })
    }

    fn mount_point_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(MountPointCreationSnafu { path: path.into() })
    }
}
