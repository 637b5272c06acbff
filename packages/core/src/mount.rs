//! Mount entity and share identity comparison.
//!
//! A [`Mount`] is a pure value: the local mount point, the remote share it
//! maps to, and the protocol used to reach it. Mounts carry no identity
//! beyond their fields; "updating" one means removing the old entry and
//! creating a new one.

use std::fmt;

/// Protocol token written into the table's type field for Windows shares.
pub const CIFS_TOKEN: &str = "cifs";

/// Protocol token written into the table's type field for Linux shares.
pub const SSHFS_TOKEN: &str = "fuse.sshfs";

/// The protocol family of a network share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountType {
    /// Windows share, mounted over CIFS.
    Windows,
    /// Linux share, mounted over SSHFS.
    Linux,
    /// Anything we do not recognize. Never persistable.
    None,
}

impl MountType {
    /// Resolves a protocol token (e.g. from the desired-mounts file or a
    /// table line) to a mount type. Matching is case-insensitive;
    /// unrecognized tokens resolve to [`MountType::None`].
    pub fn from_token(token: &str) -> Self {
        if token.eq_ignore_ascii_case(CIFS_TOKEN) {
            MountType::Windows
        } else if token.eq_ignore_ascii_case(SSHFS_TOKEN) {
            MountType::Linux
        } else {
            MountType::None
        }
    }

    /// The type-field token for this mount type, if it has one.
    pub fn fstab_type(&self) -> Option<&'static str> {
        match self {
            MountType::Windows => Some(CIFS_TOKEN),
            MountType::Linux => Some(SSHFS_TOKEN),
            MountType::None => None,
        }
    }
}

impl fmt::Display for MountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.fstab_type().unwrap_or("none"))
    }
}

/// A declared or discovered share mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// Absolute local path of the mount point.
    pub mount_path: String,
    /// Remote source location. SSHFS sources may carry a `user@` prefix.
    pub actual_path: String,
    /// Protocol family.
    pub mount_type: MountType,
}

impl Mount {
    /// Creates a new mount value.
    pub fn new(
        mount_path: impl Into<String>,
        actual_path: impl Into<String>,
        mount_type: MountType,
    ) -> Self {
        Self {
            mount_path: mount_path.into(),
            actual_path: actual_path.into(),
            mount_type,
        }
    }

    /// Returns true if both mounts describe the same share.
    ///
    /// This is the comparison the reconciler uses to decide whether an
    /// existing mount needs updating. It differs from `==` in exactly one
    /// way: any leading `user@` segment is stripped from both source paths
    /// first, so the SSH login name is not part of share identity.
    pub fn same_share(&self, other: &Mount) -> bool {
        self.mount_path == other.mount_path
            && self.mount_type == other.mount_type
            && strip_ssh_user(&self.actual_path) == strip_ssh_user(&other.actual_path)
    }
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({})",
            self.mount_path, self.actual_path, self.mount_type
        )
    }
}

/// Strips a leading `user@` segment from a source path.
///
/// Everything up to and including the first `@` is dropped, matching how
/// SSHFS sources are written (`user@host:/path`). Paths without an `@` are
/// returned unchanged.
pub fn strip_ssh_user(path: &str) -> &str {
    match path.split_once('@') {
        Some((_, rest)) => rest,
        None => path,
    }
}

/// Returns true if `path` equals `prefix` or lies underneath it.
///
/// Plain string prefixing is not enough: `/sharesfoo` must not count as
/// under `/shares`.
pub fn path_under_prefix(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
