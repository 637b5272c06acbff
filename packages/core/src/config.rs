//! Runtime configuration and up-front validation.
//!
//! All paths and credentials are supplied at process start and treated as
//! read-only afterwards. Validation runs once, before any mutating
//! operation: a missing file aborts the whole run instead of failing one
//! mount at a time.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigSnafu, Result};
use crate::fs::FileSystemGateway;
use crate::mount::path_under_prefix;

/// Default static mount table.
pub const DEFAULT_FSTAB_PATH: &str = "/etc/fstab";

/// Default kernel live mount table.
pub const DEFAULT_PROC_MOUNTS_PATH: &str = "/proc/mounts";

/// Default local path prefix under which mounts are managed.
pub const DEFAULT_MANAGED_PREFIX: &str = "/shares";

/// Default per-command deadline for mount/umount invocations.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Everything the mount machinery needs to know about its host.
#[derive(Debug, Clone)]
pub struct Config {
    /// The static mount table this system persists entries into.
    pub fstab_path: PathBuf,
    /// The kernel's live mount table, read-only.
    pub proc_mounts_path: PathBuf,
    /// JSON file declaring the desired mounts.
    pub desired_mounts_path: PathBuf,
    /// Credentials file referenced from CIFS mount options.
    pub cifs_credentials_path: PathBuf,
    /// Windows domain written into CIFS mount options.
    pub cifs_domain: String,
    /// SSH identity file referenced from SSHFS mount options.
    pub ssh_identity_path: PathBuf,
    /// Login name prepended to SSHFS sources.
    pub ssh_user: String,
    /// Local path prefix scoping which table entries may be touched.
    pub managed_prefix: String,
    /// Deadline applied to each mount/umount subprocess.
    pub command_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fstab_path: DEFAULT_FSTAB_PATH.into(),
            proc_mounts_path: DEFAULT_PROC_MOUNTS_PATH.into(),
            desired_mounts_path: "mounts.json".into(),
            cifs_credentials_path: PathBuf::new(),
            cifs_domain: "ONS".to_string(),
            ssh_identity_path: PathBuf::new(),
            ssh_user: String::new(),
            managed_prefix: DEFAULT_MANAGED_PREFIX.to_string(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl Config {
    /// Returns true if `path` falls under the managed prefix.
    pub fn is_managed(&self, path: &str) -> bool {
        path_under_prefix(&self.managed_prefix, path)
    }

    /// Checks that every configured value is usable: non-empty user and
    /// prefix, and every referenced file present on the host.
    ///
    /// Collects all problems before failing so the operator sees the full
    /// list at once.
    pub fn validate<F: FileSystemGateway>(&self, fs: &F) -> Result<()> {
        let mut problems = Vec::new();

        if self.ssh_user.is_empty() {
            problems.push("SSH user is not set".to_string());
        }
        if !self.managed_prefix.starts_with('/') {
            problems.push(format!(
                "managed prefix '{}' is not an absolute path",
                self.managed_prefix
            ));
        }

        let required_files = [
            ("mount table", &self.fstab_path),
            ("live mount table", &self.proc_mounts_path),
            ("desired mounts file", &self.desired_mounts_path),
            ("CIFS credentials file", &self.cifs_credentials_path),
            ("SSH identity file", &self.ssh_identity_path),
        ];
        for (label, path) in required_files {
            if !fs.file_exists(path) {
                problems.push(format!("{} not found at {}", label, path.display()));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            ConfigSnafu {
                message: problems.join("; "),
            }
            .fail()
        }
    }
}

#[cfg(test)]
pub mod test_support {
    use super::Config;

    /// Configuration used throughout the unit tests, mirroring a typical
    /// deployment.
    pub fn test_config() -> Config {
        Config {
            cifs_credentials_path: "/etc/.cifs".into(),
            ssh_identity_path: "/root/.ssh/id_rsa_linux".into(),
            ssh_user: "dave".to_string(),
            ..Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::test_config;
    use super::*;
    use crate::error::Error;
    use crate::fs::memory::MemoryFileSystem;

    fn fs_with_all_files(config: &Config) -> MemoryFileSystem {
        let fs = MemoryFileSystem::new();
        fs.add_file(&config.fstab_path, "");
        fs.add_file(&config.proc_mounts_path, "");
        fs.add_file(&config.desired_mounts_path, "[]");
        fs.add_file(&config.cifs_credentials_path, "");
        fs.add_file(&config.ssh_identity_path, "");
        fs
    }

    #[test]
    fn test_validate_passes_with_everything_present() {
        let config = test_config();
        let fs = fs_with_all_files(&config);
        assert!(config.validate(&fs).is_ok());
    }

    #[test]
    fn test_validate_reports_all_missing_files() {
        let config = test_config();
        let fs = MemoryFileSystem::new();
        fs.add_file(&config.fstab_path, "");

        let err = config.validate(&fs).unwrap_err();
        match err {
            Error::Config { message } => {
                assert!(message.contains("live mount table"));
                assert!(message.contains("desired mounts file"));
                assert!(message.contains("CIFS credentials file"));
                assert!(message.contains("SSH identity file"));
                // The one file that was present is not reported.
                assert!(!message.contains("at /etc/fstab"));
            }
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_empty_ssh_user() {
        let mut config = test_config();
        config.ssh_user = String::new();
        let fs = fs_with_all_files(&config);

        let err = config.validate(&fs).unwrap_err();
        assert!(err.to_string().contains("SSH user"));
    }

    #[test]
    fn test_validate_rejects_relative_prefix() {
        let mut config = test_config();
        config.managed_prefix = "shares".to_string();
        let fs = fs_with_all_files(&config);

        assert!(config.validate(&fs).is_err());
    }

    #[test]
    fn test_is_managed_respects_path_boundaries() {
        let config = test_config();
        assert!(config.is_managed("/shares/a"));
        assert!(config.is_managed("/shares"));
        assert!(!config.is_managed("/sharesfoo"));
        assert!(!config.is_managed("/etc"));
    }
}
