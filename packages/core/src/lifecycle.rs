//! Mount lifecycle: state transitions for a mount point on the live host.
//!
//! A managed path moves `absent -> registered` (table entry written, mount
//! point directory exists) `-> mounted` (OS mount succeeded); unmounting
//! walks back down. This module composes the table repository, the
//! filesystem gateway, and the command executor, and is the only place OS
//! mount/umount commands are invoked.

use std::path::Path;

use log::{info, warn};
use serde::Deserialize;
use snafu::ResultExt;

use crate::config::Config;
use crate::error::{
    CleanupSnafu, DesiredMountsParseSnafu, DesiredMountsReadSnafu, Error, IoResultExt, MountSnafu,
    Result, UnmountSnafu,
};
use crate::executor::CommandExecutor;
use crate::fs::FileSystemGateway;
use crate::fstab::MountTableRepository;
use crate::mount::{Mount, MountType};

/// Provides the reconciler with mounts to inspect and act on.
pub trait MountRepository {
    /// The declared target state, read fresh from the desired-mounts file.
    fn desired_mounts(&self) -> Result<Vec<Mount>>;

    /// Managed table entries confirmed live in the kernel mount table.
    fn current_mounts(&self) -> Result<Vec<Mount>>;

    /// Managed table entries that are NOT live: declared but unmounted.
    fn orphan_mounts(&self) -> Result<Vec<Mount>>;

    /// Registers and mounts a share.
    fn mount(&self, mount: &Mount) -> Result<()>;

    /// Unregisters and unmounts the share at `mount_path`.
    fn unmount(&self, mount_path: &str) -> Result<()>;

    /// Takes down every current mount, isolating per-mount failures.
    /// Returns the mounts that could not be unmounted.
    fn unmount_all(&self) -> Result<Vec<Mount>>;

    /// Prunes the persisted table against the live mount table.
    fn cleanup(&self) -> Result<()>;
}

/// One element of the desired-mounts JSON array.
#[derive(Debug, Deserialize)]
struct DeclaredMount {
    mount_path: String,
    actual_path: String,
    mount_type: String,
}

/// [`MountRepository`] backed by the host: fstab-format table, real
/// directories, and mount/umount subprocesses.
#[derive(Debug, Clone)]
pub struct MountLifecycle<T, F, E> {
    table: T,
    fs: F,
    executor: E,
    config: Config,
}

impl<T, F, E> MountLifecycle<T, F, E>
where
    T: MountTableRepository,
    F: FileSystemGateway,
    E: CommandExecutor,
{
    /// Creates a lifecycle repository from its collaborators.
    pub fn new(table: T, fs: F, executor: E, config: Config) -> Self {
        Self {
            table,
            fs,
            executor,
            config,
        }
    }

    /// Table entries under the managed prefix, live or not.
    fn managed_system_mounts(&self) -> Result<Vec<Mount>> {
        Ok(self
            .table
            .all_system_mounts()?
            .into_iter()
            .filter(|mount| self.config.is_managed(&mount.mount_path))
            .collect())
    }

    /// Runs `umount` for a live path. An already-unmounted path is a
    /// logged no-op success.
    fn perform_unmount(&self, mount_path: &str) -> Result<()> {
        if !self.table.is_mounted(mount_path)? {
            info!("{mount_path} is not mounted, skipping unmount command");
            return Ok(());
        }

        match self.executor.run("umount", &[mount_path]) {
            Ok(output) if output.success => Ok(()),
            Ok(output) => UnmountSnafu {
                path: mount_path,
                message: output.stderr.trim().to_string(),
            }
            .fail(),
            Err(err) => UnmountSnafu {
                path: mount_path,
                message: err.to_string(),
            }
            .fail(),
        }
    }

    /// Removes the mount point directory if it still exists.
    fn remove_mount_point(&self, mount_path: &str) -> Result<()> {
        let dir = Path::new(mount_path);
        if self.fs.directory_exists(dir) {
            self.fs
                .remove_directory(dir)
                .map_err(|err| Error::Unmount {
                    path: mount_path.to_string(),
                    message: format!("failed to remove mount point: {err}"),
                })?;
        }
        Ok(())
    }
}

impl<T, F, E> MountRepository for MountLifecycle<T, F, E>
where
    T: MountTableRepository,
    F: FileSystemGateway,
    E: CommandExecutor,
{
    fn desired_mounts(&self) -> Result<Vec<Mount>> {
        let path = &self.config.desired_mounts_path;
        let content = self
            .fs
            .read_file(path)
            .context(DesiredMountsReadSnafu { path: path.clone() })?;
        let declared: Vec<DeclaredMount> =
            serde_json::from_str(&content).context(DesiredMountsParseSnafu { path: path.clone() })?;

        let mut mounts = Vec::with_capacity(declared.len());
        for raw in declared {
            let mount_type = MountType::from_token(&raw.mount_type);
            // SSHFS sources are mounted as a specific login.
            let actual_path = if mount_type == MountType::Linux {
                format!("{}@{}", self.config.ssh_user, raw.actual_path)
            } else {
                raw.actual_path
            };

            if !self.config.is_managed(&raw.mount_path) {
                warn!(
                    "ignoring declared mount {} outside managed prefix {}",
                    raw.mount_path, self.config.managed_prefix
                );
                continue;
            }

            mounts.push(Mount::new(raw.mount_path, actual_path, mount_type));
        }
        Ok(mounts)
    }

    fn current_mounts(&self) -> Result<Vec<Mount>> {
        let mut current = Vec::new();
        for mount in self.managed_system_mounts()? {
            if self.table.is_mounted(&mount.mount_path)? {
                current.push(mount);
            } else {
                warn!(
                    "{} is in the mount table but not mounted; treating as orphan",
                    mount.mount_path
                );
            }
        }
        Ok(current)
    }

    fn orphan_mounts(&self) -> Result<Vec<Mount>> {
        let mut orphans = Vec::new();
        for mount in self.managed_system_mounts()? {
            if !self.table.is_mounted(&mount.mount_path)? {
                orphans.push(mount);
            }
        }
        Ok(orphans)
    }

    fn mount(&self, mount: &Mount) -> Result<()> {
        if self.table.is_mounted(&mount.mount_path)? {
            info!("{} is already mounted, skipping", mount.mount_path);
            return Ok(());
        }

        let dir = Path::new(&mount.mount_path);
        let empty = self.fs.directory_empty(dir).map_err(|err| Error::Mount {
            path: mount.mount_path.clone(),
            message: err.to_string(),
        })?;
        if self.fs.directory_exists(dir) && !empty {
            return MountSnafu {
                path: &mount.mount_path,
                message: "mount point exists and is not empty",
            }
            .fail();
        }

        if !self.fs.directory_exists(dir) {
            self.fs.create_directory(dir).mount_point_context(dir)?;
        }

        self.table.store_mount_information(mount)?;

        // On failure the table entry and directory stay behind: the path is
        // left registered-but-unmounted so a retry is idempotent rather
        // than destructive.
        match self.executor.run("mount", &[&mount.mount_path]) {
            Ok(output) if output.success => Ok(()),
            Ok(output) => MountSnafu {
                path: &mount.mount_path,
                message: output.stderr.trim().to_string(),
            }
            .fail(),
            Err(err) => MountSnafu {
                path: &mount.mount_path,
                message: err.to_string(),
            }
            .fail(),
        }
    }

    fn unmount(&self, mount_path: &str) -> Result<()> {
        // Data guard before anything else: a mount point holding files
        // must not be torn down.
        let dir = Path::new(mount_path);
        let empty = self.fs.directory_empty(dir).map_err(|err| Error::Unmount {
            path: mount_path.to_string(),
            message: err.to_string(),
        })?;
        if self.fs.directory_exists(dir) && !empty {
            return UnmountSnafu {
                path: mount_path,
                message: "mount point is not empty",
            }
            .fail();
        }

        self.table.remove_mount_information(mount_path)?;
        self.perform_unmount(mount_path)?;
        self.remove_mount_point(mount_path)
    }

    fn unmount_all(&self) -> Result<Vec<Mount>> {
        let mounts = self.current_mounts()?;
        if mounts.is_empty() {
            return Ok(Vec::new());
        }

        // One table rewrite for the whole set, then each mount is taken
        // down individually so one failure cannot block the rest.
        self.table.remove_mounts(&mounts)?;

        let mut failed = Vec::new();
        for mount in mounts {
            let result = self
                .perform_unmount(&mount.mount_path)
                .and_then(|_| self.remove_mount_point(&mount.mount_path));
            if let Err(err) = result {
                warn!("{err}");
                failed.push(mount);
            }
        }
        Ok(failed)
    }

    fn cleanup(&self) -> Result<()> {
        self.table.cleanup().context(CleanupSnafu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::test_config;
    use crate::executor::fake::FakeExecutor;
    use crate::fs::memory::MemoryFileSystem;
    use crate::fstab::FstabRepository;

    type TestLifecycle = MountLifecycle<FstabRepository<MemoryFileSystem>, MemoryFileSystem, FakeExecutor>;

    fn windows_line(actual: &str, target: &str) -> String {
        format!("{actual} {target} cifs credentials=/etc/.cifs,domain=ONS,uid=1001,gid=5001,auto 0 0")
    }

    fn setup(fstab: &str, proc_mounts: &str) -> (TestLifecycle, MemoryFileSystem, FakeExecutor) {
        let config = test_config();
        let fs = MemoryFileSystem::new();
        fs.add_file(&config.fstab_path, fstab);
        fs.add_file(&config.proc_mounts_path, proc_mounts);
        let executor = FakeExecutor::new();
        let table = FstabRepository::new(fs.clone(), config.clone());
        let lifecycle = MountLifecycle::new(table, fs.clone(), executor.clone(), config);
        (lifecycle, fs, executor)
    }

    fn write_desired(fs: &MemoryFileSystem, content: &str) {
        fs.add_file("mounts.json", content);
    }

    #[test]
    fn test_desired_mounts_empty() {
        let (lifecycle, fs, _) = setup("", "");
        write_desired(&fs, "[]");
        assert!(lifecycle.desired_mounts().unwrap().is_empty());
    }

    #[test]
    fn test_desired_mounts_prepends_ssh_user_to_linux_shares() {
        let (lifecycle, fs, _) = setup("", "");
        write_desired(
            &fs,
            r#"[
                {"mount_path": "/shares/win", "actual_path": "//server/data", "mount_type": "CIFS"},
                {"mount_path": "/shares/lin", "actual_path": "host:/export", "mount_type": "fuse.sshfs"}
            ]"#,
        );

        let mounts = lifecycle.desired_mounts().unwrap();
        assert_eq!(
            mounts,
            vec![
                Mount::new("/shares/win", "//server/data", MountType::Windows),
                Mount::new("/shares/lin", "dave@host:/export", MountType::Linux),
            ]
        );
    }

    #[test]
    fn test_desired_mounts_unknown_type_resolves_to_none() {
        let (lifecycle, fs, _) = setup("", "");
        write_desired(
            &fs,
            r#"[{"mount_path": "/shares/x", "actual_path": "/mnt/x", "mount_type": "nfs"}]"#,
        );

        let mounts = lifecycle.desired_mounts().unwrap();
        assert_eq!(mounts[0].mount_type, MountType::None);
    }

    #[test]
    fn test_desired_mounts_skips_paths_outside_managed_prefix() {
        let (lifecycle, fs, _) = setup("", "");
        write_desired(
            &fs,
            r#"[
                {"mount_path": "/etc/cron.d", "actual_path": "//server/evil", "mount_type": "cifs"},
                {"mount_path": "/shares/ok", "actual_path": "//server/ok", "mount_type": "cifs"}
            ]"#,
        );

        let mounts = lifecycle.desired_mounts().unwrap();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].mount_path, "/shares/ok");
    }

    #[test]
    fn test_desired_mounts_rejects_malformed_json() {
        let (lifecycle, fs, _) = setup("", "");
        write_desired(&fs, "{ not json");
        assert!(matches!(
            lifecycle.desired_mounts().unwrap_err(),
            Error::DesiredMountsParse { .. }
        ));
    }

    #[test]
    fn test_current_mounts_requires_prefix_and_liveness() {
        let fstab = format!(
            "UUID=abc-123 / ext4 defaults 0 1\n{}\n{}\n",
            windows_line("//server/a", "/shares/a"),
            windows_line("//server/b", "/shares/b"),
        );
        // Only /shares/a is live.
        let proc_mounts = windows_line("//server/a", "/shares/a");
        let (lifecycle, _, _) = setup(&fstab, &proc_mounts);

        let current = lifecycle.current_mounts().unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].mount_path, "/shares/a");
    }

    #[test]
    fn test_orphan_mounts_are_the_inverse_of_current() {
        let fstab = format!(
            "{}\n{}\n",
            windows_line("//server/a", "/shares/a"),
            windows_line("//server/b", "/shares/b"),
        );
        let proc_mounts = windows_line("//server/a", "/shares/a");
        let (lifecycle, _, _) = setup(&fstab, &proc_mounts);

        let orphans = lifecycle.orphan_mounts().unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].mount_path, "/shares/b");
    }

    #[test]
    fn test_mount_success_registers_then_mounts() {
        let (lifecycle, fs, executor) = setup("", "");

        let mount = Mount::new("/shares/a", "//server/a", MountType::Windows);
        lifecycle.mount(&mount).unwrap();

        assert!(fs.has_directory("/shares/a"));
        assert!(fs.file_content("/etc/fstab").unwrap().contains("/shares/a"));
        assert_eq!(
            executor.calls(),
            vec![vec!["mount".to_string(), "/shares/a".to_string()]]
        );
    }

    #[test]
    fn test_mount_already_mounted_is_a_no_op() {
        let proc_mounts = windows_line("//server/a", "/shares/a");
        let (lifecycle, fs, executor) = setup("", &proc_mounts);

        let mount = Mount::new("/shares/a", "//server/a", MountType::Windows);
        lifecycle.mount(&mount).unwrap();

        assert!(executor.calls().is_empty());
        assert_eq!(fs.file_content("/etc/fstab").unwrap(), "");
    }

    #[test]
    fn test_mount_refuses_non_empty_mount_point() {
        let (lifecycle, fs, executor) = setup("", "");
        fs.add_non_empty_directory("/shares/a");

        let mount = Mount::new("/shares/a", "//server/a", MountType::Windows);
        let err = lifecycle.mount(&mount).unwrap_err();

        assert!(matches!(err, Error::Mount { .. }));
        assert!(executor.calls().is_empty());
        assert_eq!(fs.file_content("/etc/fstab").unwrap(), "");
    }

    #[test]
    fn test_mount_command_failure_keeps_registration() {
        let (lifecycle, fs, executor) = setup("", "");
        executor.fail_on("/shares/a");

        let mount = Mount::new("/shares/a", "//server/a", MountType::Windows);
        let err = lifecycle.mount(&mount).unwrap_err();

        assert!(matches!(err, Error::Mount { .. }));
        // Registered but not mounted: entry and directory survive so a
        // retry starts from a clean slate.
        assert!(fs.file_content("/etc/fstab").unwrap().contains("/shares/a"));
        assert!(fs.has_directory("/shares/a"));
    }

    #[test]
    fn test_mount_unsupported_type_propagates() {
        let (lifecycle, _, executor) = setup("", "");

        let mount = Mount::new("/shares/x", "/mnt/x", MountType::None);
        let err = lifecycle.mount(&mount).unwrap_err();

        assert!(matches!(err, Error::UnsupportedMountType { .. }));
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn test_unmount_success_removes_entry_and_mount_point() {
        let fstab = windows_line("//server/a", "/shares/a");
        let proc_mounts = windows_line("//server/a", "/shares/a");
        let (lifecycle, fs, executor) = setup(&fstab, &proc_mounts);
        fs.add_directory("/shares/a");

        lifecycle.unmount("/shares/a").unwrap();

        assert!(!fs.file_content("/etc/fstab").unwrap().contains("/shares/a"));
        assert!(!fs.has_directory("/shares/a"));
        assert_eq!(
            executor.calls(),
            vec![vec!["umount".to_string(), "/shares/a".to_string()]]
        );
    }

    #[test]
    fn test_unmount_not_mounted_skips_umount_command() {
        let fstab = windows_line("//server/a", "/shares/a");
        let (lifecycle, fs, executor) = setup(&fstab, "");
        fs.add_directory("/shares/a");

        lifecycle.unmount("/shares/a").unwrap();

        // Entry and directory are still cleaned up; no command ran.
        assert!(executor.calls().is_empty());
        assert!(!fs.file_content("/etc/fstab").unwrap().contains("/shares/a"));
        assert!(!fs.has_directory("/shares/a"));
    }

    #[test]
    fn test_unmount_refuses_non_empty_mount_point() {
        let fstab = windows_line("//server/a", "/shares/a");
        let (lifecycle, fs, executor) = setup(&fstab, "");
        fs.add_non_empty_directory("/shares/a");

        let err = lifecycle.unmount("/shares/a").unwrap_err();

        assert!(matches!(err, Error::Unmount { .. }));
        // The guard runs before anything else: entry untouched, no commands.
        assert!(fs.file_content("/etc/fstab").unwrap().contains("/shares/a"));
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn test_unmount_command_failure_surfaces() {
        let fstab = windows_line("//server/a", "/shares/a");
        let proc_mounts = windows_line("//server/a", "/shares/a");
        let (lifecycle, _, executor) = setup(&fstab, &proc_mounts);
        executor.fail_on("/shares/a");

        let err = lifecycle.unmount("/shares/a").unwrap_err();
        assert!(matches!(err, Error::Unmount { .. }));
    }

    #[test]
    fn test_unmount_mount_point_removal_failure_surfaces() {
        let fstab = windows_line("//server/a", "/shares/a");
        let (lifecycle, fs, _) = setup(&fstab, "");
        fs.add_directory("/shares/a");
        fs.fail_remove_directory();

        let err = lifecycle.unmount("/shares/a").unwrap_err();
        assert!(matches!(err, Error::Unmount { .. }));
    }

    #[test]
    fn test_unmount_all_success() {
        let fstab = format!(
            "{}\n{}\n",
            windows_line("//server/a", "/shares/a"),
            windows_line("//server/b", "/shares/b"),
        );
        let (lifecycle, fs, _) = setup(&fstab, &fstab);

        let failed = lifecycle.unmount_all().unwrap();

        assert!(failed.is_empty());
        assert!(!fs.file_content("/etc/fstab").unwrap().contains("/shares"));
    }

    #[test]
    fn test_unmount_all_collects_independent_failures() {
        let fstab = format!(
            "{}\n{}\n",
            windows_line("//server/a", "/shares/a"),
            windows_line("//server/b", "/shares/b"),
        );
        let (lifecycle, _, executor) = setup(&fstab, &fstab);
        executor.fail_on("/shares/a");

        let failed = lifecycle.unmount_all().unwrap();

        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].mount_path, "/shares/a");
        // The failure did not stop /shares/b from being attempted.
        assert!(
            executor
                .calls()
                .iter()
                .any(|call| call.contains(&"/shares/b".to_string()))
        );
    }

    #[test]
    fn test_unmount_all_with_nothing_mounted() {
        let (lifecycle, _, executor) = setup("", "");
        assert!(lifecycle.unmount_all().unwrap().is_empty());
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn test_cleanup_wraps_underlying_failures() {
        let (lifecycle, fs, _) = setup("", "");
        fs.fail_writes();

        let err = lifecycle.cleanup().unwrap_err();
        assert!(matches!(err, Error::Cleanup { .. }));
    }
}
