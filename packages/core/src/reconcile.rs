//! Three-way reconciliation between desired and current mount state.
//!
//! [`MountPlan::compute`] is a pure diff; [`Reconciler`] drives a
//! [`MountRepository`] through the plan with per-item failure isolation:
//! one bad mount never blocks the rest, and no typed error ever escapes
//! the public operations. Callers get a boolean plus log tables.

use std::collections::HashSet;

use log::{Level, error, info};

use crate::lifecycle::MountRepository;
use crate::mount::Mount;
use crate::report;

/// The changes needed to converge current state to desired state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MountPlan {
    /// Desired mounts with no current mount at their path.
    pub to_add: Vec<Mount>,
    /// Current mounts whose path is no longer desired.
    pub to_remove: Vec<Mount>,
    /// Desired mounts whose path exists but describes a different share.
    pub to_update: Vec<Mount>,
}

impl MountPlan {
    /// Diffs two mount lists. Pure: no side effects, stable under
    /// re-invocation, and insensitive to input ordering.
    pub fn compute(desired: &[Mount], current: &[Mount]) -> Self {
        let desired_paths: HashSet<&str> = desired
            .iter()
            .map(|mount| mount.mount_path.as_str())
            .collect();
        let current_paths: HashSet<&str> = current
            .iter()
            .map(|mount| mount.mount_path.as_str())
            .collect();

        let to_add = desired
            .iter()
            .filter(|mount| !current_paths.contains(mount.mount_path.as_str()))
            .cloned()
            .collect();
        let to_remove = current
            .iter()
            .filter(|mount| !desired_paths.contains(mount.mount_path.as_str()))
            .cloned()
            .collect();

        // Pairwise on purpose: neither list is assumed deduplicated by
        // path. Share identity ignores the SSH login name.
        let mut to_update = Vec::new();
        for desired_mount in desired {
            for current_mount in current {
                if desired_mount.mount_path == current_mount.mount_path
                    && !desired_mount.same_share(current_mount)
                {
                    to_update.push(desired_mount.clone());
                }
            }
        }

        Self {
            to_add,
            to_remove,
            to_update,
        }
    }

    /// True when nothing needs to change.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty() && self.to_update.is_empty()
    }
}

/// Applies mount plans against a [`MountRepository`].
#[derive(Debug)]
pub struct Reconciler<R> {
    repo: R,
}

impl<R: MountRepository> Reconciler<R> {
    /// Creates a reconciler over a mount repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Computes and applies the full plan. Returns true iff every add,
    /// remove, and update succeeded.
    pub fn run(&self) -> bool {
        let Some((desired, current)) = self.fetch() else {
            return false;
        };
        let plan = MountPlan::compute(&desired, &current);

        let failures = self.apply_add(&plan.to_add)
            + self.apply_remove(&plan.to_remove)
            + self.apply_update(&plan.to_update);
        failures == 0
    }

    /// Computes the plan and reports it without mutating anything.
    pub fn dry_run(&self) -> bool {
        let Some((desired, current)) = self.fetch() else {
            return false;
        };
        let orphans = match self.repo.orphan_mounts() {
            Ok(orphans) => orphans,
            Err(err) => {
                error!("failed to read orphan mounts: {err}");
                return false;
            }
        };

        let plan = MountPlan::compute(&desired, &current);
        report::log_mount_table(Level::Info, "Current mounts", &current);
        report::log_mount_table(Level::Info, "Mounts to add", &plan.to_add);
        report::log_mount_table(Level::Info, "Mounts to remove", &plan.to_remove);
        report::log_mount_table(Level::Info, "Mounts to update", &plan.to_update);
        report::log_mount_table(Level::Warn, "Orphan mounts", &orphans);
        true
    }

    /// Takes down every current mount. Returns true iff all succeeded.
    pub fn unmount_all(&self) -> bool {
        info!("unmounting all managed mounts");
        match self.repo.unmount_all() {
            Ok(failed) if failed.is_empty() => true,
            Ok(failed) => {
                report::log_mount_table(Level::Error, "Failed to unmount these mounts", &failed);
                false
            }
            Err(err) => {
                error!("unmount-all aborted: {err}");
                false
            }
        }
    }

    /// Prunes the persisted table. Returns true iff cleanup succeeded.
    pub fn cleanup(&self) -> bool {
        match self.repo.cleanup() {
            Ok(()) => {
                info!("mount table cleanup complete");
                true
            }
            Err(err) => {
                error!("{err}");
                false
            }
        }
    }

    fn fetch(&self) -> Option<(Vec<Mount>, Vec<Mount>)> {
        let desired = match self.repo.desired_mounts() {
            Ok(mounts) => mounts,
            Err(err) => {
                error!("failed to load desired mounts: {err}");
                return None;
            }
        };
        let current = match self.repo.current_mounts() {
            Ok(mounts) => mounts,
            Err(err) => {
                error!("failed to read current mounts: {err}");
                return None;
            }
        };
        Some((desired, current))
    }

    fn apply_add(&self, mounts: &[Mount]) -> usize {
        report::log_mount_table(Level::Info, "Mounts to add", mounts);

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for mount in mounts {
            info!("mounting {mount}");
            match self.repo.mount(mount) {
                Ok(()) => succeeded.push(mount.clone()),
                Err(err) => {
                    error!("failed to mount {}: {err}", mount.mount_path);
                    failed.push(mount.clone());
                }
            }
        }

        self.report_outcome("added", &succeeded, &failed);
        failed.len()
    }

    fn apply_remove(&self, mounts: &[Mount]) -> usize {
        report::log_mount_table(Level::Info, "Mounts to remove", mounts);

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for mount in mounts {
            info!("unmounting {}", mount.mount_path);
            match self.repo.unmount(&mount.mount_path) {
                Ok(()) => succeeded.push(mount.clone()),
                Err(err) => {
                    error!("failed to unmount {}: {err}", mount.mount_path);
                    failed.push(mount.clone());
                }
            }
        }

        self.report_outcome("removed", &succeeded, &failed);
        failed.len()
    }

    /// Updates are unmount-then-mount and deliberately not transactional:
    /// when the mount half fails after a successful unmount, the path has
    /// regressed from its prior state and is reported as such.
    fn apply_update(&self, mounts: &[Mount]) -> usize {
        report::log_mount_table(Level::Info, "Mounts to update", mounts);

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for mount in mounts {
            info!("updating {}", mount.mount_path);
            if let Err(err) = self.repo.unmount(&mount.mount_path) {
                error!(
                    "failed to update {}: {err}; new mount not attempted",
                    mount.mount_path
                );
                failed.push(mount.clone());
                continue;
            }
            if let Err(err) = self.repo.mount(mount) {
                error!(
                    "update regressed: {} was unmounted but the new mount failed: {err}",
                    mount.mount_path
                );
                failed.push(mount.clone());
                continue;
            }
            succeeded.push(mount.clone());
        }

        self.report_outcome("updated", &succeeded, &failed);
        failed.len()
    }

    fn report_outcome(&self, action: &str, succeeded: &[Mount], failed: &[Mount]) {
        if !succeeded.is_empty() {
            report::log_mount_table(
                Level::Info,
                &format!("Successfully {action} these mounts"),
                succeeded,
            );
        }
        if !failed.is_empty() {
            report::log_mount_table(
                Level::Error,
                &format!("Failed to {action} these mounts"),
                failed,
            );
        }
    }
}
