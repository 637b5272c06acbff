//! sharemount-core: Core library for network-share mount reconciliation.
//!
//! This library reconciles a declared set of network-share mount points
//! (Windows/CIFS, Linux/SSHFS) against the actual mount state of a Unix
//! host, persisting accepted mounts into the host's static mount table so
//! they survive reboot.
//!
//! # Modules
//!
//! - [`mount`]: The mount value entity and share identity comparison
//! - [`fstab`]: Fstab-format table parsing, rewriting, and persistence
//! - [`lifecycle`]: Mount/unmount state transitions on the live host
//! - [`reconcile`]: Desired/current diffing and failure-isolated apply
//! - [`config`]: Runtime configuration and fail-fast validation
//! - [`fs`]: Filesystem gateway trait and host implementation
//! - [`executor`]: Subprocess execution with escalation and timeouts
//! - [`report`]: Operator-facing log tables
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```no_run
//! use sharemount_core::{
//!     Config, FstabRepository, MountLifecycle, Reconciler, RealFileSystem,
//!     SystemExecutor, PrivilegeEscalation,
//! };
//!
//! let config = Config {
//!     ssh_user: "deploy".to_string(),
//!     cifs_credentials_path: "/etc/.cifs".into(),
//!     ssh_identity_path: "/root/.ssh/id_rsa".into(),
//!     ..Config::default()
//! };
//!
//! let executor = SystemExecutor::new(PrivilegeEscalation::Sudo, config.command_timeout);
//! let table = FstabRepository::new(RealFileSystem, config.clone());
//! let lifecycle = MountLifecycle::new(table, RealFileSystem, executor, config);
//!
//! let reconciler = Reconciler::new(lifecycle);
//! let converged = reconciler.run();
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod fs;
pub mod fstab;
pub mod lifecycle;
pub mod mount;
pub mod reconcile;
pub mod report;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use executor::{CommandExecutor, PrivilegeEscalation, SystemExecutor};
pub use fs::{FileSystemGateway, RealFileSystem};
pub use fstab::{FstabEntry, FstabRepository, MountTableRepository};
pub use lifecycle::{MountLifecycle, MountRepository};
pub use mount::{Mount, MountType};
pub use reconcile::{MountPlan, Reconciler};
