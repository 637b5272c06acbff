//! sharemount - reconcile declared network shares against the host's
//! mount state.
//!
//! Subcommands map one-to-one onto the reconciliation engine: `run`,
//! `dry-run`, `unmount-all`, `cleanup`. Every configuration value can come
//! from a flag or from the matching environment variable. Exit code is 0
//! when the operation fully succeeded, 1 otherwise.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use log::{error, info};

use sharemount_core::{
    Config, FstabRepository, MountLifecycle, PrivilegeEscalation, RealFileSystem, Reconciler,
    SystemExecutor,
};

/// Network share mount reconciler.
#[derive(Parser)]
#[command(name = "sharemount")]
#[command(about = "Reconcile declared CIFS/SSHFS shares against the host mount table")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// Static mount table to persist entries into.
    #[arg(long, env = "FSTAB_LOCATION", default_value = "/etc/fstab")]
    fstab: PathBuf,

    /// Kernel live mount table.
    #[arg(long, env = "PROC_MOUNTS_LOCATION", default_value = "/proc/mounts")]
    proc_mounts: PathBuf,

    /// JSON file declaring the desired mounts.
    #[arg(long, env = "DESIRED_MOUNTS_FILE_PATH", default_value = "mounts.json")]
    mounts_file: PathBuf,

    /// Credentials file for CIFS shares.
    #[arg(long, env = "CIFS_FILE_LOCATION")]
    cifs_credentials: PathBuf,

    /// Windows domain for CIFS shares.
    #[arg(long, env = "CIFS_DOMAIN", default_value = "ONS")]
    cifs_domain: String,

    /// SSH identity file for SSHFS shares.
    #[arg(long, env = "LINUX_SSH_LOCATION")]
    ssh_identity: PathBuf,

    /// SSH login prepended to SSHFS sources.
    #[arg(long, env = "LINUX_SSH_USER")]
    ssh_user: String,

    /// Local path prefix under which mounts are managed.
    #[arg(long, env = "MANAGED_PREFIX", default_value = "/shares")]
    managed_prefix: String,

    /// Deadline in seconds for each mount/umount command.
    #[arg(long, env = "MOUNT_TIMEOUT_SECS", default_value_t = 60)]
    mount_timeout_secs: u64,
}

impl ConfigArgs {
    fn into_config(self) -> Config {
        Config {
            fstab_path: self.fstab,
            proc_mounts_path: self.proc_mounts,
            desired_mounts_path: self.mounts_file,
            cifs_credentials_path: self.cifs_credentials,
            cifs_domain: self.cifs_domain,
            ssh_identity_path: self.ssh_identity,
            ssh_user: self.ssh_user,
            managed_prefix: self.managed_prefix,
            command_timeout: Duration::from_secs(self.mount_timeout_secs),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the desired mount state to the host.
    Run,
    /// Report what a run would change, without changing anything.
    DryRun,
    /// Unmount every managed mount and remove its table entry.
    UnmountAll,
    /// Prune table entries that are no longer live, and collapse duplicates.
    Cleanup,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.config.into_config();
    let fs = RealFileSystem;

    // All file and value problems surface here, before anything mutates.
    if let Err(err) = config.validate(&fs) {
        error!("{err}");
        return ExitCode::FAILURE;
    }

    let escalation = if nix::unistd::geteuid().is_root() {
        PrivilegeEscalation::None
    } else {
        info!("not running as root; mount commands will use sudo");
        PrivilegeEscalation::Sudo
    };
    let executor = SystemExecutor::new(escalation, config.command_timeout);

    let table = FstabRepository::new(fs, config.clone());
    let lifecycle = MountLifecycle::new(table, fs, executor, config);
    let reconciler = Reconciler::new(lifecycle);

    let succeeded = match cli.command {
        Commands::Run => reconciler.run(),
        Commands::DryRun => reconciler.dry_run(),
        Commands::UnmountAll => reconciler.unmount_all(),
        Commands::Cleanup => reconciler.cleanup(),
    };

    if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
