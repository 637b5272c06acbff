//! Command execution abstraction with privilege escalation and timeouts.
//!
//! Mount and unmount are blocking subprocess invocations. They run behind
//! the [`CommandExecutor`] trait so the lifecycle repository can be tested
//! without touching the host, and so every invocation carries a bounded
//! deadline: a hung remote share kills the command instead of hanging the
//! whole run.

use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::{CommandTimeoutSnafu, IoResultExt, Result};

/// How often a running child is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Privilege escalation method for commands that require root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrivilegeEscalation {
    /// Execute directly without privilege escalation.
    #[default]
    None,
    /// Wrap the command with `sudo`.
    Sudo,
}

/// Outcome of a finished command.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// True if the process exited with status zero.
    pub success: bool,
    /// Captured standard error.
    pub stderr: String,
}

/// Runs system commands on behalf of the mount lifecycle.
pub trait CommandExecutor {
    /// Runs `program` with `args` to completion and returns its outcome.
    ///
    /// An `Err` means the command could not be run at all (spawn failure)
    /// or overran its deadline; a non-zero exit is an `Ok` with
    /// `success == false`.
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecOutput>;
}

/// [`CommandExecutor`] that spawns real subprocesses.
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    escalation: PrivilegeEscalation,
    timeout: Duration,
}

impl SystemExecutor {
    /// Creates an executor with the given escalation method and per-command
    /// deadline.
    pub fn new(escalation: PrivilegeEscalation, timeout: Duration) -> Self {
        Self {
            escalation,
            timeout,
        }
    }

    /// Returns the configured privilege escalation method.
    pub fn escalation(&self) -> PrivilegeEscalation {
        self.escalation
    }
}

impl CommandExecutor for SystemExecutor {
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecOutput> {
        let mut command = match self.escalation {
            PrivilegeEscalation::None => {
                let mut c = Command::new(program);
                c.args(args);
                c
            }
            PrivilegeEscalation::Sudo => {
                let mut c = Command::new("sudo");
                c.arg(program).args(args);
                c
            }
        };

        let display = format!("{} {}", program, args.join(" "));

        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .command_context(&display)?;

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait().command_context(&display)? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return CommandTimeoutSnafu {
                    command: display,
                    timeout_secs: self.timeout.as_secs(),
                }
                .fail();
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        let mut stderr = String::new();
        if let Some(mut pipe) = child.stderr.take() {
            use std::io::Read;
            let _ = pipe.read_to_string(&mut stderr);
        }

        Ok(ExecOutput {
            code: status.code(),
            success: status.success(),
            stderr,
        })
    }
}
