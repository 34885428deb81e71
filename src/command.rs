//! Abstraction over external command execution.
//!
//! [`CommandRunner`] allows swapping the real system command execution
//! ([`SystemCommandRunner`]) with a mock in tests. This is necessary because
//! the crate drives platform-specific CLI tools (netsh, nmcli, wpa_cli,
//! networksetup) that are unavailable in CI or on other platforms. Every
//! call into the OS goes through this boundary; no other component spawns
//! a process directly.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// All of the information about the result of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdOutput {
    /// Exit status reported by the child process.
    pub status: i32,
    /// Captured standard output, lossily decoded.
    pub stdout: String,
    /// Captured standard error, lossily decoded.
    pub stderr: String,
}

impl CmdOutput {
    /// Was the command successful (its exit status is 0)?
    pub fn is_ok(&self) -> bool {
        self.status == 0
    }
}

/// Trait for running a shell command line and capturing its result.
///
/// `run` is non-raising with respect to the exit status: a command that runs
/// to completion yields `Ok(CmdOutput)` whatever its status. It fails with
/// [`Error::Command`] only when the process cannot be spawned or dies
/// without an exit code.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` through the platform shell and return its result.
    async fn run(&self, command: &str) -> Result<CmdOutput>;
}

/// Run `command` and fail with [`Error::Command`] unless it exits zero.
pub async fn run_ok(runner: &dyn CommandRunner, command: &str) -> Result<CmdOutput> {
    let output = runner.run(command).await?;
    if output.is_ok() {
        Ok(output)
    } else {
        Err(Error::Command {
            command: command.to_string(),
            message: format!("exited with {}: {}", output.status, output.stderr.trim()),
        })
    }
}

/// Default implementation that delegates to the platform shell via
/// [`tokio::process::Command`].
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, command: &str) -> Result<CmdOutput> {
        debug!("Sending command ==> {}", command);
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = tokio::process::Command::new("cmd");
            c.arg("/C").arg(command);
            c
        } else {
            let mut c = tokio::process::Command::new("sh");
            c.arg("-c").arg(command);
            c
        };
        // A command abandoned by a timed-out connect attempt must not leak.
        cmd.kill_on_drop(true);

        let output = cmd.output().await.map_err(|e| Error::Command {
            command: command.to_string(),
            message: format!("failed to spawn: {e}"),
        })?;

        let status = output.status.code().ok_or_else(|| Error::Command {
            command: command.to_string(),
            message: "did not receive an exit code".to_string(),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if status == 0 {
            debug!("Exited with {}", status);
        } else {
            warn!("Exited with {}", status);
        }
        if !stdout.is_empty() {
            debug!("[stdout]\n{}", stdout);
        }
        if !stderr.is_empty() {
            warn!("[stderr]\n{}", stderr);
        }

        Ok(CmdOutput {
            status,
            stdout,
            stderr,
        })
    }
}

#[cfg(test)]
mod should {
    use super::*;
    use test_log::test;

    #[test(tokio::test)]
    async fn capture_stdout_of_successful_command() {
        let out = SystemCommandRunner.run("echo hello").await.unwrap();
        assert!(out.is_ok());
        assert_eq!(out.stdout.trim(), "hello");
        assert!(out.stderr.is_empty());
    }

    #[test(tokio::test)]
    async fn report_nonzero_exit_without_failing() {
        let out = SystemCommandRunner.run("exit 3").await.unwrap();
        assert!(!out.is_ok());
        assert_eq!(out.status, 3);
    }

    #[test(tokio::test)]
    async fn fail_run_ok_on_nonzero_exit() {
        let err = run_ok(&SystemCommandRunner, "exit 1").await.unwrap_err();
        match err {
            Error::Command { command, .. } => assert_eq!(command, "exit 1"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test(tokio::test)]
    async fn pass_run_ok_on_zero_exit() {
        let out = run_ok(&SystemCommandRunner, "echo ok").await.unwrap();
        assert_eq!(out.stdout.trim(), "ok");
    }
}
