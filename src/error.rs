//! Error taxonomy shared by detection, the factory and every driver.

use thiserror::Error;

/// Failures surfaced by this crate.
///
/// All variants propagate unchanged to the caller; nothing in the crate
/// catches one of these to continue with a fallback.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying shell command could not be spawned, exited non-zero
    /// (when run through [`crate::command::run_ok`]) or was killed before
    /// producing an exit code.
    #[error("error when sending command [{command}] ==> {message}")]
    Command {
        /// The command line that was executed.
        command: String,
        /// What went wrong.
        message: String,
    },

    /// A command exited zero but its output did not confirm the operation.
    ///
    /// Distinct from a connect attempt that merely timed out: the backend
    /// rejected the request outright.
    #[error("command [{command}] did not confirm the operation: {stdout}")]
    UnexpectedOutput {
        /// The command line that was executed.
        command: String,
        /// The stdout that was missing the expected success marker.
        stdout: String,
    },

    /// No usable backend tool, no language mapping, or no registered driver
    /// for the detected (language, backend) pair.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// The elevation secret is missing, empty, or was rejected by the
    /// validation probe.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// Backend output violated a parser invariant (e.g. an interface block
    /// with a state but no SSID field). A defect signal, never coerced into
    /// a default value.
    #[error("malformed backend output: {0}")]
    MalformedOutput(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
