//! Error types for daemon lifecycle operations.
//!
//! `DaemonError` names every way a lifecycle call can fail. `ActionError` pairs
//! one of those with the human readable "... failed" message, so a failure
//! message never travels without its cause.

use std::path::PathBuf;

use thiserror::Error;

/// Why a lifecycle operation could not complete.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("you must have root user privileges")]
    Privilege,

    #[error("service has already been installed")]
    AlreadyInstalled,

    #[error("service is not installed")]
    NotInstalled,

    #[error("service is already running")]
    AlreadyRunning,

    #[error("service has already been stopped")]
    AlreadyStopped,

    #[error("invalid execution path {0:?}: missing or a directory")]
    InvalidExecutionPath(PathBuf),

    #[error("invalid service name {0:?}")]
    InvalidName(String),

    #[error("invalid service description {0:?}: must be a single line")]
    InvalidDescription(String),

    #[error("invalid dependency name {0:?}")]
    InvalidDependency(String),

    #[error("unsupported platform: no service manager backend for this system")]
    UnsupportedPlatform,

    #[error("failed to render service descriptor: {0}")]
    Render(String),

    #[error("command failed: {command} (exit code: {code:?}){stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to resolve executable path: {0}")]
    PathResolution(String),

    #[error("workload failed: {0:#}")]
    Workload(anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A failed lifecycle action: the `"<Verb-ing> <description>: failed"`
/// message together with the error that caused it.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ActionError {
    pub message: String,
    #[source]
    pub source: DaemonError,
}

impl ActionError {
    pub fn kind(&self) -> &DaemonError {
        &self.source
    }
}

/// Outcome of a lifecycle action. `Ok` holds the success message.
pub type ActionResult<T = String> = Result<T, ActionError>;
