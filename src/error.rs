// Error types for hostwarden

use thiserror::Error;

/// Result type alias using anyhow::Error
pub type Result<T> = anyhow::Result<T>;

/// Hostwarden-specific error types
#[derive(Error, Debug)]
pub enum WardenError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to persist health state at {path}: {message}")]
    StatePersistence { path: String, message: String },

    #[error("Alert dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Managed group control failed: {0}")]
    ProcessControl(#[from] ProcessControlError),

    #[error("Run lock error: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure delivering a single alert to the webhook sink
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("sink responded with HTTP {0}")]
    Status(u16),
}

/// Failure stopping or starting the managed service group
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessControlError {
    #[error("failed to spawn `{command}`: {message}")]
    Spawn { command: String, message: String },

    #[error("`{command}` did not finish within {secs}s")]
    Timeout { command: String, secs: u64 },

    #[error("`{command}` exited with {code:?}: {stderr}")]
    ExitStatus {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("systemd call {operation} failed for {units:?}: {message}")]
    Systemd {
        operation: String,
        units: Vec<String>,
        message: String,
    },

    #[error("invalid unit name '{0}'")]
    InvalidUnit(String),
}
