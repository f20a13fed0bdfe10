// src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VmafCmpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Probing '{path}' failed: {reason}")]
    Probe { path: String, reason: String },

    // Raised when the orchestrator let a file without video through to planning.
    #[error("Planner invariant violated: {0}")]
    PlanningAssertion(String),

    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("FFmpeg failed for '{path}' (exit code {code:?}): {stderr}")]
    EngineInvocation {
        path: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Input error: {0}")]
    Input(String),
}

impl VmafCmpError {
    pub fn probe(path: &std::path::Path, reason: impl Into<String>) -> Self {
        VmafCmpError::Probe {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }
}

// Define a standard Result type for the crate
pub type Result<T> = std::result::Result<T, VmafCmpError>;
