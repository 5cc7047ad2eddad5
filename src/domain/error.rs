//! Typed workflow faults.
//!
//! These are the faults the orchestrator recognizes by type. Everything else
//! (collaborator errors, I/O) travels as `anyhow::Error` and is converted to
//! a failed step result at the orchestrator boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The requested step identifier is not in the registry.
    #[error("unknown step '{0}'")]
    UnknownStep(String),

    /// A parameterized step was given a value outside its enumerated set.
    #[error("unsupported {name} '{value}' (expected one of: {allowed})")]
    UnsupportedParameter {
        name: String,
        value: String,
        allowed: String,
    },

    /// The user abandoned an input prompt. Ends the run gracefully.
    #[error("run aborted by user")]
    Aborted,
}

impl WorkflowError {
    /// True if an error chain bottoms out in a user abort.
    pub fn is_abort(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<WorkflowError>(), Some(Self::Aborted))
    }
}
