//! Step outcomes and environment findings.

use std::path::PathBuf;

/// How a single step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step did its work.
    Success,

    /// Nothing was done; any prior artifact is left in place.
    Skipped,

    /// The step could not do its work. Always carries a message.
    Failed,

    /// A hybrid step ended without user-confirmed completion. Not a
    /// failure; the user can redo the step at will.
    Deferred,
}

/// The result of executing one step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub outcome: StepOutcome,

    /// Path produced or reused by the step, if any.
    pub artifact: Option<PathBuf>,

    /// Human-readable note about what happened.
    pub message: Option<String>,
}

impl StepResult {
    pub fn success() -> Self {
        Self {
            outcome: StepOutcome::Success,
            artifact: None,
            message: None,
        }
    }

    pub fn success_at(artifact: PathBuf, message: impl Into<String>) -> Self {
        Self {
            outcome: StepOutcome::Success,
            artifact: Some(artifact),
            message: Some(message.into()),
        }
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            outcome: StepOutcome::Skipped,
            artifact: None,
            message: Some(message.into()),
        }
    }

    /// A failed result always carries a non-empty message.
    pub fn failed(message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = "step failed".to_string();
        }
        Self {
            outcome: StepOutcome::Failed,
            artifact: None,
            message: Some(message),
        }
    }

    pub fn deferred(message: impl Into<String>) -> Self {
        Self {
            outcome: StepOutcome::Deferred,
            artifact: None,
            message: Some(message.into()),
        }
    }

    pub fn with_artifact(mut self, artifact: PathBuf) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn is_failed(&self) -> bool {
        self.outcome == StepOutcome::Failed
    }
}

/// The outcome of one environment precondition check.
#[derive(Debug, Clone)]
pub struct Finding {
    /// Name of the check (stable across runs).
    pub check: String,

    pub passed: bool,

    /// What was observed, pass or fail.
    pub detail: String,
}

impl Finding {
    pub fn pass(check: &str, detail: impl Into<String>) -> Self {
        Self {
            check: check.to_string(),
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn fail(check: &str, detail: impl Into<String>) -> Self {
        Self {
            check: check.to_string(),
            passed: false,
            detail: detail.into(),
        }
    }
}
