//! Per-run mutable state shared across steps.
//!
//! A `RunContext` is owned exclusively by the orchestrator for the duration
//! of one run. Steps read and update it sequentially; there is no shared
//! ownership and no global instance.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use uuid::Uuid;

use crate::adapters::UserInterface;

/// Mutable state for one workflow run.
#[derive(Debug)]
pub struct RunContext {
    pub run_id: Uuid,

    /// Root directory that extracted trees land under.
    pub workspace: PathBuf,

    /// Staging directory for downloaded archives.
    pub staging: PathBuf,

    /// Resource name -> resolved local path, populated as fetch/extract
    /// steps succeed. A recorded path existed on disk at the moment of
    /// recording; consumers re-check before use.
    resolved: HashMap<String, PathBuf>,

    /// User-supplied parameters, e.g. a selected release channel.
    params: HashMap<String, String>,

    /// Single policy consulted by every fetch/extract step when its
    /// destination already exists.
    pub overwrite: OverwritePolicy,
}

impl RunContext {
    pub fn new(run_id: Uuid, workspace: PathBuf) -> Self {
        let staging = crate::config::staging_dir(&workspace);
        Self {
            run_id,
            workspace,
            staging,
            resolved: HashMap::new(),
            params: HashMap::new(),
            overwrite: OverwritePolicy::Ask,
        }
    }

    /// Record a resource as resolved to a local path.
    pub fn resolve(&mut self, name: &str, path: PathBuf) {
        self.resolved.insert(name.to_string(), path);
    }

    /// Look up the resolved path for a resource, if any.
    pub fn resolved(&self, name: &str) -> Option<&Path> {
        self.resolved.get(name).map(PathBuf::as_path)
    }

    /// Forget a previously resolved resource.
    pub fn invalidate(&mut self, name: &str) {
        self.resolved.remove(name);
    }

    pub fn set_param(&mut self, key: &str, value: &str) {
        self.params.insert(key.to_string(), value.to_string());
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// What to do when a fetch/extract destination already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// Ask the user each time.
    #[default]
    Ask,

    /// Keep every existing artifact without asking.
    Keep,

    /// Replace every existing artifact without asking.
    Replace,
}

/// The decision for one existing destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Overwrite the existing artifact.
    Proceed,

    /// Leave the existing artifact in place; the step is skipped and the
    /// context keeps pointing at the prior path.
    KeepExisting,
}

impl OverwritePolicy {
    /// Decide what to do about an existing destination. `Ask` defers to the
    /// user; declining never silently discards the prior artifact.
    pub fn decide(&self, path: &Path, ui: &dyn UserInterface) -> Result<Decision> {
        match self {
            Self::Keep => Ok(Decision::KeepExisting),
            Self::Replace => Ok(Decision::Proceed),
            Self::Ask => {
                ui.warn(&format!("{} already exists", path.display()));
                if ui.confirm("Overwrite it?")? {
                    Ok(Decision::Proceed)
                } else {
                    Ok(Decision::KeepExisting)
                }
            }
        }
    }
}
