//! Workspace path resolution.
//!
//! Resolution order (highest priority first):
//! 1. `--workspace` flag
//! 2. `RIGUP_WORKSPACE` environment variable
//! 3. `~/rigup`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Resolve the workspace root for this invocation.
pub fn resolve_workspace(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path);
    }

    if let Ok(env) = std::env::var("RIGUP_WORKSPACE") {
        if !env.is_empty() {
            return Ok(PathBuf::from(env));
        }
    }

    let home = dirs::home_dir().context("failed to determine home directory")?;
    Ok(home.join("rigup"))
}

/// Staging directory for downloaded archives.
pub fn staging_dir(workspace: &Path) -> PathBuf {
    workspace.join("staging")
}

/// Directory holding per-run JSONL log sinks.
pub fn logs_dir(workspace: &Path) -> PathBuf {
    workspace.join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_wins() {
        let resolved = resolve_workspace(Some(PathBuf::from("/tmp/custom"))).unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/custom"));
    }

    #[test]
    fn subdirectories_hang_off_the_workspace() {
        let ws = Path::new("/tmp/ws");
        assert_eq!(staging_dir(ws), PathBuf::from("/tmp/ws/staging"));
        assert_eq!(logs_dir(ws), PathBuf::from("/tmp/ws/logs"));
    }
}
