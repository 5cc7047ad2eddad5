//! External tool launching.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

use super::{Launched, ProcessRunner};

/// Spawns a program detached from the workflow, with the terminal handed
/// over to it. The child keeps running when the handle is dropped; the
/// workflow learns about completion from the user, not from the process.
pub struct DetachedRunner;

#[async_trait]
impl ProcessRunner for DetachedRunner {
    async fn launch(
        &self,
        program: &Path,
        args: &[String],
        cwd: Option<&Path>,
    ) -> Result<Launched> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(false);

        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let child = command
            .spawn()
            .with_context(|| format!("failed to launch {}", program.display()))?;

        Ok(Launched { pid: child.id() })
    }
}
