//! The step catalog and the step actions behind it.
//!
//! The registry is built once from a validated plan and immutable
//! afterwards: every menu entry, sequence id, and lookup resolves against
//! the same strictly-ordered catalog. Dispatch is by step id over the
//! closed set of categories; nothing is re-parsed per invocation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use walkdir::WalkDir;

use crate::adapters::Toolbox;
use crate::domain::{Decision, RunContext, StepResult, WorkflowError};

use super::plan::{Plan, ReleaseChoice, StepSpec};

/// The kind of work a step performs, driving sequence policy: only
/// automated categories halt a sequence when they fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepCategory {
    AutomatedFetch,
    AutomatedExtract,
    Hybrid,
    ManualCheckpoint,
}

impl StepCategory {
    /// Automated steps have hard data dependencies; a failure poisons
    /// everything downstream.
    pub fn is_automated(&self) -> bool {
        matches!(self, Self::AutomatedFetch | Self::AutomatedExtract)
    }
}

impl std::fmt::Display for StepCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::AutomatedFetch => "fetch",
            Self::AutomatedExtract => "extract",
            Self::Hybrid => "tool",
            Self::ManualCheckpoint => "manual",
        };
        f.write_str(label)
    }
}

/// Executable behavior of one step.
#[async_trait]
pub trait StepAction: Send + Sync {
    async fn run(&self, ctx: &mut RunContext, tools: &Toolbox) -> Result<StepResult>;
}

/// One immutable catalog entry.
pub struct StepEntry {
    pub id: String,
    pub label: String,
    pub category: StepCategory,
    pub ordinal: usize,
    action: Box<dyn StepAction>,
}

impl StepEntry {
    pub(crate) async fn execute(&self, ctx: &mut RunContext, tools: &Toolbox) -> Result<StepResult> {
        self.action.run(ctx, tools).await
    }
}

/// The canonical, strictly-ordered step catalog for one workflow.
pub struct StepRegistry {
    steps: Vec<StepEntry>,
}

impl StepRegistry {
    /// Build the catalog from a validated plan.
    pub fn from_plan(plan: &Plan) -> Self {
        let steps = plan
            .steps
            .iter()
            .enumerate()
            .map(|(ordinal, spec)| build_entry(ordinal, spec))
            .collect();
        Self { steps }
    }

    pub fn get(&self, id: &str) -> Option<&StepEntry> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepEntry> {
        self.steps.iter()
    }

    /// All step ids in canonical order.
    pub fn ids(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

fn build_entry(ordinal: usize, spec: &StepSpec) -> StepEntry {
    let (category, action): (StepCategory, Box<dyn StepAction>) = match spec {
        StepSpec::Fetch { id, url, file, .. } => (
            StepCategory::AutomatedFetch,
            Box::new(FetchAction {
                resource: id.clone(),
                url: url.clone(),
                file: file.clone(),
            }),
        ),
        StepSpec::FetchRelease {
            id,
            param,
            choices,
            file,
            ..
        } => (
            StepCategory::AutomatedFetch,
            Box::new(FetchReleaseAction {
                resource: id.clone(),
                param: param.clone(),
                choices: choices.clone(),
                file: file.clone(),
            }),
        ),
        StepSpec::Extract {
            id,
            archive,
            dest,
            subdir,
            ..
        } => (
            StepCategory::AutomatedExtract,
            Box::new(ExtractAction {
                resource: id.clone(),
                archive: archive.clone(),
                dest: dest.clone(),
                subdir: subdir.clone(),
            }),
        ),
        StepSpec::Launch {
            resource,
            program,
            args,
            instructions,
            ..
        } => (
            StepCategory::Hybrid,
            Box::new(LaunchAction {
                resource: resource.clone(),
                program: program.clone(),
                args: args.clone(),
                instructions: instructions.clone(),
            }),
        ),
        StepSpec::Guide { instructions, .. } => (
            StepCategory::ManualCheckpoint,
            Box::new(GuideAction {
                instructions: instructions.clone(),
            }),
        ),
    };

    StepEntry {
        id: spec.id().to_string(),
        label: spec.label().to_string(),
        category,
        ordinal,
        action,
    }
}

/// Download a file into the staging directory.
struct FetchAction {
    resource: String,
    url: String,
    file: String,
}

#[async_trait]
impl StepAction for FetchAction {
    async fn run(&self, ctx: &mut RunContext, tools: &Toolbox) -> Result<StepResult> {
        let dest = ctx.staging.join(&self.file);
        fetch_to(ctx, tools, &self.resource, &self.url, dest).await
    }
}

/// Download one of an enumerated release set, selected by a parameter.
struct FetchReleaseAction {
    resource: String,
    param: String,
    choices: Vec<ReleaseChoice>,
    file: String,
}

#[async_trait]
impl StepAction for FetchReleaseAction {
    async fn run(&self, ctx: &mut RunContext, tools: &Toolbox) -> Result<StepResult> {
        let ids: Vec<String> = self.choices.iter().map(|c| c.id.clone()).collect();

        let value = match ctx.param(&self.param) {
            Some(v) => v.to_string(),
            None => {
                let picked = tools
                    .ui
                    .choose(&format!("Select a {}", self.param), &ids)?;
                let value = ids[picked].clone();
                ctx.set_param(&self.param, &value);
                value
            }
        };

        // Reject out-of-set identifiers before any network I/O.
        let choice = self
            .choices
            .iter()
            .find(|c| c.id == value)
            .ok_or_else(|| WorkflowError::UnsupportedParameter {
                name: self.param.clone(),
                value: value.clone(),
                allowed: ids.join(", "),
            })?;

        let dest = ctx.staging.join(format!("{}-{}", choice.id, self.file));
        let url = choice.url.clone();
        fetch_to(ctx, tools, &self.resource, &url, dest).await
    }
}

/// Shared fetch behavior: overwrite policy, transfer, context resolution.
async fn fetch_to(
    ctx: &mut RunContext,
    tools: &Toolbox,
    resource: &str,
    url: &str,
    dest: PathBuf,
) -> Result<StepResult> {
    if dest.exists() {
        if let Decision::KeepExisting = ctx.overwrite.decide(&dest, tools.ui.as_ref())? {
            ctx.resolve(resource, dest.clone());
            return Ok(StepResult::skipped(format!(
                "kept existing {}",
                dest.display()
            )));
        }
    }

    fs::create_dir_all(&ctx.staging)
        .await
        .with_context(|| format!("failed to create {}", ctx.staging.display()))?;

    tools.ui.info(&format!("Downloading {}", url));
    let fetched = tools.fetcher.fetch(url, &dest).await?;

    ctx.resolve(resource, fetched.path.clone());
    tools
        .ui
        .success(&format!("Downloaded {}", fetched.path.display()));

    Ok(StepResult::success_at(
        fetched.path,
        format!("{} bytes, sha256 {}", fetched.bytes, fetched.digest),
    ))
}

/// Unpack a previously fetched archive.
struct ExtractAction {
    resource: String,
    archive: String,
    dest: String,
    subdir: Option<String>,
}

impl ExtractAction {
    fn root_of(&self, dest: &Path) -> PathBuf {
        match &self.subdir {
            Some(subdir) => dest.join(subdir),
            None => dest.to_path_buf(),
        }
    }
}

#[async_trait]
impl StepAction for ExtractAction {
    async fn run(&self, ctx: &mut RunContext, tools: &Toolbox) -> Result<StepResult> {
        let archive = ctx
            .resolved(&self.archive)
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "archive '{}' is not available; run its fetch step first",
                    self.archive
                )
            })?;
        if !archive.exists() {
            anyhow::bail!("archive {} is missing from disk", archive.display());
        }

        let dest = ctx.workspace.join(&self.dest);
        if dest.exists() {
            if let Decision::KeepExisting = ctx.overwrite.decide(&dest, tools.ui.as_ref())? {
                let root = self.root_of(&dest);
                ctx.resolve(&self.resource, root.clone());
                return Ok(StepResult::skipped(format!(
                    "kept existing {}",
                    dest.display()
                )));
            }
            fs::remove_dir_all(&dest)
                .await
                .with_context(|| format!("failed to clear {}", dest.display()))?;
        }

        tools.ui.info(&format!(
            "Extracting {} to {}",
            archive.display(),
            dest.display()
        ));
        let extracted = tools.extractor.extract(&archive, &dest).await?;

        let root = self.root_of(&extracted);
        if !root.exists() {
            anyhow::bail!(
                "expected directory {} not found after extraction",
                root.display()
            );
        }

        ctx.resolve(&self.resource, root.clone());
        tools.ui.success(&format!("Extracted to {}", root.display()));

        Ok(StepResult::success_at(
            root.clone(),
            format!("extracted to {}", root.display()),
        ))
    }
}

/// Launch an external tool and wait for user-confirmed completion.
struct LaunchAction {
    resource: String,
    program: String,
    args: Vec<String>,
    instructions: Vec<String>,
}

#[async_trait]
impl StepAction for LaunchAction {
    async fn run(&self, ctx: &mut RunContext, tools: &Toolbox) -> Result<StepResult> {
        let tree = ctx
            .resolved(&self.resource)
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "resource '{}' is not available; run its earlier steps first",
                    self.resource
                )
            })?;

        let program = locate_program(&tree, &self.program)?;

        tools.ui.instructions(&self.instructions);
        tools
            .ui
            .wait(&format!("Press Enter to launch {}...", self.program))?;

        let launched = tools
            .runner
            .launch(&program, &self.args, program.parent())
            .await?;
        if let Some(pid) = launched.pid {
            tools
                .ui
                .info(&format!("Launched {} (pid {})", self.program, pid));
        }

        tools
            .ui
            .wait("Press Enter once the tool has finished...")?;

        if tools.ui.confirm("Did the tool complete successfully?")? {
            Ok(StepResult::success_at(
                program,
                format!("{} completed", self.program),
            ))
        } else {
            Ok(StepResult::deferred(format!(
                "{} not confirmed complete; redo this step when ready",
                self.program
            )))
        }
    }
}

/// A manual checkpoint: render the instructions, wait for confirmation.
/// Never touches the resolved-resource map.
struct GuideAction {
    instructions: Vec<String>,
}

#[async_trait]
impl StepAction for GuideAction {
    async fn run(&self, _ctx: &mut RunContext, tools: &Toolbox) -> Result<StepResult> {
        tools.ui.instructions(&self.instructions);
        tools
            .ui
            .wait("Press Enter once you have completed these steps...")?;
        Ok(StepResult::success())
    }
}

/// Find a file by name anywhere under an extracted tree.
fn locate_program(tree: &Path, name: &str) -> Result<PathBuf> {
    WalkDir::new(tree)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name() == name)
        .map(|entry| entry.into_path())
        .ok_or_else(|| anyhow::anyhow!("program '{}' not found under {}", name, tree.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN_YAML: &str = r#"
name: fixture
description: Registry fixture

steps:
  - kind: fetch
    id: fetch-a
    label: Download bundle A
    url: https://example.com/a.zip
    file: a.zip

  - kind: extract
    id: extract-a
    label: Unpack bundle A
    archive: fetch-a
    dest: tools/a

  - kind: launch
    id: run-a
    label: Run tool A
    resource: extract-a
    program: tool.sh

  - kind: guide
    id: confirm-b
    label: Confirm checkpoint B
    instructions:
      - Do the manual thing.
"#;

    #[test]
    fn registry_preserves_order_and_categories() {
        let plan = Plan::from_yaml(PLAN_YAML).unwrap();
        let registry = StepRegistry::from_plan(&plan);

        assert_eq!(registry.len(), 4);
        assert_eq!(
            registry.ids(),
            vec!["fetch-a", "extract-a", "run-a", "confirm-b"]
        );

        let categories: Vec<StepCategory> =
            registry.iter().map(|s| s.category).collect();
        assert_eq!(
            categories,
            vec![
                StepCategory::AutomatedFetch,
                StepCategory::AutomatedExtract,
                StepCategory::Hybrid,
                StepCategory::ManualCheckpoint,
            ]
        );

        for (i, step) in registry.iter().enumerate() {
            assert_eq!(step.ordinal, i);
        }
    }

    #[test]
    fn lookup_by_id() {
        let plan = Plan::from_yaml(PLAN_YAML).unwrap();
        let registry = StepRegistry::from_plan(&plan);

        let step = registry.get("extract-a").unwrap();
        assert_eq!(step.label, "Unpack bundle A");
        assert!(step.category.is_automated());

        assert!(registry.get("no-such-step").is_none());
    }

    #[test]
    fn manual_and_hybrid_are_not_automated() {
        assert!(!StepCategory::Hybrid.is_automated());
        assert!(!StepCategory::ManualCheckpoint.is_automated());
        assert!(StepCategory::AutomatedFetch.is_automated());
        assert!(StepCategory::AutomatedExtract.is_automated());
    }

    #[test]
    fn locate_program_walks_the_tree() {
        let temp = tempfile::TempDir::new().unwrap();
        let nested = temp.path().join("bundle/scripts");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("tool.sh"), "#!/bin/sh\n").unwrap();

        let found = locate_program(temp.path(), "tool.sh").unwrap();
        assert_eq!(found, nested.join("tool.sh"));

        assert!(locate_program(temp.path(), "missing.sh").is_err());
    }
}
