//! The workflow orchestrator.
//!
//! Owns the run context, run log, collaborators, and step catalog for one
//! run, and drives steps strictly one at a time. This is the single point
//! where collaborator faults become typed step results: nothing raw crosses
//! this boundary.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::instrument;
use uuid::Uuid;

use crate::adapters::{Toolbox, UserInterface};
use crate::domain::{Finding, OverwritePolicy, RunContext, StepOutcome, StepResult, WorkflowError};

use super::plan::{Plan, Requirements};
use super::registry::StepRegistry;
use super::run_log::RunLog;

const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// Sequences steps, tracks per-run state, and appends every observable
/// action to the run log.
pub struct Orchestrator {
    registry: StepRegistry,
    requirements: Requirements,
    toolbox: Toolbox,
    ctx: RunContext,
    log: RunLog,
    aborted: bool,
}

impl Orchestrator {
    /// Create an orchestrator for one run of `plan`. The workspace and
    /// staging directories are created up front; the run log gets a JSONL
    /// sink under `<workspace>/logs/`.
    pub fn new(plan: &Plan, toolbox: Toolbox, workspace: PathBuf) -> Result<Self> {
        plan.validate()?;

        let run_id = Uuid::new_v4();
        let ctx = RunContext::new(run_id, workspace);

        std::fs::create_dir_all(&ctx.staging)
            .with_context(|| format!("failed to create workspace {}", ctx.workspace.display()))?;

        let sink = crate::config::logs_dir(&ctx.workspace).join(format!("{}.jsonl", run_id));
        let mut log = RunLog::with_sink(sink);
        log.info(format!(
            "workflow '{}' ready: {} steps, run {}",
            plan.name,
            plan.steps.len(),
            run_id
        ));

        Ok(Self {
            registry: StepRegistry::from_plan(plan),
            requirements: plan.requirements.clone(),
            toolbox,
            ctx,
            log,
            aborted: false,
        })
    }

    pub fn with_overwrite(mut self, policy: OverwritePolicy) -> Self {
        self.ctx.overwrite = policy;
        self
    }

    pub fn set_param(&mut self, key: &str, value: &str) {
        self.ctx.set_param(key, value);
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn log(&self) -> &RunLog {
        &self.log
    }

    pub fn ui(&self) -> &dyn UserInterface {
        self.toolbox.ui.as_ref()
    }

    /// True once the user has aborted; no further steps will run.
    pub fn aborted(&self) -> bool {
        self.aborted
    }

    /// Execute a single step by id.
    ///
    /// Any error raised by a collaborator is caught here and converted to a
    /// failed result carrying the error's message; a user abort is logged
    /// and marks the run aborted. Exactly one log entry records the
    /// outcome.
    #[instrument(skip(self), fields(step = %id))]
    pub async fn run_step(&mut self, id: &str) -> StepResult {
        let Some(entry) = self.registry.get(id) else {
            let message = WorkflowError::UnknownStep(id.to_string()).to_string();
            self.toolbox.ui.error(&message);
            self.log.error(message.clone());
            return StepResult::failed(message);
        };

        self.toolbox.ui.header(&entry.label);
        let started = Instant::now();

        let result = match entry.execute(&mut self.ctx, &self.toolbox).await {
            Ok(result) => result,
            Err(err) if WorkflowError::is_abort(&err) => {
                self.aborted = true;
                self.log
                    .info(format!("run aborted by user during step '{}'", entry.id));
                return StepResult::skipped("aborted by user");
            }
            Err(err) => StepResult::failed(format!("{:#}", err)),
        };

        let elapsed_ms = started.elapsed().as_millis();
        match result.outcome {
            StepOutcome::Success => {
                self.log.info(format!(
                    "step '{}' succeeded in {} ms{}",
                    entry.id,
                    elapsed_ms,
                    result
                        .message
                        .as_deref()
                        .map(|m| format!(" ({})", m))
                        .unwrap_or_default()
                ));
            }
            StepOutcome::Skipped => {
                let note = result.message.as_deref().unwrap_or("skipped");
                self.log.info(format!("step '{}' skipped: {}", entry.id, note));
            }
            StepOutcome::Deferred => {
                let note = result.message.as_deref().unwrap_or("deferred");
                self.toolbox.ui.warn(note);
                self.log
                    .info(format!("step '{}' deferred: {}", entry.id, note));
            }
            StepOutcome::Failed => {
                // `failed` results always carry a message.
                let note = result.message.as_deref().unwrap_or("step failed");
                self.toolbox
                    .ui
                    .error(&format!("{}: {}", entry.label, note));
                self.log.error(format!("step '{}' failed: {}", entry.id, note));
            }
        }

        result
    }

    /// Execute steps in order.
    ///
    /// A failure in an automated step halts the remainder: later automated
    /// steps would run against missing preconditions. Deferred hybrid
    /// steps and manual checkpoints never halt. The halt itself is logged,
    /// so no step disappears from the audit trail silently.
    #[instrument(skip(self, ids))]
    pub async fn run_sequence(&mut self, ids: &[String]) -> Vec<StepResult> {
        let mut results = Vec::with_capacity(ids.len());

        for (i, id) in ids.iter().enumerate() {
            let automated = self
                .registry
                .get(id)
                .map(|entry| entry.category.is_automated())
                // Unknown ids fail like automated steps: something is wrong
                // with the requested sequence itself.
                .unwrap_or(true);

            let result = self.run_step(id).await;
            let failed = result.is_failed();
            results.push(result);

            let remaining = ids.len() - i - 1;
            if self.aborted {
                if remaining > 0 {
                    self.log.info(format!(
                        "run aborted: {} remaining steps not attempted",
                        remaining
                    ));
                }
                break;
            }
            if failed && automated {
                if remaining > 0 {
                    let note = format!(
                        "sequence halted after '{}': {} remaining steps not attempted",
                        id, remaining
                    );
                    self.toolbox.ui.warn(&note);
                    self.log.warn(note);
                }
                break;
            }
        }

        results
    }

    /// Execute the full canonical sequence.
    pub async fn run_all(&mut self) -> Vec<StepResult> {
        let ids = self.registry.ids();
        self.run_sequence(&ids).await
    }

    /// Run the fixed battery of environment checks. Always returns one
    /// finding per check and never fails; the caller decides whether to
    /// proceed given warnings.
    pub async fn validate_preconditions(&mut self) -> Vec<Finding> {
        let findings = vec![
            self.check_privileges(),
            self.check_platform(),
            self.check_free_space(),
            self.check_network().await,
        ];

        for finding in &findings {
            let note = format!("check '{}': {}", finding.check, finding.detail);
            if finding.passed {
                self.log.info(note);
            } else {
                self.log.warn(note);
            }
        }

        findings
    }

    fn check_privileges(&self) -> Finding {
        if !self.requirements.elevated {
            return Finding::pass("privileges", "not required by this plan");
        }

        #[cfg(unix)]
        {
            if nix::unistd::Uid::effective().is_root() {
                Finding::pass("privileges", "running as root")
            } else {
                Finding::fail("privileges", "re-run with elevated privileges")
            }
        }

        #[cfg(not(unix))]
        {
            Finding::pass("privileges", "privilege level not checked on this platform")
        }
    }

    fn check_platform(&self) -> Finding {
        let current = std::env::consts::OS;
        match &self.requirements.platform {
            None => Finding::pass("platform", format!("running on {}", current)),
            Some(expected) if expected == current => {
                Finding::pass("platform", format!("running on {}", current))
            }
            Some(expected) => Finding::fail(
                "platform",
                format!("plan expects {}, running on {}", expected, current),
            ),
        }
    }

    fn check_free_space(&self) -> Finding {
        let minimum = self.requirements.min_free_space_gb;
        match fs2::available_space(&self.ctx.workspace) {
            Ok(bytes) => {
                let free_gb = bytes / BYTES_PER_GB;
                if free_gb >= minimum {
                    Finding::pass("free-space", format!("{} GB available", free_gb))
                } else {
                    Finding::fail(
                        "free-space",
                        format!("{} GB available, {} GB required", free_gb, minimum),
                    )
                }
            }
            Err(err) => Finding::fail("free-space", format!("could not measure: {}", err)),
        }
    }

    async fn check_network(&self) -> Finding {
        let url = &self.requirements.probe_url;
        match self.toolbox.fetcher.probe(url).await {
            Ok(()) => Finding::pass("network", format!("{} reachable", url)),
            Err(err) => Finding::fail("network", format!("{} unreachable: {}", url, err)),
        }
    }
}
