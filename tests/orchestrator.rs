//! Orchestrator integration tests.
//!
//! Drive the orchestrator end to end with stub collaborators: a scripted
//! user interface, a fetcher that can be told to fail, and an extractor
//! that plants a known tree.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use rigup::adapters::{
    ExtractError, Extractor, FetchError, Fetched, Fetcher, Launched, ProcessRunner, Toolbox,
    UserInterface,
};
use rigup::{
    LogEntry, Orchestrator, OverwritePolicy, Plan, Severity, StepOutcome, WorkflowError,
};

struct StubFetcher {
    fail: bool,
    probe_fails: bool,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<Fetched, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(FetchError::Network(format!(
                "connection refused fetching {}",
                url
            )));
        }
        std::fs::write(dest, b"archive-bytes")?;
        Ok(Fetched {
            path: dest.to_path_buf(),
            bytes: 13,
            digest: "0f1e2d".to_string(),
        })
    }

    async fn probe(&self, url: &str) -> Result<(), FetchError> {
        if self.probe_fails {
            return Err(FetchError::Network(format!("{} unreachable", url)));
        }
        Ok(())
    }
}

struct StubExtractor {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Extractor for StubExtractor {
    async fn extract(&self, _archive: &Path, dest: &Path) -> Result<PathBuf, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::create_dir_all(dest)?;
        std::fs::write(dest.join("tool.sh"), "#!/bin/sh\n")?;
        Ok(dest.to_path_buf())
    }
}

struct NullRunner;

#[async_trait]
impl ProcessRunner for NullRunner {
    async fn launch(
        &self,
        _program: &Path,
        _args: &[String],
        _cwd: Option<&Path>,
    ) -> Result<Launched> {
        Ok(Launched { pid: Some(4242) })
    }
}

/// A user interface with scripted answers. Unscripted confirms say yes,
/// unscripted choices pick the first option.
#[derive(Default)]
struct ScriptedUi {
    confirms: Mutex<VecDeque<bool>>,
    choices: Mutex<VecDeque<usize>>,
    abort_on_wait: bool,
}

impl ScriptedUi {
    fn confirming(answers: &[bool]) -> Self {
        Self {
            confirms: Mutex::new(answers.iter().copied().collect()),
            ..Default::default()
        }
    }

    fn choosing(picks: &[usize]) -> Self {
        Self {
            choices: Mutex::new(picks.iter().copied().collect()),
            ..Default::default()
        }
    }

    fn aborting_on_wait() -> Self {
        Self {
            abort_on_wait: true,
            ..Default::default()
        }
    }
}

impl UserInterface for ScriptedUi {
    fn header(&self, _title: &str) {}
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
    fn success(&self, _message: &str) {}

    fn confirm(&self, _prompt: &str) -> Result<bool> {
        Ok(self.confirms.lock().unwrap().pop_front().unwrap_or(true))
    }

    fn choose(&self, _prompt: &str, _options: &[String]) -> Result<usize> {
        Ok(self.choices.lock().unwrap().pop_front().unwrap_or(0))
    }

    fn wait(&self, _prompt: &str) -> Result<()> {
        if self.abort_on_wait {
            return Err(WorkflowError::Aborted.into());
        }
        Ok(())
    }

    fn show_log(&self, _entries: &[LogEntry]) {}
}

struct Rig {
    orchestrator: Orchestrator,
    fetch_calls: Arc<AtomicUsize>,
    extract_calls: Arc<AtomicUsize>,
    _workspace: TempDir,
}

fn rig(plan_yaml: &str, fetch_fail: bool, ui: ScriptedUi) -> Rig {
    let fetch_calls = Arc::new(AtomicUsize::new(0));
    let extract_calls = Arc::new(AtomicUsize::new(0));

    let toolbox = Toolbox {
        fetcher: Box::new(StubFetcher {
            fail: fetch_fail,
            probe_fails: false,
            calls: fetch_calls.clone(),
        }),
        extractor: Box::new(StubExtractor {
            calls: extract_calls.clone(),
        }),
        runner: Box::new(NullRunner),
        ui: Box::new(ui),
    };

    let workspace = TempDir::new().unwrap();
    let plan = Plan::from_yaml(plan_yaml).unwrap();
    let orchestrator =
        Orchestrator::new(&plan, toolbox, workspace.path().to_path_buf()).unwrap();

    Rig {
        orchestrator,
        fetch_calls,
        extract_calls,
        _workspace: workspace,
    }
}

const BASIC_PLAN: &str = r#"
name: fixture
description: Fetch, extract, confirm

requirements:
  min_free_space_gb: 0

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

  - kind: guide
    id: confirm-b
    label: Confirm checkpoint B
    instructions:
      - Do the manual thing.
"#;

const HYBRID_PLAN: &str = r#"
name: fixture-hybrid
description: Fetch, extract, launch, confirm

requirements:
  min_free_space_gb: 0

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

const RELEASE_PLAN: &str = r#"
name: fixture-release
description: Parameterized fetch

requirements:
  min_free_space_gb: 0

steps:
  - kind: fetch-release
    id: fetch-image
    label: Download a base image
    param: channel
    file: image.zip
    choices:
      - id: stable
        url: https://example.com/stable/image.zip
      - id: beta
        url: https://example.com/beta/image.zip
"#;

fn severities(entries: &[LogEntry], severity: Severity) -> Vec<&LogEntry> {
    entries.iter().filter(|e| e.severity == severity).collect()
}

#[tokio::test]
async fn unknown_step_fails_and_logs_one_error() {
    let mut rig = rig(BASIC_PLAN, false, ScriptedUi::default());
    let before = rig.orchestrator.log().len();

    let result = rig.orchestrator.run_step("no-such-step").await;

    assert_eq!(result.outcome, StepOutcome::Failed);
    assert!(result.message.unwrap().contains("unknown step"));

    let entries = rig.orchestrator.log().snapshot();
    assert_eq!(entries.len(), before + 1);
    assert_eq!(entries.last().unwrap().severity, Severity::Error);
}

#[tokio::test]
async fn failed_fetch_halts_the_sequence() {
    let mut rig = rig(BASIC_PLAN, true, ScriptedUi::default());

    let results = rig.orchestrator.run_all().await;

    // Only the failing fetch ran; extract and the checkpoint never did.
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].outcome, StepOutcome::Failed);
    assert_eq!(rig.extract_calls.load(Ordering::SeqCst), 0);

    let entries = rig.orchestrator.log().snapshot();
    let errors = severities(&entries, Severity::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("fetch-a"));

    // The halt is logged; the un-run steps are never silently dropped.
    let warns = severities(&entries, Severity::Warn);
    assert!(warns.iter().any(|e| e.message.contains("not attempted")));
}

#[tokio::test]
async fn declining_overwrite_twice_is_idempotent() {
    let mut rig = rig(BASIC_PLAN, false, ScriptedUi::confirming(&[false, false]));

    let prior = rig.orchestrator.context().staging.join("a.zip");
    std::fs::write(&prior, b"prior artifact").unwrap();

    let first = rig.orchestrator.run_step("fetch-a").await;
    let second = rig.orchestrator.run_step("fetch-a").await;

    assert_eq!(first.outcome, StepOutcome::Skipped);
    assert_eq!(second.outcome, StepOutcome::Skipped);
    assert_eq!(rig.fetch_calls.load(Ordering::SeqCst), 0);

    // The context still points at the untouched prior artifact.
    let resolved = rig.orchestrator.context().resolved("fetch-a").unwrap();
    assert_eq!(resolved, prior.as_path());
    assert!(resolved.exists());
    assert_eq!(std::fs::read(&prior).unwrap(), b"prior artifact");
}

#[tokio::test]
async fn full_sequence_succeeds() {
    let mut rig = rig(BASIC_PLAN, false, ScriptedUi::default());

    let results = rig.orchestrator.run_all().await;

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.outcome == StepOutcome::Success));
    assert_eq!(rig.fetch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(rig.extract_calls.load(Ordering::SeqCst), 1);

    let root = rig.orchestrator.context().resolved("extract-a").unwrap();
    assert!(root.exists());
    assert!(root.ends_with("tools/a"));
}

#[tokio::test]
async fn deferred_tool_run_does_not_halt() {
    // The user declines "did the tool complete?"; the checkpoint after it
    // still runs.
    let mut rig = rig(HYBRID_PLAN, false, ScriptedUi::confirming(&[false]));

    let results = rig.orchestrator.run_all().await;

    let outcomes: Vec<StepOutcome> = results.iter().map(|r| r.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            StepOutcome::Success,
            StepOutcome::Success,
            StepOutcome::Deferred,
            StepOutcome::Success,
        ]
    );
}

#[tokio::test]
async fn out_of_set_release_parameter_fails_without_fetching() {
    let mut rig = rig(RELEASE_PLAN, false, ScriptedUi::default());
    rig.orchestrator.set_param("channel", "nightly");

    let result = rig.orchestrator.run_step("fetch-image").await;

    assert_eq!(result.outcome, StepOutcome::Failed);
    let message = result.message.unwrap();
    assert!(message.contains("nightly"));
    assert!(message.contains("stable"));
    assert_eq!(rig.fetch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn release_choice_can_come_from_the_ui() {
    let mut rig = rig(RELEASE_PLAN, false, ScriptedUi::choosing(&[1]));

    let result = rig.orchestrator.run_step("fetch-image").await;

    assert_eq!(result.outcome, StepOutcome::Success);
    assert_eq!(rig.orchestrator.context().param("channel"), Some("beta"));

    let resolved = rig.orchestrator.context().resolved("fetch-image").unwrap();
    assert!(resolved.to_string_lossy().ends_with("beta-image.zip"));
}

#[tokio::test]
async fn precondition_battery_has_a_fixed_size() {
    let mut rig = rig(BASIC_PLAN, false, ScriptedUi::default());

    let findings = rig.orchestrator.validate_preconditions().await;

    assert_eq!(findings.len(), 4);
    let names: Vec<&str> = findings.iter().map(|f| f.check.as_str()).collect();
    assert_eq!(names, vec!["privileges", "platform", "free-space", "network"]);
}

#[tokio::test]
async fn unreachable_probe_is_a_finding_not_an_error() {
    let fetch_calls = Arc::new(AtomicUsize::new(0));
    let toolbox = Toolbox {
        fetcher: Box::new(StubFetcher {
            fail: false,
            probe_fails: true,
            calls: fetch_calls,
        }),
        extractor: Box::new(StubExtractor {
            calls: Arc::new(AtomicUsize::new(0)),
        }),
        runner: Box::new(NullRunner),
        ui: Box::new(ScriptedUi::default()),
    };

    let workspace = TempDir::new().unwrap();
    let plan = Plan::from_yaml(BASIC_PLAN).unwrap();
    let mut orchestrator =
        Orchestrator::new(&plan, toolbox, workspace.path().to_path_buf()).unwrap();

    let findings = orchestrator.validate_preconditions().await;
    assert_eq!(findings.len(), 4);

    let network = findings.iter().find(|f| f.check == "network").unwrap();
    assert!(!network.passed);
    assert!(network.detail.contains("unreachable"));
}

#[tokio::test]
async fn abort_ends_the_run_gracefully() {
    let mut rig = rig(BASIC_PLAN, false, ScriptedUi::aborting_on_wait());

    let results = rig.orchestrator.run_all().await;

    // Fetch and extract succeed without prompts; the checkpoint's pause is
    // where the user walks away.
    assert_eq!(results.len(), 3);
    assert_eq!(results[2].outcome, StepOutcome::Skipped);
    assert!(rig.orchestrator.aborted());

    let entries = rig.orchestrator.log().snapshot();
    assert!(entries.iter().any(|e| e.message.contains("aborted")));
}

#[tokio::test]
async fn replace_policy_overwrites_without_asking() {
    let rig = rig(BASIC_PLAN, false, ScriptedUi::default());
    let mut orchestrator = rig.orchestrator.with_overwrite(OverwritePolicy::Replace);

    let prior = orchestrator.context().staging.join("a.zip");
    std::fs::write(&prior, b"prior artifact").unwrap();

    let result = orchestrator.run_step("fetch-a").await;

    assert_eq!(result.outcome, StepOutcome::Success);
    assert_eq!(rig.fetch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(std::fs::read(&prior).unwrap(), b"archive-bytes");
}
