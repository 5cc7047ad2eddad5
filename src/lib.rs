//! rigup - guided fetch/extract/checkpoint workflow engine
//!
//! A workflow here is a mix of automated actions (download a bundle,
//! unpack an archive, launch an external tool) and manually-confirmed
//! checkpoints, sequenced into one coherent, re-enterable procedure with a
//! durable record of everything that happened.
//!
//! # Architecture
//!
//! - Steps execute strictly one at a time against a per-run `RunContext`
//!   owned by the orchestrator; there is no global state.
//! - Collaborator faults never cross the orchestrator boundary raw: they
//!   are converted to typed step results and logged.
//! - A failed automated step halts the rest of a sequence; deferred hybrid
//!   steps and manual checkpoints never do.
//!
//! # Modules
//!
//! - `adapters`: collaborator traits and live implementations (HTTP fetch,
//!   archive extraction, process launch, console UI)
//! - `core`: orchestration logic (Plan, StepRegistry, RunLog, Orchestrator)
//! - `domain`: data structures (RunContext, StepResult, Finding, errors)
//! - `cli`: command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Interactive menu over the built-in plan
//! rigup
//!
//! # Run the full sequence of a custom plan
//! rigup --auto --plan plans/bench.yaml --param channel=stable
//!
//! # Check environment preconditions only
//! rigup --validate
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{
    ArchiveExtractor, ConsoleUi, DetachedRunner, ExtractError, Extractor, FetchError, Fetched,
    Fetcher, HttpFetcher, Launched, ProcessRunner, Toolbox, UserInterface,
};
pub use self::core::{LogEntry, Orchestrator, Plan, RunLog, Severity, StepCategory, StepRegistry};
pub use domain::{
    Decision, Finding, OverwritePolicy, RunContext, StepOutcome, StepResult, WorkflowError,
};
