//! Collaborator interfaces for external capabilities.
//!
//! The orchestrator never talks to the network, the filesystem archive
//! layer, the process table, or the terminal directly; it goes through
//! these traits. Live implementations live in the submodules, stubs live
//! in the tests.

pub mod archive;
pub mod console;
pub mod http;
pub mod process;

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::core::run_log::LogEntry;

// Re-export the live implementations
pub use self::archive::ArchiveExtractor;
pub use self::console::ConsoleUi;
pub use self::http::HttpFetcher;
pub use self::process::DetachedRunner;

/// A completed transfer.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Local path the bytes were written to.
    pub path: PathBuf,

    /// Number of bytes transferred.
    pub bytes: u64,

    /// Hex SHA-256 digest of the transferred bytes.
    pub digest: String,
}

/// Faults a fetcher can report.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

/// Faults an extractor can report.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

/// Retrieves a byte stream from a named location to a local destination.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `url` to `dest`, reporting progress as bytes arrive.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<Fetched, FetchError>;

    /// Cheap reachability check used by the precondition battery.
    async fn probe(&self, url: &str) -> Result<(), FetchError>;
}

/// Unpacks an archive to a destination directory.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extract `archive` under `dest`, returning the extracted root.
    async fn extract(&self, archive: &Path, dest: &Path) -> Result<PathBuf, ExtractError>;
}

/// Handle for a launched external tool.
#[derive(Debug, Clone)]
pub struct Launched {
    pub pid: Option<u32>,
}

/// Launches an external program. The program outlives the handle; waiting
/// for it is the user's job, signalled back through the UserInterface.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn launch(&self, program: &Path, args: &[String], cwd: Option<&Path>)
        -> Result<Launched>;
}

/// Renders step output and collects user input.
///
/// Input methods surface a user abort (closed stdin, abandoned prompt) as
/// [`crate::domain::WorkflowError::Aborted`]; the orchestrator turns that
/// into a logged, graceful end of run.
pub trait UserInterface: Send + Sync {
    fn header(&self, title: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
    fn success(&self, message: &str);

    /// Render numbered instruction lines for a manual or hybrid step.
    fn instructions(&self, lines: &[String]) {
        for (i, line) in lines.iter().enumerate() {
            self.info(&format!("{}. {}", i + 1, line));
        }
    }

    /// Yes/no question.
    fn confirm(&self, prompt: &str) -> Result<bool>;

    /// Pick one of `options`; returns the index.
    fn choose(&self, prompt: &str, options: &[String]) -> Result<usize>;

    /// "Press Enter to continue" style pause.
    fn wait(&self, prompt: &str) -> Result<()>;

    /// Render the run log.
    fn show_log(&self, entries: &[LogEntry]);
}

/// The set of collaborators one orchestrator works with.
pub struct Toolbox {
    pub fetcher: Box<dyn Fetcher>,
    pub extractor: Box<dyn Extractor>,
    pub runner: Box<dyn ProcessRunner>,
    pub ui: Box<dyn UserInterface>,
}

impl Toolbox {
    /// The live collaborators used by the CLI.
    pub fn live() -> Self {
        Self {
            fetcher: Box::new(HttpFetcher::new()),
            extractor: Box::new(ArchiveExtractor),
            runner: Box::new(DetachedRunner),
            ui: Box::new(ConsoleUi::new()),
        }
    }
}
