//! Terminal user interface: styled output plus interactive prompts.

use std::io::{self, Write};

use anyhow::Result;
use console::style;
use dialoguer::{Confirm, Select};

use super::UserInterface;
use crate::core::run_log::LogEntry;
use crate::domain::WorkflowError;

/// Console implementation of the user interface, using dialoguer for
/// prompts and console styling for message kinds.
pub struct ConsoleUi;

impl Default for ConsoleUi {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleUi {
    pub fn new() -> Self {
        Self
    }
}

impl UserInterface for ConsoleUi {
    fn header(&self, title: &str) {
        let rule = "=".repeat(60);
        println!();
        println!("{}", style(&rule).bold().magenta());
        println!("{}", style(format!("  {}", title)).bold().magenta());
        println!("{}", style(&rule).bold().magenta());
    }

    fn info(&self, message: &str) {
        println!("{} {}", style("i").cyan(), message);
    }

    fn warn(&self, message: &str) {
        println!("{} {}", style("!").yellow().bold(), style(message).yellow());
    }

    fn error(&self, message: &str) {
        eprintln!("{} {}", style("x").red().bold(), style(message).red());
    }

    fn success(&self, message: &str) {
        println!("{} {}", style("+").green().bold(), message);
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        let answer = Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact_opt()
            .map_err(prompt_error)?;
        answer.ok_or_else(|| WorkflowError::Aborted.into())
    }

    fn choose(&self, prompt: &str, options: &[String]) -> Result<usize> {
        let selection = Select::new()
            .with_prompt(prompt)
            .items(options)
            .default(0)
            .interact_opt()
            .map_err(prompt_error)?;
        selection.ok_or_else(|| WorkflowError::Aborted.into())
    }

    fn wait(&self, prompt: &str) -> Result<()> {
        print!("{} ", style(prompt).dim());
        io::stdout().flush().ok();

        let mut line = String::new();
        let read = io::stdin().read_line(&mut line)?;
        if read == 0 {
            // Closed stdin means the user is gone.
            return Err(WorkflowError::Aborted.into());
        }
        Ok(())
    }

    fn show_log(&self, entries: &[LogEntry]) {
        if entries.is_empty() {
            println!("No log entries yet");
            return;
        }
        for entry in entries {
            println!(
                "[{}] [{}] {}",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.severity,
                entry.message
            );
        }
    }
}

/// Escape and closed-terminal conditions end the run instead of crashing it.
fn prompt_error(err: dialoguer::Error) -> anyhow::Error {
    match err {
        dialoguer::Error::IO(io_err)
            if io_err.kind() == io::ErrorKind::UnexpectedEof
                || io_err.kind() == io::ErrorKind::NotConnected =>
        {
            WorkflowError::Aborted.into()
        }
        other => other.into(),
    }
}
