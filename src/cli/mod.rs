//! Command-line interface.
//!
//! Three modes: `--auto` runs the full sequence, `--validate` runs only the
//! precondition battery, and `--help` prints usage. With no mode flag an
//! interactive menu enumerates every step by label; selections are numeric,
//! and bad input re-shows the menu instead of crashing.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use console::style;

use crate::adapters::Toolbox;
use crate::config;
use crate::core::{Orchestrator, Plan};
use crate::domain::{Finding, OverwritePolicy, StepOutcome, StepResult, WorkflowError};

/// rigup - guided fetch/extract/checkpoint workflows
#[derive(Parser, Debug)]
#[command(name = "rigup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run the full step sequence, pausing only at manual checkpoints
    #[arg(long, conflicts_with = "validate")]
    pub auto: bool,

    /// Check environment preconditions and exit
    #[arg(long)]
    pub validate: bool,

    /// Workflow plan file (the built-in plan if omitted)
    #[arg(long)]
    pub plan: Option<PathBuf>,

    /// Workspace directory
    #[arg(long, env = "RIGUP_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// What to do when a fetched or extracted artifact already exists
    #[arg(long, value_enum, default_value_t = OverwriteArg::Ask)]
    pub overwrite: OverwriteArg,

    /// Workflow parameters as KEY=VALUE (e.g. channel=stable)
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OverwriteArg {
    /// Ask for each existing artifact
    Ask,
    /// Keep every existing artifact
    Keep,
    /// Replace every existing artifact
    Replace,
}

impl std::fmt::Display for OverwriteArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Ask => "ask",
            Self::Keep => "keep",
            Self::Replace => "replace",
        };
        f.write_str(label)
    }
}

impl From<OverwriteArg> for OverwritePolicy {
    fn from(arg: OverwriteArg) -> Self {
        match arg {
            OverwriteArg::Ask => OverwritePolicy::Ask,
            OverwriteArg::Keep => OverwritePolicy::Keep,
            OverwriteArg::Replace => OverwritePolicy::Replace,
        }
    }
}

impl Cli {
    /// Execute the selected mode.
    pub async fn execute(self) -> Result<()> {
        let plan = match &self.plan {
            Some(path) => Plan::from_file(path)?,
            None => Plan::builtin()?,
        };

        let workspace = config::resolve_workspace(self.workspace.clone())?;
        let mut orchestrator = Orchestrator::new(&plan, Toolbox::live(), workspace)?
            .with_overwrite(self.overwrite.into());

        for pair in &self.params {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                anyhow::anyhow!("invalid --param '{}', expected KEY=VALUE", pair)
            })?;
            orchestrator.set_param(key, value);
        }

        if self.validate {
            let findings = orchestrator.validate_preconditions().await;
            print_findings(&findings);
            return Ok(());
        }

        let outcome = if self.auto {
            run_auto(&mut orchestrator, &plan).await
        } else {
            menu_loop(&mut orchestrator, &plan).await
        };

        // A user abort is a graceful exit, not a fault.
        match outcome {
            Err(err) if WorkflowError::is_abort(&err) => Ok(()),
            other => other,
        }
    }
}

/// Run the full sequence after a precondition pass.
async fn run_auto(orchestrator: &mut Orchestrator, plan: &Plan) -> Result<()> {
    orchestrator.ui().header(&plan.name);
    println!("{}", plan.description);

    let findings = orchestrator.validate_preconditions().await;
    print_findings(&findings);

    if findings.iter().any(|f| !f.passed) {
        if !orchestrator
            .ui()
            .confirm("Some checks failed. Continue anyway?")?
        {
            return Ok(());
        }
    }

    let results = orchestrator.run_all().await;
    print_summary(&results, orchestrator.aborted());
    Ok(())
}

/// Interactive menu over the step catalog.
async fn menu_loop(orchestrator: &mut Orchestrator, plan: &Plan) -> Result<()> {
    loop {
        print_menu(orchestrator, plan);

        let Some(input) = read_selection()? else {
            // Closed stdin: leave quietly.
            return Ok(());
        };

        let step_count = orchestrator.registry().len();
        let selection: usize = match input.parse() {
            Ok(n) => n,
            Err(_) => {
                orchestrator
                    .ui()
                    .error(&format!("invalid selection '{}'", input));
                continue;
            }
        };

        match selection {
            n if (1..=step_count).contains(&n) => {
                let id = orchestrator.registry().ids()[n - 1].clone();
                orchestrator.run_step(&id).await;
            }
            n if n == step_count + 1 => {
                let results = orchestrator.run_all().await;
                print_summary(&results, orchestrator.aborted());
            }
            n if n == step_count + 2 => {
                let findings = orchestrator.validate_preconditions().await;
                print_findings(&findings);
            }
            n if n == step_count + 3 => {
                orchestrator.ui().show_log(&orchestrator.log().snapshot());
            }
            n if n == step_count + 4 => return Ok(()),
            _ => {
                orchestrator
                    .ui()
                    .error(&format!("invalid selection '{}'", input));
            }
        }

        if orchestrator.aborted() {
            return Ok(());
        }
    }
}

fn print_menu(orchestrator: &Orchestrator, plan: &Plan) {
    println!();
    println!("{}", style(&plan.name).bold());
    println!("Select an option:");
    println!();

    for step in orchestrator.registry().iter() {
        println!(
            "{:>3}. {} {}",
            step.ordinal + 1,
            step.label,
            style(format!("[{}]", step.category)).dim()
        );
    }

    let base = orchestrator.registry().len();
    println!("{:>3}. Run all steps", base + 1);
    println!("{:>3}. Check environment", base + 2);
    println!("{:>3}. View run log", base + 3);
    println!("{:>3}. Exit", base + 4);
    println!();
}

/// Read a menu selection. Returns `None` on closed stdin.
fn read_selection() -> Result<Option<String>> {
    print!("Enter choice: ");
    io::stdout().flush().ok();

    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn print_findings(findings: &[Finding]) {
    println!();
    for finding in findings {
        let mark = if finding.passed {
            style("PASS").green().bold()
        } else {
            style("FAIL").red().bold()
        };
        println!("{} {:<12} {}", mark, finding.check, finding.detail);
    }
    println!();
}

fn print_summary(results: &[StepResult], aborted: bool) {
    let count = |outcome: StepOutcome| results.iter().filter(|r| r.outcome == outcome).count();

    println!();
    println!(
        "{} succeeded, {} skipped, {} deferred, {} failed",
        count(StepOutcome::Success),
        count(StepOutcome::Skipped),
        count(StepOutcome::Deferred),
        count(StepOutcome::Failed),
    );
    if aborted {
        println!("Run ended early at the user's request");
    }
}
