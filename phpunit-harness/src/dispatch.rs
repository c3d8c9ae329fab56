// Copyright (c) The phpunit-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line argument parsing and dispatch.

use crate::output;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use phpunit_report::CaseState;
use phpunit_runner::{
    config::ProjectConfig,
    events::event_channel,
    filter::FilterSpec,
    orchestrator::{RunOrchestrator, RunOutcome, RunTarget},
};

/// A PHPUnit orchestration harness for the terminal.
#[derive(Debug, Parser)]
#[command(name = "phpunit-harness", version)]
pub struct PhpUnitApp {
    /// The PHP project root.
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    project: Utf8PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run tests and fold the reports into the session.
    Run(RunArgs),
    /// Delete retained report files.
    Clear,
}

#[derive(Debug, Args, Default)]
struct RunArgs {
    /// Run a named test suite. More than one runs a batch.
    #[arg(long = "suite", value_name = "NAME")]
    suites: Vec<String>,

    /// Restrict the run to a PHPUnit group.
    #[arg(long = "group", value_name = "NAME")]
    groups: Vec<String>,

    /// Run a test class or method (`Class` or `Class::method`). Takes
    /// precedence over suites and groups.
    #[arg(long = "filter", value_name = "TARGET")]
    filters: Vec<String>,

    /// Collect Clover coverage for this run.
    #[arg(long)]
    coverage: bool,
}

impl RunArgs {
    fn target(&self) -> RunTarget {
        if !self.filters.is_empty() {
            let mut spec = FilterSpec::new();
            for raw in &self.filters {
                match raw.split_once("::") {
                    Some((class, method)) => spec.add_method(class, method),
                    None => spec.add_class(raw.clone()),
                };
            }
            RunTarget::Filter(spec)
        } else if !self.suites.is_empty() {
            RunTarget::Suites(self.suites.clone())
        } else if !self.groups.is_empty() {
            RunTarget::Groups(self.groups.clone())
        } else {
            RunTarget::All
        }
    }
}

impl PhpUnitApp {
    /// Executes the parsed command, returning the process exit code.
    pub fn exec(self) -> Result<i32> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .wrap_err("failed to start the async runtime")?;
        runtime.block_on(self.exec_async())
    }

    async fn exec_async(self) -> Result<i32> {
        let config = ProjectConfig::load(self.project)
            .wrap_err("failed to load project configuration")?;
        match self.command {
            Command::Run(args) => run(config, args).await,
            Command::Clear => clear(config).await,
        }
    }
}

async fn run(mut config: ProjectConfig, args: RunArgs) -> Result<i32> {
    if args.coverage {
        config.coverage = true;
    }
    let target = args.target();

    let (events, mut rx) = event_channel();
    let orch = RunOrchestrator::new(config, events);

    let run = orch.run(target);
    tokio::pin!(run);
    let outcome = loop {
        tokio::select! {
            outcome = &mut run => break outcome?,
            Some(event) = rx.recv() => output::render_event(event),
            _ = tokio::signal::ctrl_c() => orch.cancel(),
        }
    };
    while let Ok(event) = rx.try_recv() {
        output::render_event(event);
    }

    match outcome {
        RunOutcome::Completed(totals) => {
            let session = orch.session();
            output::render_summary(&totals, session.coverage.as_ref());
            if totals.worst_state() >= CaseState::Failure {
                Ok(1)
            } else {
                Ok(0)
            }
        }
        RunOutcome::Cancelled => Ok(130),
    }
}

async fn clear(config: ProjectConfig) -> Result<i32> {
    let (events, _rx) = event_channel();
    let orch = RunOrchestrator::new(config, events);
    orch.clear().await.wrap_err("failed to clear reports")?;
    eprintln!("cleared retained reports");
    Ok(0)
}
