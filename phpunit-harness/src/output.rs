// Copyright (c) The phpunit-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal rendering of runner events and run summaries.

use owo_colors::OwoColorize;
use phpunit_report::{CaseState, CoverageReport, RunTotals};
use phpunit_runner::events::{RunnerEvent, RunnerEventKind};
use std::io::Write;

/// Renders one lifecycle event.
///
/// Process stdout passes through verbatim on stdout; everything the
/// harness itself says goes to stderr, so report-consuming pipelines see
/// only PHPUnit's own output.
pub(crate) fn render_event(event: RunnerEvent) {
    match event.kind {
        RunnerEventKind::CommandLine { command_line } => {
            eprintln!("{}", format!("$ {command_line}").dimmed());
        }
        RunnerEventKind::StdoutChunk { chunk } => {
            print!("{chunk}");
            let _ = std::io::stdout().flush();
        }
        RunnerEventKind::StderrChunk { chunk } => {
            eprint!("{chunk}");
        }
        RunnerEventKind::BatchStarted { total_units } => {
            eprintln!("{}", format!("running {total_units} suites").bold());
        }
        RunnerEventKind::BatchFinished { total_units } => {
            eprintln!("{}", format!("finished {total_units} suites").bold());
        }
        RunnerEventKind::UnitStarted { label, index, total } => {
            if total > 1 {
                eprintln!("{}", format!("[{}/{total}] {label}", index + 1).dimmed());
            }
        }
        RunnerEventKind::UnitFinished { label, state, .. } => {
            eprintln!("{} {label}", state_label(state));
        }
        RunnerEventKind::RunCancelled => {
            eprintln!("{}", "run cancelled".yellow().bold());
        }
    }
}

/// Prints the end-of-run summary.
pub(crate) fn render_summary(totals: &RunTotals, coverage: Option<&CoverageReport>) {
    let states = totals
        .contained_states()
        .iter()
        .map(|state| {
            let count = totals.state_counts.get(state).copied().unwrap_or(0);
            format!("{count} {}", state.as_str())
        })
        .collect::<Vec<_>>()
        .join(", ");
    let states = if states.is_empty() {
        "no tests".to_owned()
    } else {
        states
    };
    eprintln!(
        "{} {} tests, {} assertions ({}) in {:.3}s",
        state_label(totals.worst_state()),
        totals.cases,
        totals.assertions,
        states,
        totals.time.as_secs_f64(),
    );
    if let Some(coverage) = coverage {
        eprintln!(
            "    coverage: {}% ({}/{} statements)",
            coverage.percentage(),
            coverage.covered_statements,
            coverage.total_statements,
        );
    }
}

fn state_label(state: CaseState) -> String {
    let text = state.as_str();
    match state {
        CaseState::Passed => format!("{}", text.green().bold()),
        CaseState::Skipped => format!("{}", text.dimmed()),
        CaseState::Warning => format!("{}", text.yellow().bold()),
        CaseState::Failure | CaseState::Error => format!("{}", text.red().bold()),
    }
}
