// Copyright (c) The phpunit-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run lifecycle events.
//!
//! Events are produced by the
//! [`RunOrchestrator`](crate::orchestrator::RunOrchestrator) and consumed
//! by any presentation layer; no return values are expected from
//! subscribers. The sender is handed to components explicitly, never
//! reached for through ambient state.

use chrono::{DateTime, FixedOffset, Local};
use phpunit_report::CaseState;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// A run lifecycle event.
#[derive(Clone, Debug)]
pub struct RunnerEvent {
    /// The time at which the event was generated, including the offset
    /// from UTC.
    pub timestamp: DateTime<FixedOffset>,

    /// The kind of event this is.
    pub kind: RunnerEventKind,
}

/// The kind of run lifecycle event.
///
/// Forms part of [`RunnerEvent`].
#[derive(Clone, Debug)]
pub enum RunnerEventKind {
    /// A batch of unit runs started.
    ///
    /// Only emitted when more than one unit is queued; a single-unit run
    /// carries no batch bracket.
    BatchStarted {
        /// The number of units in the batch.
        total_units: usize,
    },

    /// A batch of unit runs reached a terminal state: completed, failed,
    /// or cancelled. Always pairs with a preceding [`BatchStarted`].
    ///
    /// [`BatchStarted`]: RunnerEventKind::BatchStarted
    BatchFinished {
        /// The number of units in the batch.
        total_units: usize,
    },

    /// A single unit run started.
    UnitStarted {
        /// A short description of what is being run.
        label: String,
        /// The zero-based position of the unit within its batch.
        index: usize,
        /// The number of units in the batch.
        total: usize,
    },

    /// A single unit run completed and its reports were reconciled.
    UnitFinished {
        /// A short description of what was run.
        label: String,
        /// The zero-based position of the unit within its batch.
        index: usize,
        /// The number of units in the batch.
        total: usize,
        /// The worst severity among the unit's cases.
        state: CaseState,
    },

    /// The run was cancelled by the user. Terminal, and not a failure.
    RunCancelled,

    /// The command line about to be executed.
    CommandLine {
        /// The rendered command line.
        command_line: String,
    },

    /// A chunk of runner process standard output.
    StdoutChunk {
        /// The chunk text, lossily decoded.
        chunk: String,
    },

    /// A chunk of runner process standard error.
    StderrChunk {
        /// The chunk text, lossily decoded.
        chunk: String,
    },
}

/// A cloneable sender for [`RunnerEvent`]s that stamps timestamps.
#[derive(Clone, Debug)]
pub struct EventSender {
    sender: UnboundedSender<RunnerEvent>,
}

impl EventSender {
    /// Sends an event. A missing receiver is not an error: runs proceed
    /// whether or not anybody is listening.
    pub fn send(&self, kind: RunnerEventKind) {
        let event = RunnerEvent {
            timestamp: Local::now().fixed_offset(),
            kind,
        };
        let _ = self.sender.send(event);
    }
}

/// Creates an event channel: a sender for the orchestrator and a receiver
/// for the presentation layer.
pub fn event_channel() -> (EventSender, UnboundedReceiver<RunnerEvent>) {
    let (sender, receiver) = unbounded_channel();
    (EventSender { sender }, receiver)
}
