// Copyright (c) The phpunit-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core run orchestration for [phpunit-harness](https://crates.io/crates/phpunit-harness).
//!
//! This crate owns the machinery between "the user asked for a test run"
//! and "a merged report is available": cancelable computations, a strictly
//! sequential test queue, the external PHPUnit process, filter and command
//! construction, lifecycle events, and the orchestrator that ties them
//! together. Report parsing and merging live in `phpunit-report`.

pub mod cancel;
pub mod command;
pub mod config;
pub mod errors;
pub mod events;
pub mod filter;
mod helpers;
pub mod index;
pub mod orchestrator;
pub mod process;
pub mod queue;
