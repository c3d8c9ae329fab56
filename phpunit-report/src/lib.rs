// Copyright (c) The phpunit-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read and combine PHPUnit reports in Rust.
//!
//! PHPUnit writes two XML artifacts per run: a JUnit-style test report
//! (`--log-junit`) and a Clover-style coverage report
//! (`--coverage-clover`). This crate parses both into an in-memory model
//! and knows how to fold the reports of successive runs into one
//! accumulated view.

mod clover;
mod coverage;
mod errors;
mod junit;
mod test_report;

pub use clover::*;
pub use coverage::*;
pub use errors::*;
pub use junit::*;
pub use test_report::*;
