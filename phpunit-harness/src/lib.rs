// Copyright (c) The phpunit-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A terminal harness for PHPUnit: runs suites, groups, or individual
//! classes and methods, streams runner output, and keeps merged test and
//! coverage reports for the session.

mod dispatch;
mod output;

pub use dispatch::PhpUnitApp;
