// Copyright (c) The phpunit-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced while orchestrating test runs.

use camino::Utf8PathBuf;
use phpunit_report::{CloverParseError, JunitParseError};
use std::io;
use thiserror::Error;

/// An error produced by a test run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunError {
    /// A run was requested while another run was in progress.
    #[error("a test run is already in progress")]
    Busy,

    /// The run was cancelled by the user.
    ///
    /// This is a sentinel, not a fault: consumers must never surface it as
    /// an error notification.
    #[error("test run cancelled")]
    Cancelled,

    /// The runner process could not be spawned.
    #[error("failed to spawn `{command_line}`")]
    Spawn {
        /// The rendered command line.
        command_line: String,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// Waiting on the runner process failed.
    #[error("failed to wait for `{command_line}`")]
    Wait {
        /// The rendered command line.
        command_line: String,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The runner process exited with a code outside the accepted 0–2
    /// range, which PHPUnit never does on its own.
    #[error("test runner exited with code {exit_code}: `{command_line}`")]
    RunnerFault {
        /// The unexpected exit code.
        exit_code: i32,
        /// The rendered command line.
        command_line: String,
        /// Everything the process wrote to standard output.
        stdout: String,
    },

    /// The report directory could not be created before the run.
    #[error("failed to create report directory `{path}`")]
    ReportDir {
        /// The directory path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// A report file was missing or unreadable after an otherwise
    /// successful run.
    #[error("failed to read report file `{path}`")]
    ReportRead {
        /// The report file path.
        path: Utf8PathBuf,
        /// The captured process stdout, for diagnostics.
        stdout: String,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The JUnit report did not parse.
    #[error("error parsing JUnit report")]
    Junit(#[from] JunitParseError),

    /// The Clover coverage report did not parse.
    #[error("error parsing Clover coverage report")]
    Clover(#[from] CloverParseError),

    /// A query against the PHP class index failed.
    #[error("PHP index query failed")]
    Index(#[from] IndexError),

    /// A file-based run target contained no runnable test classes.
    #[error("no test classes found in `{path}`")]
    NoTests {
        /// The file that was inspected.
        path: Utf8PathBuf,
    },

    /// A class-based run target was not known to the index.
    #[error("class `{fqcn}` not found in the PHP index")]
    UnknownClass {
        /// The fully qualified class name.
        fqcn: String,
    },

    /// A method-based run target was not present on its class.
    #[error("method `{method}` not found on class `{fqcn}`")]
    UnknownMethod {
        /// The fully qualified class name.
        fqcn: String,
        /// The method name.
        method: String,
    },
}

impl RunError {
    /// Whether this error is the user-cancellation sentinel.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Cancelled)
    }
}

/// An error produced while loading project configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigReadError {
    /// The configuration file existed but could not be read.
    #[error("failed to read config at `{path}`")]
    Read {
        /// The configuration file path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The configuration file did not parse as TOML.
    #[error("failed to parse config at `{path}`")]
    Parse {
        /// The configuration file path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        source: toml::de::Error,
    },
}

/// An error produced while clearing retained report files.
#[derive(Debug, Error)]
#[error("failed to delete report file `{path}`")]
pub struct ClearError {
    /// The report file path.
    pub path: Utf8PathBuf,
    /// The underlying error.
    #[source]
    pub source: io::Error,
}

/// An error produced by a [`PhpIndex`](crate::index::PhpIndex)
/// implementation.
#[derive(Clone, Debug, Error)]
#[error("index query failed: {message}")]
pub struct IndexError {
    /// A human-readable description of the failure.
    pub message: String,
}

impl IndexError {
    /// Creates a new `IndexError`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
