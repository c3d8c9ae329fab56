// Copyright (c) The phpunit-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Spawning and supervising PHPUnit processes.
//!
//! Output is streamed as [`RunnerEventKind::StdoutChunk`] and
//! [`RunnerEventKind::StderrChunk`] events while the process runs, with
//! stdout additionally accumulated for report diagnostics. Cancellation
//! kills the process and still waits for it to be reaped.

use crate::{
    cancel::Cancelable,
    errors::RunError,
    events::{EventSender, RunnerEventKind},
};
use camino::Utf8PathBuf;
use std::process::Stdio;
use tokio::{
    io::AsyncReadExt,
    process::Command,
    sync::oneshot,
};
use tracing::debug;

/// PHPUnit's own exit codes: 0 success, 1 failures, 2 errors. Anything
/// above that is an environment fault, not a test outcome.
const MAX_RUNNER_EXIT_CODE: i32 = 2;

/// The outcome of a finished runner process.
#[derive(Clone, Debug)]
pub struct ProcessOutput {
    /// The process exit code, `-1` if the process died to a signal.
    pub exit_code: i32,
    /// The rendered command line that was executed.
    pub command_line: String,
    /// Everything the process wrote to standard output.
    pub stdout: String,
}

impl ProcessOutput {
    /// Whether the exit code is within PHPUnit's own range, meaning the
    /// runner completed and wrote its reports.
    pub fn completed(&self) -> bool {
        (0..=MAX_RUNNER_EXIT_CODE).contains(&self.exit_code)
    }

    /// Converts the output into an error if the exit code indicates an
    /// environment fault rather than a test outcome.
    pub fn into_completed(self) -> Result<Self, RunError> {
        if self.completed() {
            Ok(self)
        } else {
            Err(RunError::RunnerFault {
                exit_code: self.exit_code,
                command_line: self.command_line,
                stdout: self.stdout,
            })
        }
    }
}

/// Spawns runner processes and streams their output as events.
#[derive(Clone, Debug)]
pub struct ProcessRunner {
    events: EventSender,
}

impl ProcessRunner {
    /// Creates a runner that reports through `events`.
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }

    /// Spawns `argv` and supervises it to completion.
    ///
    /// Cancelling the returned computation kills the process; the
    /// computation still waits until the child has been reaped before it
    /// settles.
    pub fn spawn(&self, argv: Vec<String>, cwd: Option<Utf8PathBuf>) -> Cancelable<ProcessOutput> {
        let command_line = shell_words::join(&argv);
        self.events.send(RunnerEventKind::CommandLine {
            command_line: command_line.clone(),
        });
        debug!(command = %command_line, "spawning runner process");

        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &cwd {
            command.current_dir(cwd);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                return Cancelable::from_result(Err(RunError::Spawn {
                    command_line,
                    source: err,
                }));
            }
        };

        let (kill_tx, mut kill_rx) = oneshot::channel::<()>();
        let events = self.events.clone();

        let supervise = async move {
            // The streams exist: both were requested as piped above.
            let mut stdout = child.stdout.take();
            let mut stderr = child.stderr.take();
            // Captured as raw bytes and decoded once at the end: a read
            // boundary can split a multibyte character, and per-read lossy
            // decoding would corrupt it into replacement characters.
            let mut captured_stdout = Vec::new();
            let mut out_buf = [0u8; 4096];
            let mut err_buf = [0u8; 4096];
            let mut out_done = stdout.is_none();
            let mut err_done = stderr.is_none();
            let mut kill_requested = false;

            while !(out_done && err_done) {
                tokio::select! {
                    read = read_some(&mut stdout, &mut out_buf), if !out_done => {
                        match read {
                            Some(n) => {
                                captured_stdout.extend_from_slice(&out_buf[..n]);
                                events.send(RunnerEventKind::StdoutChunk {
                                    chunk: String::from_utf8_lossy(&out_buf[..n]).into_owned(),
                                });
                            }
                            None => out_done = true,
                        }
                    }
                    read = read_some(&mut stderr, &mut err_buf), if !err_done => {
                        match read {
                            Some(n) => {
                                events.send(RunnerEventKind::StderrChunk {
                                    chunk: String::from_utf8_lossy(&err_buf[..n]).into_owned(),
                                });
                            }
                            None => err_done = true,
                        }
                    }
                    res = &mut kill_rx, if !kill_requested => {
                        kill_requested = true;
                        // A dropped sender is not a cancellation request.
                        if res.is_ok() {
                            let _ = child.start_kill();
                        }
                    }
                }
            }

            let status = loop {
                tokio::select! {
                    status = child.wait() => {
                        break status.map_err(|err| RunError::Wait {
                            command_line: command_line.clone(),
                            source: err,
                        })?;
                    }
                    res = &mut kill_rx, if !kill_requested => {
                        kill_requested = true;
                        if res.is_ok() {
                            let _ = child.start_kill();
                        }
                    }
                }
            };

            let exit_code = status.code().unwrap_or(-1);
            debug!(exit_code, "runner process exited");
            Ok(ProcessOutput {
                exit_code,
                command_line,
                stdout: String::from_utf8_lossy(&captured_stdout).into_owned(),
            })
        };

        Cancelable::new(supervise, move || {
            let _ = kill_tx.send(());
        })
    }
}

/// Reads into `buf` from an optional child stream, returning the byte
/// count. `None` means end of stream or read failure; output streaming is
/// best-effort.
async fn read_some<R: AsyncReadExt + Unpin>(
    stream: &mut Option<R>,
    buf: &mut [u8],
) -> Option<usize> {
    let reader = stream.as_mut()?;
    match reader.read(buf).await {
        Ok(0) | Err(_) => None,
        Ok(n) => Some(n),
    }
}
