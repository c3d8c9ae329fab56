// Copyright (c) The phpunit-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The run orchestrator.
//!
//! Ties the queue, the process runner, and the report parsers together:
//! a run target becomes one or more queued PHPUnit invocations, each
//! followed by a reconcile step that parses the report files the process
//! wrote and folds them into the retained session reports.

use crate::{
    cancel::Cancelable,
    command::PhpUnitCommand,
    config::ProjectConfig,
    errors::RunError,
    events::{EventSender, RunnerEventKind},
    filter::FilterSpec,
    helpers::lock,
    index::PhpIndex,
    process::{ProcessOutput, ProcessRunner},
    queue::TestQueue,
};
use camino::Utf8Path;
use phpunit_report::{
    CloverParser, CoverageReport, JunitParser, RunMeta, RunTotals, StaleLinePolicy, TestReport,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use tracing::debug;

/// What a run should cover.
#[derive(Clone, Debug)]
pub enum RunTarget {
    /// Everything the PHPUnit configuration declares.
    All,
    /// One invocation per named test suite.
    Suites(Vec<String>),
    /// A single invocation restricted to the named groups.
    Groups(Vec<String>),
    /// A single invocation restricted by a class/method filter.
    Filter(FilterSpec),
}

/// The terminal outcome of a run request.
#[derive(Clone, Debug)]
pub enum RunOutcome {
    /// Every queued invocation ran and reconciled.
    Completed(RunTotals),
    /// The run was cancelled before completing. Not a failure.
    Cancelled,
}

/// Reports retained across the runs of a session.
#[derive(Clone, Debug, Default)]
pub struct SessionReports {
    /// The merged test report, `None` before the first completed run.
    pub tests: Option<TestReport>,
    /// The merged coverage report, `None` until a coverage run completes.
    pub coverage: Option<CoverageReport>,
}

/// One queued PHPUnit invocation.
#[derive(Clone, Debug)]
struct RunUnit {
    label: String,
    testsuite: Option<String>,
    groups: Vec<String>,
    filter: Option<String>,
}

/// The shared state a queued unit needs, detached from the orchestrator's
/// lifetime so factories can be `'static`.
#[derive(Clone)]
struct RunContext {
    config: ProjectConfig,
    events: EventSender,
    session: Arc<Mutex<SessionReports>>,
    stale_lines: StaleLinePolicy,
}

/// Orchestrates PHPUnit runs for one project.
///
/// Single-flight: at most one run may be active; a second request fails
/// fast with [`RunError::Busy`] rather than queueing behind the first.
pub struct RunOrchestrator {
    ctx: RunContext,
    running: AtomicBool,
    active: Mutex<Option<TestQueue<RunTotals>>>,
}

impl RunOrchestrator {
    /// Creates an orchestrator for a configured project, reporting through
    /// `events`.
    pub fn new(config: ProjectConfig, events: EventSender) -> Self {
        Self {
            ctx: RunContext {
                config,
                events,
                session: Arc::new(Mutex::new(SessionReports::default())),
                stale_lines: StaleLinePolicy::default(),
            },
            running: AtomicBool::new(false),
            active: Mutex::new(None),
        }
    }

    /// Sets how merged coverage treats lines missing from newer reports.
    pub fn set_stale_line_policy(&mut self, policy: StaleLinePolicy) -> &mut Self {
        self.ctx.stale_lines = policy;
        self
    }

    /// The project configuration in effect.
    pub fn config(&self) -> &ProjectConfig {
        &self.ctx.config
    }

    /// A snapshot of the retained session reports.
    pub fn session(&self) -> SessionReports {
        lock(&self.ctx.session).clone()
    }

    /// The totals of the merged session test report, `None` before the
    /// first completed run.
    pub fn stats(&self) -> Option<RunTotals> {
        lock(&self.ctx.session)
            .tests
            .as_ref()
            .map(|report| report.totals.clone())
    }

    /// Runs the given target.
    ///
    /// Multiple suites queue one invocation each, bracketed by batch
    /// events; every other target is a single invocation. Completed
    /// invocations have their reports merged into the session before the
    /// next one starts.
    pub async fn run(&self, target: RunTarget) -> Result<RunOutcome, RunError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(RunError::Busy);
        }
        let result = self.run_inner(target).await;
        *lock(&self.active) = None;
        self.running.store(false, Ordering::Release);

        match result {
            Ok(totals) => Ok(RunOutcome::Completed(totals)),
            Err(err) if err.is_cancelled() => {
                self.ctx.events.send(RunnerEventKind::RunCancelled);
                Ok(RunOutcome::Cancelled)
            }
            Err(err) => Err(err),
        }
    }

    /// Runs every non-abstract test class declared in a file.
    pub async fn run_file(
        &self,
        index: &dyn PhpIndex,
        path: &Utf8Path,
    ) -> Result<RunOutcome, RunError> {
        let classes = index.classes_in_file(path)?;
        let mut spec = FilterSpec::new();
        for class in classes.iter().filter(|class| !class.is_abstract) {
            spec.add_class(class.fqcn());
        }
        if spec.is_empty() {
            return Err(RunError::NoTests {
                path: path.to_owned(),
            });
        }
        self.run(RunTarget::Filter(spec)).await
    }

    /// Runs a single test method of a class known to the index.
    pub async fn run_method(
        &self,
        index: &dyn PhpIndex,
        fqcn: &str,
        method: &str,
    ) -> Result<RunOutcome, RunError> {
        let class = index
            .class_detail(fqcn)?
            .ok_or_else(|| RunError::UnknownClass {
                fqcn: fqcn.to_owned(),
            })?;
        if class.method(method).is_none() {
            return Err(RunError::UnknownMethod {
                fqcn: fqcn.to_owned(),
                method: method.to_owned(),
            });
        }
        let mut spec = FilterSpec::new();
        spec.add_method(class.fqcn(), method);
        self.run(RunTarget::Filter(spec)).await
    }

    /// Cancels the active run, if any. Idempotent.
    pub fn cancel(&self) {
        let active = lock(&self.active).clone();
        if let Some(queue) = active {
            debug!("cancelling active run");
            queue.cancel();
        }
    }

    /// Drops the retained session reports and deletes the report files on
    /// disk. Files that are already gone are fine.
    pub async fn clear(&self) -> Result<(), crate::errors::ClearError> {
        *lock(&self.ctx.session) = SessionReports::default();
        for path in [
            self.ctx.config.junit_log_path(),
            self.ctx.config.clover_path(),
        ] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(crate::errors::ClearError { path, source: err });
                }
            }
        }
        Ok(())
    }

    async fn run_inner(&self, target: RunTarget) -> Result<RunTotals, RunError> {
        let report_dir = self.ctx.config.report_dir();
        tokio::fs::create_dir_all(&report_dir)
            .await
            .map_err(|source| RunError::ReportDir {
                path: report_dir,
                source,
            })?;

        let units = units_for(target);
        let total = units.len();
        let batch = total > 1;
        if batch {
            self.ctx
                .events
                .send(RunnerEventKind::BatchStarted { total_units: total });
        }

        let queue = TestQueue::new();
        *lock(&self.active) = Some(queue.clone());
        for (index, unit) in units.into_iter().enumerate() {
            let ctx = self.ctx.clone();
            queue.push(move || ctx.unit_computation(unit, index, total));
        }

        let result = queue.execute().await;
        // The bracket closes on every terminal path, failure and
        // cancellation included, so consumers never see it left open.
        if batch {
            self.ctx
                .events
                .send(RunnerEventKind::BatchFinished { total_units: total });
        }
        let results = result?;

        let mut totals = RunTotals::default();
        for unit_totals in results {
            totals.absorb(unit_totals);
        }
        Ok(totals)
    }
}

impl RunContext {
    fn unit_computation(self, unit: RunUnit, index: usize, total: usize) -> Cancelable<RunTotals> {
        self.events.send(RunnerEventKind::UnitStarted {
            label: unit.label.clone(),
            index,
            total,
        });
        let argv = self.command_for(&unit).build();
        let runner = ProcessRunner::new(self.events.clone());
        let cwd = self.config.root().to_owned();
        runner
            .spawn(argv, Some(cwd))
            .then(move |output| self.reconcile(output, unit, index, total))
    }

    fn command_for(&self, unit: &RunUnit) -> PhpUnitCommand {
        PhpUnitCommand {
            php_binary: self.config.php_binary.clone(),
            php_args: self.config.php_args.clone(),
            phpunit_binary: self.config.phpunit_binary.clone(),
            configuration: self.config.resolve(&self.config.configuration),
            junit_log: self.config.junit_log_path(),
            testsuites: unit.testsuite.iter().cloned().collect(),
            groups: unit.groups.clone(),
            filter: unit.filter.clone(),
            coverage_clover: self.config.coverage.then(|| self.config.clover_path()),
        }
    }

    async fn reconcile(
        self,
        output: ProcessOutput,
        unit: RunUnit,
        index: usize,
        total: usize,
    ) -> Result<RunTotals, RunError> {
        let output = output.into_completed()?;

        let junit_path = self.config.junit_log_path();
        let document =
            tokio::fs::read_to_string(&junit_path)
                .await
                .map_err(|source| RunError::ReportRead {
                    path: junit_path,
                    stdout: output.stdout.clone(),
                    source,
                })?;
        let mut parser = JunitParser::new();
        parser.set_document(document).set_run_meta(RunMeta {
            exit_code: output.exit_code,
            command_line: output.command_line.clone(),
            captured_stdout: output.stdout.clone(),
        });
        let report = parser.into_report()?;
        let totals = report.totals.clone();
        {
            let mut session = lock(&self.session);
            match &mut session.tests {
                Some(existing) => existing.merge_from(report),
                slot => *slot = Some(report),
            }
        }

        if self.config.coverage {
            let clover_path = self.config.clover_path();
            let document = tokio::fs::read_to_string(&clover_path).await.map_err(
                |source| RunError::ReportRead {
                    path: clover_path,
                    stdout: output.stdout.clone(),
                    source,
                },
            )?;
            let mut parser = CloverParser::new();
            parser.set_document(document);
            let coverage = parser.into_report()?;
            let mut session = lock(&self.session);
            match &mut session.coverage {
                Some(existing) => existing.merge_from(coverage, self.stale_lines),
                slot => *slot = Some(coverage),
            }
        }

        self.events.send(RunnerEventKind::UnitFinished {
            label: unit.label,
            index,
            total,
            state: totals.worst_state(),
        });
        Ok(totals)
    }
}

fn units_for(target: RunTarget) -> Vec<RunUnit> {
    match target {
        RunTarget::All => vec![RunUnit {
            label: "all tests".to_owned(),
            testsuite: None,
            groups: Vec::new(),
            filter: None,
        }],
        RunTarget::Suites(names) => names
            .into_iter()
            .map(|name| RunUnit {
                label: name.clone(),
                testsuite: Some(name),
                groups: Vec::new(),
                filter: None,
            })
            .collect(),
        RunTarget::Groups(groups) => vec![RunUnit {
            label: format!("groups {}", groups.join(",")),
            testsuite: None,
            groups,
            filter: None,
        }],
        RunTarget::Filter(spec) => {
            let filter = spec.to_regex();
            vec![RunUnit {
                label: filter.clone().unwrap_or_else(|| "all tests".to_owned()),
                testsuite: None,
                groups: Vec::new(),
                filter,
            }]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::IndexError,
        events::event_channel,
        index::{PhpClass, PhpMethod, SourceRange, Visibility},
    };
    use camino::Utf8PathBuf;
    use pretty_assertions::assert_eq;

    struct FixtureIndex {
        classes: Vec<PhpClass>,
    }

    impl PhpIndex for FixtureIndex {
        fn classes_in_file(&self, path: &Utf8Path) -> Result<Vec<PhpClass>, IndexError> {
            Ok(self
                .classes
                .iter()
                .filter(|class| class.file == path)
                .cloned()
                .collect())
        }

        fn class_detail(&self, fqcn: &str) -> Result<Option<PhpClass>, IndexError> {
            Ok(self.classes.iter().find(|c| c.fqcn() == fqcn).cloned())
        }

        fn reindex_file(&self, _path: &Utf8Path) -> Result<(), IndexError> {
            Ok(())
        }
    }

    fn fixture_class(name: &str, is_abstract: bool) -> PhpClass {
        PhpClass {
            name: name.to_owned(),
            namespace: Some(r"App\Tests".to_owned()),
            file: Utf8PathBuf::from("tests/MathTest.php"),
            is_abstract,
            range: SourceRange {
                start_line: 5,
                end_line: 60,
            },
            methods: vec![PhpMethod {
                name: "testAdd".to_owned(),
                visibility: Visibility::Public,
                is_abstract: false,
                is_static: false,
                range: SourceRange {
                    start_line: 10,
                    end_line: 14,
                },
            }],
        }
    }

    fn orchestrator() -> RunOrchestrator {
        let (events, _rx) = event_channel();
        RunOrchestrator::new(ProjectConfig::default(), events)
    }

    #[test]
    fn multiple_suites_become_one_unit_each() {
        let units = units_for(RunTarget::Suites(vec![
            "unit".to_owned(),
            "functional".to_owned(),
        ]));
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].testsuite.as_deref(), Some("unit"));
        assert_eq!(units[1].testsuite.as_deref(), Some("functional"));
    }

    #[test]
    fn groups_and_filters_are_single_units() {
        let units = units_for(RunTarget::Groups(vec!["fast".to_owned(), "db".to_owned()]));
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].groups, vec!["fast", "db"]);

        let mut spec = FilterSpec::new();
        spec.add_method("MathTest", "testAdd");
        let units = units_for(RunTarget::Filter(spec));
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].filter.as_deref(), Some("/MathTest::testAdd/"));
    }

    #[tokio::test]
    async fn run_file_rejects_files_without_concrete_classes() {
        let index = FixtureIndex {
            classes: vec![fixture_class("AbstractMathTest", true)],
        };
        let orch = orchestrator();
        let err = orch
            .run_file(&index, Utf8Path::new("tests/MathTest.php"))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::NoTests { .. }));
    }

    #[tokio::test]
    async fn run_method_rejects_unknown_classes_and_methods() {
        let index = FixtureIndex {
            classes: vec![fixture_class("MathTest", false)],
        };
        let orch = orchestrator();

        let err = orch
            .run_method(&index, r"App\Tests\NopeTest", "testAdd")
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::UnknownClass { .. }));

        let err = orch
            .run_method(&index, r"App\Tests\MathTest", "testNope")
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::UnknownMethod { .. }));
    }

    #[test]
    fn session_starts_empty() {
        let orch = orchestrator();
        let session = orch.session();
        assert!(session.tests.is_none());
        assert!(session.coverage.is_none());
        assert_eq!(orch.stats(), None);
    }
}
