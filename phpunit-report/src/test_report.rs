// Copyright (c) The phpunit-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test report model: suites, cases and their outcomes.

use camino::Utf8PathBuf;
use indexmap::map::IndexMap;
use std::{collections::BTreeMap, fmt, time::Duration};

/// The outcome of a single test case, ordered by severity.
///
/// The derived `Ord` follows the declaration order, so
/// `CaseState::Warning.max(CaseState::Error)` is `CaseState::Error`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum CaseState {
    /// The case ran and passed.
    Passed,
    /// The case was skipped or marked incomplete.
    Skipped,
    /// The case passed but raised a warning.
    Warning,
    /// An assertion failed.
    Failure,
    /// The case aborted with an unexpected error.
    Error,
}

impl CaseState {
    /// Maps a JUnit result element name to the state it represents.
    ///
    /// `passed` has no element: a case with no result child is passing.
    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"skipped" => Some(CaseState::Skipped),
            b"warning" => Some(CaseState::Warning),
            b"failure" => Some(CaseState::Failure),
            b"error" => Some(CaseState::Error),
            _ => None,
        }
    }

    /// Returns the lowercase name of this state.
    pub fn as_str(self) -> &'static str {
        match self {
            CaseState::Passed => "passed",
            CaseState::Skipped => "skipped",
            CaseState::Warning => "warning",
            CaseState::Failure => "failure",
            CaseState::Error => "error",
        }
    }
}

impl fmt::Display for CaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document-wide totals, accumulated once per parsed report.
///
/// These exist so cross-run statistics never require re-walking the suite
/// tree.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunTotals {
    /// The total number of cases recorded.
    pub cases: usize,

    /// The sum of per-case assertion counts.
    pub assertions: u64,

    /// The sum of per-case wall-clock times.
    pub time: Duration,

    /// How often each severity state occurred.
    pub state_counts: BTreeMap<CaseState, usize>,
}

impl RunTotals {
    pub(crate) fn record_case(&mut self, case: &CaseReport) {
        self.cases += 1;
        self.assertions += case.assertions;
        self.time += case.time;
        *self.state_counts.entry(case.state).or_insert(0) += 1;
    }

    /// Folds another set of totals into this one.
    pub fn absorb(&mut self, other: RunTotals) {
        self.cases += other.cases;
        self.assertions += other.assertions;
        self.time += other.time;
        for (state, count) in other.state_counts {
            *self.state_counts.entry(state).or_insert(0) += count;
        }
    }

    /// The distinct states that occurred, in ascending severity order.
    pub fn contained_states(&self) -> Vec<CaseState> {
        self.state_counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(state, _)| *state)
            .collect()
    }

    /// The most severe state that occurred, `Passed` if nothing was recorded.
    pub fn worst_state(&self) -> CaseState {
        self.state_counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(state, _)| *state)
            .max()
            .unwrap_or(CaseState::Passed)
    }
}

/// One stack trace entry attached to an [`ErrorReport`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TraceFrame {
    /// The source file the frame points at.
    pub file: Utf8PathBuf,

    /// The 1-based line number within that file.
    pub line: u64,

    /// The frame as it appeared in the detail text.
    pub text: String,
}

/// A failure, error, warning or skip recorded against a test case.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ErrorReport {
    /// Which severity this entry represents.
    pub kind: CaseState,

    /// The `type` attribute of the result element, typically the PHP
    /// exception class.
    pub ty: Option<String>,

    /// The short message attribute.
    pub message: String,

    /// The full detail text of the result element.
    pub detail: String,

    /// Stack trace entries recognized in the detail text.
    pub trace: Vec<TraceFrame>,
}

impl ErrorReport {
    /// Creates a new `ErrorReport`, extracting `file:line` trace entries
    /// from the detail text.
    pub fn new(kind: CaseState, message: impl Into<String>, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let trace = parse_trace(&detail);
        Self {
            kind,
            ty: None,
            message: message.into(),
            detail,
            trace,
        }
    }

    /// Sets the type of this entry.
    pub fn set_type(&mut self, ty: impl Into<String>) -> &mut Self {
        self.ty = Some(ty.into());
        self
    }
}

// PHPUnit appends the failure location to the detail text as bare
// `path:line` lines.
fn parse_trace(detail: &str) -> Vec<TraceFrame> {
    detail
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (file, num) = line.rsplit_once(':')?;
            let num: u64 = num.parse().ok()?;
            if file.is_empty() || !(file.contains('/') || file.contains('\\')) {
                return None;
            }
            Some(TraceFrame {
                file: Utf8PathBuf::from(file),
                line: num,
                text: line.to_owned(),
            })
        })
        .collect()
}

/// A single test method execution result.
#[derive(Clone, Debug, PartialEq)]
pub struct CaseReport {
    /// The test method name.
    pub name: String,

    /// The name of the suite (the declaring test class) this case belongs to.
    pub suite_name: String,

    /// The source file the test method lives in.
    pub file: Option<Utf8PathBuf>,

    /// The 1-based source line of the test method.
    pub line: Option<u64>,

    /// Wall-clock time spent executing the case.
    pub time: Duration,

    /// The number of assertions the case performed.
    pub assertions: u64,

    /// The severity state of the case.
    pub state: CaseState,

    /// Output the case wrote to standard output, if captured.
    pub system_out: Option<String>,

    /// Failures, errors, warnings and skips recorded against the case.
    pub errors: Vec<ErrorReport>,
}

impl CaseReport {
    /// Creates a new passing `CaseReport` with no recorded data.
    pub fn new(name: impl Into<String>, suite_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            suite_name: suite_name.into(),
            file: None,
            line: None,
            time: Duration::ZERO,
            assertions: 0,
            state: CaseState::Passed,
            system_out: None,
            errors: Vec::new(),
        }
    }
}

/// A named grouping of test cases, corresponding to a PHP test class.
#[derive(Clone, Debug, PartialEq)]
pub struct SuiteReport {
    /// The suite name (the fully qualified test class name).
    pub name: String,

    /// The source file the suite's first case was declared in.
    pub file: Option<Utf8PathBuf>,

    /// The aggregate time across the suite's cases.
    pub time: Duration,

    /// The aggregate assertion count across the suite's cases.
    pub assertions: u64,

    /// The worst severity among the suite's cases.
    pub state: CaseState,

    cases: IndexMap<String, CaseReport>,
}

impl SuiteReport {
    /// Creates a new, empty `SuiteReport`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file: None,
            time: Duration::ZERO,
            assertions: 0,
            state: CaseState::Passed,
            cases: IndexMap::new(),
        }
    }

    /// Adds a case and updates the suite aggregates.
    ///
    /// Re-adding a case whose name is already present is a silent no-op
    /// (first occurrence wins); the discarded case contributes nothing to
    /// the aggregates. Returns whether the case was inserted.
    pub fn add_case(&mut self, case: CaseReport) -> bool {
        if self.cases.contains_key(&case.name) {
            return false;
        }
        if self.file.is_none() {
            self.file = case.file.clone();
        }
        self.time += case.time;
        self.assertions += case.assertions;
        self.state = self.state.max(case.state);
        self.cases.insert(case.name.clone(), case);
        true
    }

    /// Looks up a case by name.
    pub fn case(&self, name: &str) -> Option<&CaseReport> {
        self.cases.get(name)
    }

    /// Iterates over the cases in insertion order.
    pub fn cases(&self) -> impl Iterator<Item = &CaseReport> {
        self.cases.values()
    }

    /// The number of cases in the suite.
    pub fn case_count(&self) -> usize {
        self.cases.len()
    }

    /// Folds another suite's cases into this one.
    ///
    /// The donor is consumed; name collisions keep this suite's case, and
    /// the aggregates only reflect surviving cases.
    pub fn merge_from(&mut self, donor: SuiteReport) {
        for case in donor.cases.into_values() {
            self.add_case(case);
        }
    }
}

/// The raw result of the process run that produced a report, attached for
/// diagnostics.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunMeta {
    /// The process exit code.
    pub exit_code: i32,

    /// The rendered command line that was executed.
    pub command_line: String,

    /// Everything the process wrote to standard output.
    pub captured_stdout: String,
}

/// A whole-project test report: every suite of one or more runs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TestReport {
    suites: IndexMap<String, SuiteReport>,

    /// Document-wide totals for the report.
    pub totals: RunTotals,

    /// The process result of the most recent run folded into this report.
    pub run_meta: Option<RunMeta>,
}

impl TestReport {
    /// Creates a new, empty `TestReport`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a case, creating its suite on first sight, and records it in
    /// the document totals.
    pub fn add_case(&mut self, case: CaseReport) {
        self.totals.record_case(&case);
        let suite = self
            .suites
            .entry(case.suite_name.clone())
            .or_insert_with(|| SuiteReport::new(case.suite_name.clone()));
        suite.add_case(case);
    }

    /// Looks up a suite by name.
    pub fn suite(&self, name: &str) -> Option<&SuiteReport> {
        self.suites.get(name)
    }

    /// Iterates over the suites in insertion order.
    pub fn suites(&self) -> impl Iterator<Item = &SuiteReport> {
        self.suites.values()
    }

    /// The number of suites in the report.
    pub fn suite_count(&self) -> usize {
        self.suites.len()
    }

    /// The worst severity across all suites, `Passed` when empty.
    pub fn state(&self) -> CaseState {
        self.suites
            .values()
            .map(|suite| suite.state)
            .max()
            .unwrap_or(CaseState::Passed)
    }

    /// Folds another report into this one, keyed by suite name then case
    /// name.
    ///
    /// The donor is consumed, so merging a report into itself or reusing a
    /// merged-from report is a compile error rather than a runtime hazard.
    pub fn merge_from(&mut self, donor: TestReport) {
        for suite in donor.suites.into_values() {
            match self.suites.get_mut(&suite.name) {
                Some(existing) => existing.merge_from(suite),
                None => {
                    self.suites.insert(suite.name.clone(), suite);
                }
            }
        }
        self.totals.absorb(donor.totals);
        if donor.run_meta.is_some() {
            self.run_meta = donor.run_meta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn case(name: &str, suite: &str, state: CaseState) -> CaseReport {
        let mut case = CaseReport::new(name, suite);
        case.state = state;
        case.assertions = 1;
        case.time = Duration::from_millis(2);
        case
    }

    #[test_case(CaseState::Warning, CaseState::Error, CaseState::Error; "warning vs error")]
    #[test_case(CaseState::Skipped, CaseState::Passed, CaseState::Skipped; "skipped vs passed")]
    #[test_case(CaseState::Failure, CaseState::Failure, CaseState::Failure; "failure vs failure")]
    #[test_case(CaseState::Passed, CaseState::Warning, CaseState::Warning; "passed vs warning")]
    fn severity_is_a_total_order(a: CaseState, b: CaseState, expected: CaseState) {
        assert_eq!(a.max(b), expected);
        assert_eq!(b.max(a), expected);
    }

    #[test]
    fn first_case_wins_within_a_suite() {
        let mut suite = SuiteReport::new("MathTest");
        assert!(suite.add_case(case("testFoo", "MathTest", CaseState::Passed)));
        assert!(!suite.add_case(case("testFoo", "MathTest", CaseState::Error)));

        assert_eq!(suite.case_count(), 1);
        assert_eq!(suite.state, CaseState::Passed);
        // The discarded duplicate contributes nothing to the aggregates.
        assert_eq!(suite.assertions, 1);
    }

    #[test]
    fn suite_merge_keeps_first_seen_case_and_recomputes_state() {
        let mut first = SuiteReport::new("MathTest");
        first.add_case(case("testFoo", "MathTest", CaseState::Passed));

        let mut second = SuiteReport::new("MathTest");
        second.add_case(case("testFoo", "MathTest", CaseState::Error));

        first.merge_from(second);
        assert_eq!(first.case("testFoo").map(|c| c.state), Some(CaseState::Passed));
        // No surviving case carries `error`, so the suite must not either.
        assert_eq!(first.state, CaseState::Passed);
    }

    #[test]
    fn suite_merge_state_reflects_surviving_error_cases() {
        let mut first = SuiteReport::new("MathTest");
        first.add_case(case("testFoo", "MathTest", CaseState::Passed));

        let mut second = SuiteReport::new("MathTest");
        second.add_case(case("testFoo", "MathTest", CaseState::Error));
        second.add_case(case("testBar", "MathTest", CaseState::Error));

        first.merge_from(second);
        assert_eq!(first.case("testFoo").map(|c| c.state), Some(CaseState::Passed));
        assert_eq!(first.state, CaseState::Error);
    }

    #[test]
    fn report_merge_sums_totals_and_unions_histograms() {
        let mut first = TestReport::new();
        first.add_case(case("testFoo", "MathTest", CaseState::Passed));

        let mut second = TestReport::new();
        second.add_case(case("testBar", "StringTest", CaseState::Failure));
        second.add_case(case("testBaz", "StringTest", CaseState::Passed));

        first.merge_from(second);
        assert_eq!(first.suite_count(), 2);
        assert_eq!(first.totals.cases, 3);
        assert_eq!(first.totals.assertions, 3);
        assert_eq!(first.totals.state_counts[&CaseState::Passed], 2);
        assert_eq!(first.totals.state_counts[&CaseState::Failure], 1);
        assert_eq!(first.state(), CaseState::Failure);
    }

    #[test]
    fn contained_states_are_in_ascending_severity_order() {
        let mut totals = RunTotals::default();
        totals.record_case(&case("a", "S", CaseState::Error));
        totals.record_case(&case("b", "S", CaseState::Passed));
        totals.record_case(&case("c", "S", CaseState::Skipped));

        assert_eq!(
            totals.contained_states(),
            vec![CaseState::Passed, CaseState::Skipped, CaseState::Error]
        );
        assert_eq!(totals.worst_state(), CaseState::Error);
    }

    #[test]
    fn trace_frames_come_from_path_like_detail_lines() {
        let report = ErrorReport::new(
            CaseState::Failure,
            "assertion failed",
            "Failed asserting that false is true.\n\n/src/tests/MathTest.php:19",
        );
        assert_eq!(
            report.trace,
            vec![TraceFrame {
                file: "/src/tests/MathTest.php".into(),
                line: 19,
                text: "/src/tests/MathTest.php:19".to_owned(),
            }]
        );
    }
}
