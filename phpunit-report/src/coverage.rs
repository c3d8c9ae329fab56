// Copyright (c) The phpunit-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The coverage report model: per-file line records and derived metrics.

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::map::IndexMap;
use std::collections::{btree_map, BTreeMap};

/// What kind of code a covered line represents.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum LineKind {
    /// The declaration line of a method.
    Method,
    /// An executable statement.
    Stmt,
}

/// Coverage data for a single source line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LineCoverage {
    /// The 1-based line number.
    pub line: u32,

    /// The kind of code on this line.
    pub kind: LineKind,

    /// Whether the line was executed at least once.
    pub covered: bool,

    /// How many times the line was executed.
    pub hit_count: u64,

    /// The method name, for `method` lines.
    pub name: Option<String>,
}

/// Metrics computed from a file's line records.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FileMetrics {
    /// The number of recorded lines.
    pub total_lines: usize,
    /// The number of recorded lines that were covered.
    pub covered_lines: usize,
    /// The number of method lines.
    pub total_methods: usize,
    /// The number of methods whose entire span was covered.
    pub covered_methods: usize,
    /// The number of statement lines.
    pub total_statements: usize,
    /// The number of covered statement lines.
    pub covered_statements: usize,
}

impl FileMetrics {
    /// Methods plus statements.
    pub fn total_elements(&self) -> usize {
        self.total_methods + self.total_statements
    }

    /// Covered methods plus covered statements.
    pub fn covered_elements(&self) -> usize {
        self.covered_methods + self.covered_statements
    }
}

/// How to reconcile line records when merging coverage for the same file.
///
/// Some PHPUnit coverage drivers emit phantom `<line>` elements for files
/// that were never executed; dropping lines absent from the newer document
/// discards those artifacts. Drivers without the bug can keep the union.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum StaleLinePolicy {
    /// Drop lines present only on the accumulated side.
    #[default]
    Drop,
    /// Keep the union of both sides' lines.
    Keep,
}

/// Line coverage for one source file.
#[derive(Clone, Debug, PartialEq)]
pub struct FileCoverage {
    /// The absolute path of the source file.
    pub path: Utf8PathBuf,

    /// Covered/total statement counts as declared by the file's own
    /// `<metrics>` element, when present.
    pub declared_covered_statements: Option<u64>,
    /// See [`declared_covered_statements`](Self::declared_covered_statements).
    pub declared_total_statements: Option<u64>,

    lines: BTreeMap<u32, LineCoverage>,
    metrics_cache: Option<FileMetrics>,
}

impl FileCoverage {
    /// Creates an empty `FileCoverage` for the given path.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            declared_covered_statements: None,
            declared_total_statements: None,
            lines: BTreeMap::new(),
            metrics_cache: None,
        }
    }

    /// Records a line, combining with any existing record for the same
    /// line number.
    ///
    /// A line already recorded as covered is never downgraded to
    /// uncovered.
    pub fn record_line(&mut self, line: LineCoverage) {
        self.metrics_cache = None;
        match self.lines.entry(line.line) {
            btree_map::Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.covered |= line.covered;
                existing.hit_count = existing.hit_count.max(line.hit_count);
            }
            btree_map::Entry::Vacant(entry) => {
                entry.insert(line);
            }
        }
    }

    /// Looks up a line record by line number.
    pub fn line(&self, number: u32) -> Option<&LineCoverage> {
        self.lines.get(&number)
    }

    /// Iterates over the line records in ascending line order.
    pub fn lines(&self) -> impl Iterator<Item = &LineCoverage> {
        self.lines.values()
    }

    /// The number of recorded lines.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// The metrics for this file, computed on first access and cached
    /// until the line set changes.
    ///
    /// A method counts as covered only if every line in its span (from the
    /// method line up to the next method line) was covered; a single
    /// uncovered statement inside the span invalidates the method, while
    /// the statement counts stay accurate.
    pub fn metrics(&mut self) -> FileMetrics {
        match self.metrics_cache {
            Some(metrics) => metrics,
            None => {
                let metrics = self.compute_metrics();
                self.metrics_cache = Some(metrics);
                metrics
            }
        }
    }

    fn compute_metrics(&self) -> FileMetrics {
        let mut metrics = FileMetrics::default();
        // All-lines-covered flag for the method span currently being walked.
        let mut method_covered: Option<bool> = None;

        for line in self.lines.values() {
            metrics.total_lines += 1;
            if line.covered {
                metrics.covered_lines += 1;
            }
            match line.kind {
                LineKind::Method => {
                    if method_covered.take() == Some(true) {
                        metrics.covered_methods += 1;
                    }
                    metrics.total_methods += 1;
                    method_covered = Some(line.covered);
                }
                LineKind::Stmt => {
                    metrics.total_statements += 1;
                    if line.covered {
                        metrics.covered_statements += 1;
                    }
                    if let Some(all_covered) = method_covered {
                        method_covered = Some(all_covered && line.covered);
                    }
                }
            }
        }
        if method_covered == Some(true) {
            metrics.covered_methods += 1;
        }
        metrics
    }

    /// Folds another record for the same file into this one.
    ///
    /// Line coverage is combined "covered wins"; under
    /// [`StaleLinePolicy::Drop`] the merged line set is the donor's, so
    /// lines present only on the accumulated side disappear.
    pub fn merge_from(&mut self, donor: FileCoverage, policy: StaleLinePolicy) {
        match policy {
            StaleLinePolicy::Drop => {
                let mut merged = donor.lines;
                for (number, line) in merged.iter_mut() {
                    if let Some(previous) = self.lines.get(number) {
                        line.covered |= previous.covered;
                        line.hit_count = line.hit_count.max(previous.hit_count);
                    }
                }
                self.lines = merged;
            }
            StaleLinePolicy::Keep => {
                for line in donor.lines.into_values() {
                    self.record_line(line);
                }
            }
        }
        self.declared_covered_statements = donor.declared_covered_statements;
        self.declared_total_statements = donor.declared_total_statements;
        self.metrics_cache = None;
    }
}

/// A project-level coverage report.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CoverageReport {
    /// Covered statement count across the project.
    pub covered_statements: u64,

    /// Total statement count across the project.
    pub total_statements: u64,

    files: IndexMap<Utf8PathBuf, FileCoverage>,
}

impl CoverageReport {
    /// Creates a new, empty `CoverageReport`.
    pub fn new() -> Self {
        Self::default()
    }

    /// The overall covered percentage, rounded to the nearest integer.
    /// Zero total statements yield zero, never a division by zero.
    pub fn percentage(&self) -> u8 {
        if self.total_statements == 0 {
            return 0;
        }
        ((self.covered_statements as f64 / self.total_statements as f64) * 100.0).round() as u8
    }

    /// Adds a file record. Paths are unique; the last record for a
    /// duplicate path wins.
    pub fn add_file(&mut self, file: FileCoverage) {
        self.files.insert(file.path.clone(), file);
    }

    /// Looks up a file record by path.
    pub fn file(&self, path: impl AsRef<Utf8Path>) -> Option<&FileCoverage> {
        self.files.get(path.as_ref())
    }

    /// Iterates over the file records in insertion order.
    pub fn files(&self) -> impl Iterator<Item = &FileCoverage> {
        self.files.values()
    }

    /// The number of file records.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Folds another coverage report into this one, keyed by file path.
    ///
    /// The donor is consumed. Project statement totals are recomputed from
    /// the merged line sets rather than carried over from either side.
    pub fn merge_from(&mut self, donor: CoverageReport, policy: StaleLinePolicy) {
        for file in donor.files.into_values() {
            match self.files.get_mut(&file.path) {
                Some(existing) => existing.merge_from(file, policy),
                None => {
                    self.files.insert(file.path.clone(), file);
                }
            }
        }
        self.recompute_totals();
    }

    fn recompute_totals(&mut self) {
        let mut covered = 0u64;
        let mut total = 0u64;
        for file in self.files.values_mut() {
            let metrics = file.metrics();
            covered += metrics.covered_statements as u64;
            total += metrics.total_statements as u64;
        }
        self.covered_statements = covered;
        self.total_statements = total;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(number: u32, kind: LineKind, covered: bool) -> LineCoverage {
        LineCoverage {
            line: number,
            kind,
            covered,
            hit_count: covered as u64,
            name: None,
        }
    }

    #[test]
    fn covered_line_is_never_downgraded() {
        let mut a = FileCoverage::new("/src/Calc.php");
        a.record_line(line(42, LineKind::Stmt, true));

        let mut b = FileCoverage::new("/src/Calc.php");
        b.record_line(line(42, LineKind::Stmt, false));

        a.merge_from(b, StaleLinePolicy::Drop);
        assert_eq!(a.line(42).map(|l| l.covered), Some(true));

        // And the other way around.
        let mut c = FileCoverage::new("/src/Calc.php");
        c.record_line(line(42, LineKind::Stmt, false));
        let mut d = FileCoverage::new("/src/Calc.php");
        d.record_line(line(42, LineKind::Stmt, true));
        c.merge_from(d, StaleLinePolicy::Drop);
        assert_eq!(c.line(42).map(|l| l.covered), Some(true));
    }

    #[test]
    fn partially_covered_method_is_not_covered() {
        let mut file = FileCoverage::new("/src/Calc.php");
        file.record_line(line(10, LineKind::Method, true));
        for n in 11..=15 {
            file.record_line(line(n, LineKind::Stmt, n != 12));
        }

        let metrics = file.metrics();
        assert_eq!(metrics.total_methods, 1);
        assert_eq!(metrics.covered_methods, 0);
        assert_eq!(metrics.total_statements, 5);
        assert_eq!(metrics.covered_statements, 4);
        assert_eq!(metrics.covered_lines, 5);
    }

    #[test]
    fn method_span_ends_at_the_next_method_line() {
        let mut file = FileCoverage::new("/src/Calc.php");
        file.record_line(line(10, LineKind::Method, true));
        file.record_line(line(11, LineKind::Stmt, true));
        file.record_line(line(20, LineKind::Method, true));
        file.record_line(line(21, LineKind::Stmt, false));

        let metrics = file.metrics();
        assert_eq!(metrics.total_methods, 2);
        assert_eq!(metrics.covered_methods, 1);
        assert_eq!(metrics.total_elements(), 5);
        assert_eq!(metrics.covered_elements(), 3);
    }

    #[test]
    fn stale_lines_are_dropped_by_default_policy() {
        let mut accumulated = FileCoverage::new("/src/Calc.php");
        accumulated.record_line(line(1, LineKind::Stmt, true));
        accumulated.record_line(line(2, LineKind::Stmt, false));

        let mut fresh = FileCoverage::new("/src/Calc.php");
        fresh.record_line(line(2, LineKind::Stmt, true));

        accumulated.merge_from(fresh, StaleLinePolicy::Drop);
        // Line 1 existed only on the accumulated side: a phantom artifact.
        assert_eq!(accumulated.line(1), None);
        assert_eq!(accumulated.line(2).map(|l| l.covered), Some(true));
    }

    #[test]
    fn keep_policy_unions_lines() {
        let mut accumulated = FileCoverage::new("/src/Calc.php");
        accumulated.record_line(line(1, LineKind::Stmt, true));

        let mut fresh = FileCoverage::new("/src/Calc.php");
        fresh.record_line(line(2, LineKind::Stmt, true));

        accumulated.merge_from(fresh, StaleLinePolicy::Keep);
        assert_eq!(accumulated.line_count(), 2);
    }

    #[test]
    fn project_merge_recomputes_statement_totals() {
        let mut first = CoverageReport::new();
        let mut file = FileCoverage::new("/src/Calc.php");
        file.record_line(line(1, LineKind::Stmt, true));
        file.record_line(line(2, LineKind::Stmt, false));
        first.add_file(file);
        first.covered_statements = 1;
        first.total_statements = 2;

        let mut second = CoverageReport::new();
        let mut file = FileCoverage::new("/src/Calc.php");
        file.record_line(line(1, LineKind::Stmt, false));
        file.record_line(line(2, LineKind::Stmt, true));
        second.add_file(file);
        second.covered_statements = 1;
        second.total_statements = 2;

        first.merge_from(second, StaleLinePolicy::Drop);
        assert_eq!(first.covered_statements, 2);
        assert_eq!(first.total_statements, 2);
        assert_eq!(first.percentage(), 100);
    }

    #[test]
    fn zero_statements_is_zero_percent() {
        assert_eq!(CoverageReport::new().percentage(), 0);
    }
}
