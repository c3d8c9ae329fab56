// Copyright (c) The phpunit-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parse PHPUnit's JUnit-style test report XML.

use crate::{
    errors::JunitParseError,
    test_report::{CaseReport, CaseState, ErrorReport, RunMeta, TestReport},
};
use camino::Utf8PathBuf;
use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};
use std::{borrow::Cow, str::FromStr, time::Duration};
use tracing::warn;

static TESTCASE_TAG: &str = "testcase";
static SYSTEM_OUT_TAG: &str = "system-out";

/// The suite name used for testcases that carry no `class` attribute.
pub static STANDALONE_SUITE: &str = "standalone";

/// A lazy parser for JUnit test report documents.
///
/// The suite/case tree is materialized on first access and cached, so
/// repeated accesses never re-walk the XML.
#[derive(Clone, Debug, Default)]
pub struct JunitParser {
    document: Option<String>,
    run_meta: Option<RunMeta>,
    parsed: Option<TestReport>,
}

impl JunitParser {
    /// Creates a parser with no document configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the XML document to parse, discarding any cached tree.
    pub fn set_document(&mut self, document: impl Into<String>) -> &mut Self {
        self.document = Some(document.into());
        self.parsed = None;
        self
    }

    /// Attaches the raw process result to the report that will be built.
    pub fn set_run_meta(&mut self, run_meta: RunMeta) -> &mut Self {
        self.run_meta = Some(run_meta);
        self
    }

    /// The parsed report, built on first call and cached afterwards.
    ///
    /// Fails with [`JunitParseError::MissingDocument`] if no document was
    /// configured.
    pub fn report(&mut self) -> Result<&TestReport, JunitParseError> {
        self.materialize()?;
        match &self.parsed {
            Some(report) => Ok(report),
            None => Err(JunitParseError::MissingDocument),
        }
    }

    /// Consumes the parser, returning the parsed report.
    pub fn into_report(mut self) -> Result<TestReport, JunitParseError> {
        self.materialize()?;
        match self.parsed {
            Some(report) => Ok(report),
            None => Err(JunitParseError::MissingDocument),
        }
    }

    fn materialize(&mut self) -> Result<(), JunitParseError> {
        if self.parsed.is_none() {
            let document = self
                .document
                .as_deref()
                .ok_or(JunitParseError::MissingDocument)?;
            let mut report = parse_junit(document)?;
            report.run_meta = self.run_meta.take();
            self.parsed = Some(report);
        }
        Ok(())
    }
}

/// Parses a JUnit document into a [`TestReport`].
///
/// Nested `<testsuite>` elements are flattened: every `<testcase>`
/// descendant is attributed to the suite named by its `class` attribute,
/// not to its XML nesting ancestor. Cases with no `class` attribute are
/// grouped under [`STANDALONE_SUITE`].
pub fn parse_junit(document: &str) -> Result<TestReport, JunitParseError> {
    let mut reader = Reader::from_str(document);
    reader.config_mut().trim_text(true);

    let mut report = TestReport::new();
    let mut current: Option<CaseReport> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let name = start.name();
                match name.as_ref() {
                    b"testsuites" | b"testsuite" => {}
                    b"testcase" => current = Some(case_from_attributes(&start)?),
                    tag if CaseState::from_tag(tag).is_some() => {
                        let detail = unescape_text(reader.read_text(name)?)?;
                        attach_case_result(&mut current, &start, detail)?;
                    }
                    tag if tag == SYSTEM_OUT_TAG.as_bytes() => {
                        let text = unescape_text(reader.read_text(name)?)?;
                        if let Some(case) = current.as_mut() {
                            case.system_out = Some(text);
                        }
                    }
                    _ => {
                        reader.read_to_end(name)?;
                    }
                }
            }
            Event::Empty(start) => {
                let name = start.name();
                match name.as_ref() {
                    b"testcase" => report.add_case(case_from_attributes(&start)?),
                    tag if CaseState::from_tag(tag).is_some() => {
                        attach_case_result(&mut current, &start, String::new())?;
                    }
                    _ => {}
                }
            }
            Event::End(end) => {
                if end.name().as_ref() == TESTCASE_TAG.as_bytes() {
                    if let Some(case) = current.take() {
                        report.add_case(case);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(report)
}

fn case_from_attributes(start: &BytesStart<'_>) -> Result<CaseReport, JunitParseError> {
    let mut name = String::new();
    let mut class: Option<String> = None;
    let mut file: Option<Utf8PathBuf> = None;
    let mut line: Option<u64> = None;
    let mut time = Duration::ZERO;
    let mut assertions = 0u64;

    for attr in start.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"name" => name = value.into_owned(),
            b"class" => class = Some(value.into_owned()),
            b"file" => file = Some(Utf8PathBuf::from(value.into_owned())),
            b"line" => line = Some(parse_attr("line", &value)?),
            b"time" => time = duration_from_seconds("time", &value)?,
            b"assertions" => assertions = parse_attr("assertions", &value)?,
            _ => {}
        }
    }

    let suite_name = class.unwrap_or_else(|| STANDALONE_SUITE.to_owned());
    let mut case = CaseReport::new(name, suite_name);
    case.file = file;
    case.line = line;
    case.time = time;
    case.assertions = assertions;
    Ok(case)
}

fn attach_case_result(
    current: &mut Option<CaseReport>,
    start: &BytesStart<'_>,
    detail: String,
) -> Result<(), JunitParseError> {
    // Suite-level result elements carry no per-case information.
    let Some(case) = current.as_mut() else {
        return Ok(());
    };
    let Some(kind) = CaseState::from_tag(start.name().as_ref()) else {
        return Ok(());
    };

    if case.state == CaseState::Passed {
        case.state = kind;
    } else {
        // At most one result child is expected per testcase.
        warn!(case = %case.name, "testcase has more than one result element");
    }

    let mut message = String::new();
    let mut ty: Option<String> = None;
    for attr in start.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"message" => message = value.into_owned(),
            b"type" => ty = Some(value.into_owned()),
            _ => {}
        }
    }

    let mut error = ErrorReport::new(kind, message, detail);
    error.ty = ty;
    case.errors.push(error);
    Ok(())
}

fn parse_attr<T: FromStr>(attribute: &'static str, value: &str) -> Result<T, JunitParseError> {
    value
        .trim()
        .parse()
        .map_err(|_| JunitParseError::InvalidAttribute {
            attribute,
            value: value.to_owned(),
        })
}

// Negative and NaN times are treated as zero; a finite value too large
// for a `Duration` is rejected rather than allowed to panic.
fn duration_from_seconds(
    attribute: &'static str,
    value: &str,
) -> Result<Duration, JunitParseError> {
    let seconds: f64 = parse_attr(attribute, value)?;
    if seconds.is_nan() || seconds <= 0.0 {
        return Ok(Duration::ZERO);
    }
    Duration::try_from_secs_f64(seconds).map_err(|_| JunitParseError::InvalidAttribute {
        attribute,
        value: value.to_owned(),
    })
}

fn unescape_text(raw: Cow<'_, str>) -> Result<String, JunitParseError> {
    Ok(quick_xml::escape::unescape(&raw)?.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    static MATH_TEST: &str = indoc! {r#"
        <?xml version="1.0" encoding="UTF-8"?>
        <testsuites>
          <testsuite name="MathTest" file="/src/tests/MathTest.php" tests="2" assertions="2" time="0.003">
            <testcase name="testAdd" class="MathTest" file="/src/tests/MathTest.php" line="10" assertions="1" time="0.002"/>
            <testcase name="testSub" class="MathTest" file="/src/tests/MathTest.php" line="17" assertions="1" time="0.001">
              <failure type="AssertionError">Failed asserting that 1 matches expected 2.

        /src/tests/MathTest.php:19</failure>
            </testcase>
          </testsuite>
        </testsuites>
    "#};

    #[test]
    fn math_test_report() {
        let report = parse_junit(MATH_TEST).unwrap();

        assert_eq!(report.suite_count(), 1);
        let suite = report.suite("MathTest").unwrap();
        assert_eq!(suite.state, CaseState::Failure);
        assert_eq!(suite.case_count(), 2);
        assert_eq!(suite.assertions, 2);

        let add = suite.case("testAdd").unwrap();
        assert_eq!(add.state, CaseState::Passed);
        assert_eq!(add.time, Duration::from_secs_f64(0.002));
        assert_eq!(add.assertions, 1);
        assert_eq!(add.line, Some(10));

        let sub = suite.case("testSub").unwrap();
        assert_eq!(sub.state, CaseState::Failure);
        assert_eq!(sub.errors.len(), 1);
        assert_eq!(sub.errors[0].ty.as_deref(), Some("AssertionError"));
        assert_eq!(sub.errors[0].trace.len(), 1);
        assert_eq!(sub.errors[0].trace[0].line, 19);

        assert_eq!(
            report.totals.contained_states(),
            vec![CaseState::Passed, CaseState::Failure]
        );
        assert_eq!(report.totals.cases, 2);
        assert_eq!(report.totals.assertions, 2);
    }

    #[test]
    fn nested_suites_flatten_by_class_attribute() {
        let document = indoc! {r#"
            <testsuites>
              <testsuite name="App">
                <testsuite name="App\Unit">
                  <testcase name="testOne" class="App\FooTest" assertions="1" time="0.001"/>
                  <testsuite name="App\Unit\Deep">
                    <testcase name="testTwo" class="App\BarTest" assertions="1" time="0.001"/>
                    <testcase name="testThree" class="App\FooTest" assertions="1" time="0.001"/>
                  </testsuite>
                </testsuite>
                <testcase name="testFour" assertions="1" time="0.001"/>
              </testsuite>
            </testsuites>
        "#};
        let report = parse_junit(document).unwrap();

        assert_eq!(report.totals.cases, 4);
        // Suites come from the `class` attribute, never the nesting path.
        assert_eq!(report.suite("App"), None);
        assert_eq!(report.suite("App\\FooTest").unwrap().case_count(), 2);
        assert_eq!(report.suite("App\\BarTest").unwrap().case_count(), 1);
        assert_eq!(report.suite(STANDALONE_SUITE).unwrap().case_count(), 1);
    }

    #[test]
    fn skipped_and_system_out() {
        let document = indoc! {r#"
            <testsuites>
              <testsuite name="IoTest">
                <testcase name="testSkip" class="IoTest" assertions="0" time="0">
                  <skipped/>
                </testcase>
                <testcase name="testEcho" class="IoTest" assertions="1" time="0.001">
                  <system-out>hello &amp; goodbye</system-out>
                </testcase>
              </testsuite>
            </testsuites>
        "#};
        let report = parse_junit(document).unwrap();
        let suite = report.suite("IoTest").unwrap();

        assert_eq!(suite.case("testSkip").unwrap().state, CaseState::Skipped);
        assert_eq!(
            suite.case("testEcho").unwrap().system_out.as_deref(),
            Some("hello & goodbye")
        );
        assert_eq!(suite.state, CaseState::Skipped);
    }

    #[test]
    fn multiple_result_children_keep_the_first_state() {
        let document = indoc! {r#"
            <testsuites>
              <testsuite name="OddTest">
                <testcase name="testOdd" class="OddTest" assertions="1" time="0.001">
                  <warning type="W">w</warning>
                  <error type="E">e</error>
                </testcase>
              </testsuite>
            </testsuites>
        "#};
        let report = parse_junit(document).unwrap();
        let case = report.suite("OddTest").unwrap().case("testOdd").unwrap();
        assert_eq!(case.state, CaseState::Warning);
        // Both entries are retained for display.
        assert_eq!(case.errors.len(), 2);
    }

    #[test]
    fn out_of_range_time_attribute_is_an_error_not_a_panic() {
        let document = indoc! {r#"
            <testsuites>
              <testsuite name="SlowTest">
                <testcase name="testForever" class="SlowTest" assertions="1" time="1e300"/>
              </testsuite>
            </testsuites>
        "#};
        match parse_junit(document) {
            Err(JunitParseError::InvalidAttribute { attribute, value }) => {
                assert_eq!(attribute, "time");
                assert_eq!(value, "1e300");
            }
            other => panic!("expected InvalidAttribute, got {other:?}"),
        }
    }

    #[test]
    fn negative_and_nan_times_are_clamped_to_zero() {
        let document = indoc! {r#"
            <testsuites>
              <testsuite name="OddTest">
                <testcase name="testBackwards" class="OddTest" assertions="1" time="-0.5"/>
                <testcase name="testNan" class="OddTest" assertions="1" time="NaN"/>
              </testsuite>
            </testsuites>
        "#};
        let report = parse_junit(document).unwrap();
        let suite = report.suite("OddTest").unwrap();
        assert_eq!(suite.case("testBackwards").unwrap().time, Duration::ZERO);
        assert_eq!(suite.case("testNan").unwrap().time, Duration::ZERO);
    }

    #[test]
    fn report_access_without_document_fails() {
        let mut parser = JunitParser::new();
        assert!(matches!(
            parser.report(),
            Err(JunitParseError::MissingDocument)
        ));
    }

    #[test]
    fn parsed_tree_is_cached() {
        let mut parser = JunitParser::new();
        parser.set_document(MATH_TEST);
        let first = parser.report().unwrap().clone();
        let second = parser.report().unwrap();
        assert_eq!(&first, second);
    }

    #[test]
    fn run_meta_is_attached() {
        let mut parser = JunitParser::new();
        parser.set_document(MATH_TEST).set_run_meta(RunMeta {
            exit_code: 1,
            command_line: "php phpunit".to_owned(),
            captured_stdout: "PHPUnit 10".to_owned(),
        });
        let report = parser.into_report().unwrap();
        assert_eq!(report.run_meta.as_ref().map(|m| m.exit_code), Some(1));
    }
}
