// Copyright (c) The phpunit-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parse Clover-style coverage XML as emitted by PHPUnit.

use crate::{
    coverage::{CoverageReport, FileCoverage, LineCoverage, LineKind},
    errors::CloverParseError,
};
use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};
use std::str::FromStr;

/// A lazy parser for Clover coverage documents.
#[derive(Clone, Debug, Default)]
pub struct CloverParser {
    document: Option<String>,
    parsed: Option<CoverageReport>,
}

impl CloverParser {
    /// Creates a parser with no document configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the XML document to parse, discarding any cached report.
    pub fn set_document(&mut self, document: impl Into<String>) -> &mut Self {
        self.document = Some(document.into());
        self.parsed = None;
        self
    }

    /// The parsed report, built on first call and cached afterwards.
    pub fn report(&mut self) -> Result<&CoverageReport, CloverParseError> {
        self.materialize()?;
        match &self.parsed {
            Some(report) => Ok(report),
            None => Err(CloverParseError::MissingDocument),
        }
    }

    /// Consumes the parser, returning the parsed report.
    pub fn into_report(mut self) -> Result<CoverageReport, CloverParseError> {
        self.materialize()?;
        match self.parsed {
            Some(report) => Ok(report),
            None => Err(CloverParseError::MissingDocument),
        }
    }

    fn materialize(&mut self) -> Result<(), CloverParseError> {
        if self.parsed.is_none() {
            let document = self
                .document
                .as_deref()
                .ok_or(CloverParseError::MissingDocument)?;
            self.parsed = Some(parse_clover(document)?);
        }
        Ok(())
    }
}

/// Parses a Clover document into a [`CoverageReport`].
///
/// `<file>` elements directly under `<project>` and nested under
/// `<package>` elements are treated alike; file paths are globally unique
/// and the last record for a duplicate path wins.
pub fn parse_clover(document: &str) -> Result<CoverageReport, CloverParseError> {
    let mut reader = Reader::from_str(document);
    reader.config_mut().trim_text(true);

    let mut report = CoverageReport::new();
    let mut current: Option<FileCoverage> = None;
    let mut project_metrics_seen = false;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let name = start.name();
                match name.as_ref() {
                    b"coverage" | b"project" | b"package" => {}
                    b"file" => current = Some(file_from_attributes(&start)?),
                    b"metrics" => {
                        apply_metrics(
                            &start,
                            current.as_mut(),
                            &mut report,
                            &mut project_metrics_seen,
                        )?;
                        reader.read_to_end(name)?;
                    }
                    b"line" => {
                        record_line(&start, current.as_mut())?;
                        reader.read_to_end(name)?;
                    }
                    _ => {
                        reader.read_to_end(name)?;
                    }
                }
            }
            Event::Empty(start) => match start.name().as_ref() {
                b"file" => report.add_file(file_from_attributes(&start)?),
                b"metrics" => apply_metrics(
                    &start,
                    current.as_mut(),
                    &mut report,
                    &mut project_metrics_seen,
                )?,
                b"line" => record_line(&start, current.as_mut())?,
                _ => {}
            },
            Event::End(end) => {
                if end.name().as_ref() == b"file" {
                    if let Some(file) = current.take() {
                        report.add_file(file);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(report)
}

fn file_from_attributes(start: &BytesStart<'_>) -> Result<FileCoverage, CloverParseError> {
    for attr in start.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"name" {
            return Ok(FileCoverage::new(attr.unescape_value()?.into_owned()));
        }
    }
    Err(CloverParseError::MissingAttribute {
        element: "file",
        attribute: "name",
    })
}

// The first `<metrics>` outside any `<file>` is the project summary;
// later package-level metrics are ignored.
fn apply_metrics(
    start: &BytesStart<'_>,
    current: Option<&mut FileCoverage>,
    report: &mut CoverageReport,
    project_metrics_seen: &mut bool,
) -> Result<(), CloverParseError> {
    let mut covered: Option<u64> = None;
    let mut total: Option<u64> = None;
    for attr in start.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"coveredstatements" => covered = Some(parse_attr("coveredstatements", &value)?),
            b"statements" => total = Some(parse_attr("statements", &value)?),
            _ => {}
        }
    }

    match current {
        Some(file) => {
            file.declared_covered_statements = covered;
            file.declared_total_statements = total;
        }
        None if !*project_metrics_seen => {
            report.covered_statements = covered.unwrap_or(0);
            report.total_statements = total.unwrap_or(0);
            *project_metrics_seen = true;
        }
        None => {}
    }
    Ok(())
}

fn record_line(
    start: &BytesStart<'_>,
    current: Option<&mut FileCoverage>,
) -> Result<(), CloverParseError> {
    let Some(file) = current else {
        // A stray line outside any file carries no usable information.
        return Ok(());
    };

    let mut num: Option<u32> = None;
    let mut ty: Option<String> = None;
    let mut count = 0u64;
    let mut method_name: Option<String> = None;
    for attr in start.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"num" => num = Some(parse_attr("num", &value)?),
            b"type" => ty = Some(value.into_owned()),
            b"count" => count = parse_attr("count", &value)?,
            b"name" => method_name = Some(value.into_owned()),
            _ => {}
        }
    }

    let Some(num) = num else {
        return Err(CloverParseError::MissingAttribute {
            element: "line",
            attribute: "num",
        });
    };
    let kind = match ty.as_deref() {
        Some("method") => LineKind::Method,
        Some("stmt") => LineKind::Stmt,
        other => {
            return Err(CloverParseError::UnknownLineType {
                file: file.path.clone(),
                ty: other.unwrap_or_default().to_owned(),
            });
        }
    };

    file.record_line(LineCoverage {
        line: num,
        kind,
        covered: count > 0,
        hit_count: count,
        name: method_name,
    });
    Ok(())
}

fn parse_attr<T: FromStr>(attribute: &'static str, value: &str) -> Result<T, CloverParseError> {
    value
        .trim()
        .parse()
        .map_err(|_| CloverParseError::InvalidAttribute {
            attribute,
            value: value.to_owned(),
        })
}
