// Copyright (c) The phpunit-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced while reading report documents.

use camino::Utf8PathBuf;
use quick_xml::{escape::EscapeError, events::attributes::AttrError};
use thiserror::Error;

/// An error that occurred while parsing a JUnit test report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JunitParseError {
    /// No document was configured on the parser before a report was requested.
    #[error("no JUnit document configured")]
    MissingDocument,

    /// The XML document was structurally malformed.
    #[error("malformed JUnit XML")]
    Xml(#[from] quick_xml::Error),

    /// An element carried a malformed attribute list.
    #[error("malformed attribute in JUnit XML")]
    Attr(#[from] AttrError),

    /// A text node contained an invalid escape sequence.
    #[error("invalid escape sequence in JUnit XML")]
    Escape(#[from] EscapeError),

    /// An attribute value did not parse as the expected type.
    #[error("invalid `{attribute}` value `{value}` in JUnit XML")]
    InvalidAttribute {
        /// The attribute name.
        attribute: &'static str,
        /// The offending value.
        value: String,
    },
}

/// An error that occurred while parsing a Clover coverage report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CloverParseError {
    /// No document was configured on the parser before a report was requested.
    #[error("no Clover document configured")]
    MissingDocument,

    /// The XML document was structurally malformed.
    #[error("malformed Clover XML")]
    Xml(#[from] quick_xml::Error),

    /// An element carried a malformed attribute list.
    #[error("malformed attribute in Clover XML")]
    Attr(#[from] AttrError),

    /// An attribute value did not parse as the expected type.
    #[error("invalid `{attribute}` value `{value}` in Clover XML")]
    InvalidAttribute {
        /// The attribute name.
        attribute: &'static str,
        /// The offending value.
        value: String,
    },

    /// A required attribute was absent.
    #[error("`<{element}>` element is missing its `{attribute}` attribute")]
    MissingAttribute {
        /// The element name.
        element: &'static str,
        /// The missing attribute name.
        attribute: &'static str,
    },

    /// A `<line>` element carried a type this crate does not understand.
    ///
    /// This is a hard error: silently skipping the line would corrupt the
    /// aggregate statement and method metrics for the file.
    #[error("unrecognized coverage line type `{ty}` in `{file}`")]
    UnknownLineType {
        /// The file whose coverage data carried the unknown type.
        file: Utf8PathBuf,
        /// The unrecognized `type` attribute value.
        ty: String,
    },
}
