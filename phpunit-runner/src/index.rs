// Copyright (c) The phpunit-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The PHP class index seam.
//!
//! Resolving a file or class name to runnable test targets requires
//! knowledge of the project's PHP source. That knowledge lives behind the
//! [`PhpIndex`] trait so it can come from a language server, a static
//! analysis pass, or a fixture in tests.

use crate::errors::IndexError;
use camino::{Utf8Path, Utf8PathBuf};

/// A half-open line range within a source file, 1-based.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SourceRange {
    /// The first line of the item.
    pub start_line: u32,
    /// The last line of the item.
    pub end_line: u32,
}

/// The visibility of a PHP method.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Visibility {
    /// A `public` method.
    Public,
    /// A `protected` method.
    Protected,
    /// A `private` method.
    Private,
}

/// A method of an indexed PHP class.
#[derive(Clone, Debug)]
pub struct PhpMethod {
    /// The method name.
    pub name: String,
    /// The method visibility.
    pub visibility: Visibility,
    /// Whether the method is declared abstract.
    pub is_abstract: bool,
    /// Whether the method is declared static.
    pub is_static: bool,
    /// Where the method is declared.
    pub range: SourceRange,
}

impl PhpMethod {
    /// Whether PHPUnit would pick this method up as a test: public,
    /// concrete, non-static, and named `test*`.
    pub fn is_test(&self) -> bool {
        self.visibility == Visibility::Public
            && !self.is_abstract
            && !self.is_static
            && self.name.starts_with("test")
    }
}

/// An indexed PHP class.
#[derive(Clone, Debug)]
pub struct PhpClass {
    /// The class short name.
    pub name: String,
    /// The namespace, `None` for the global namespace.
    pub namespace: Option<String>,
    /// The file the class is declared in.
    pub file: Utf8PathBuf,
    /// Whether the class is declared abstract. Abstract classes are never
    /// run directly.
    pub is_abstract: bool,
    /// Where the class is declared.
    pub range: SourceRange,
    /// The class's own methods.
    pub methods: Vec<PhpMethod>,
}

impl PhpClass {
    /// The fully qualified class name.
    pub fn fqcn(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{namespace}\\{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Looks up a method by name.
    pub fn method(&self, name: &str) -> Option<&PhpMethod> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// A queryable index of the project's PHP classes.
pub trait PhpIndex: Send + Sync {
    /// The classes declared in a file, in declaration order.
    fn classes_in_file(&self, path: &Utf8Path) -> Result<Vec<PhpClass>, IndexError>;

    /// Looks up a class by fully qualified name.
    fn class_detail(&self, fqcn: &str) -> Result<Option<PhpClass>, IndexError>;

    /// Refreshes the index entry for a file after it changed on disk.
    fn reindex_file(&self, path: &Utf8Path) -> Result<(), IndexError>;
}
