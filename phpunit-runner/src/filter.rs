// Copyright (c) The phpunit-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Building `--filter` expressions for class and method targets.

use indexmap::IndexMap;

/// A set of test classes, each with an optional list of methods, to be
/// rendered as a PHPUnit `--filter` regular expression.
///
/// Classes and methods are kept in insertion order so the rendered
/// expression is deterministic.
#[derive(Clone, Debug, Default)]
pub struct FilterSpec {
    classes: IndexMap<String, Vec<String>>,
}

impl FilterSpec {
    /// Creates an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets every test method of a class.
    ///
    /// If methods were previously added for the class, the whole class is
    /// now targeted and the method list is cleared.
    pub fn add_class(&mut self, fqcn: impl Into<String>) -> &mut Self {
        self.classes.entry(fqcn.into()).or_default().clear();
        self
    }

    /// Targets a single method of a class.
    pub fn add_method(&mut self, fqcn: impl Into<String>, method: impl Into<String>) -> &mut Self {
        self.classes
            .entry(fqcn.into())
            .or_default()
            .push(method.into());
        self
    }

    /// Whether any target has been added.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Renders the PHPUnit `--filter` expression, or `None` when the
    /// filter is empty.
    ///
    /// Every class and method name is escaped, so namespace backslashes
    /// match literally. A class with no methods matches all of its
    /// methods; one method matches exactly; several methods become a
    /// non-capturing alternation.
    pub fn to_regex(&self) -> Option<String> {
        if self.classes.is_empty() {
            return None;
        }
        let alternatives: Vec<String> = self
            .classes
            .iter()
            .map(|(fqcn, methods)| {
                let class = regex::escape(fqcn);
                match methods.as_slice() {
                    [] => class,
                    [method] => format!("{class}::{}", regex::escape(method)),
                    methods => {
                        let joined = methods
                            .iter()
                            .map(|m| regex::escape(m))
                            .collect::<Vec<_>>()
                            .join("|");
                        format!("{class}::(?:{joined})")
                    }
                }
            })
            .collect();

        let body = match alternatives.as_slice() {
            [single] => single.clone(),
            _ => format!("(?:{})", alternatives.join("|")),
        };
        Some(format!("/{body}/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_filter_renders_nothing() {
        assert_eq!(FilterSpec::new().to_regex(), None);
        assert!(FilterSpec::new().is_empty());
    }

    #[test]
    fn single_method_escapes_namespace_separators() {
        let mut spec = FilterSpec::new();
        spec.add_method(r"App\Tests\MathTest", "testAdd");
        assert_eq!(
            spec.to_regex().unwrap(),
            r"/App\\Tests\\MathTest::testAdd/"
        );
    }

    #[test]
    fn whole_class_has_no_method_suffix() {
        let mut spec = FilterSpec::new();
        spec.add_class(r"App\Tests\MathTest");
        assert_eq!(spec.to_regex().unwrap(), r"/App\\Tests\\MathTest/");
    }

    #[test]
    fn multiple_methods_become_an_alternation() {
        let mut spec = FilterSpec::new();
        spec.add_method("MathTest", "testAdd");
        spec.add_method("MathTest", "testSub");
        assert_eq!(spec.to_regex().unwrap(), "/MathTest::(?:testAdd|testSub)/");
    }

    #[test]
    fn multiple_classes_join_in_insertion_order() {
        let mut spec = FilterSpec::new();
        spec.add_class("BTest");
        spec.add_method("ATest", "testOne");
        assert_eq!(spec.to_regex().unwrap(), "/(?:BTest|ATest::testOne)/");
    }

    #[test]
    fn add_class_widens_a_previous_method_target() {
        let mut spec = FilterSpec::new();
        spec.add_method("MathTest", "testAdd");
        spec.add_class("MathTest");
        assert_eq!(spec.to_regex().unwrap(), "/MathTest/");
    }

    #[test]
    fn regex_metacharacters_in_names_match_literally() {
        let mut spec = FilterSpec::new();
        spec.add_method("MathTest", "testAdd with data set #0");
        assert_eq!(
            spec.to_regex().unwrap(),
            r"/MathTest::testAdd with data set \#0/"
        );
    }
}
