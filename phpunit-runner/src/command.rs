// Copyright (c) The phpunit-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assembling PHPUnit command lines.

use camino::Utf8PathBuf;

/// A PHPUnit invocation, rendered to argv form by [`build`](Self::build).
///
/// Argument order is stable: interpreter, interpreter arguments, PHPUnit
/// binary, configuration, colors, logging, then the optional narrowing
/// flags.
#[derive(Clone, Debug)]
pub struct PhpUnitCommand {
    /// The PHP interpreter.
    pub php_binary: String,
    /// Extra arguments passed to the interpreter, before the PHPUnit
    /// binary.
    pub php_args: Vec<String>,
    /// The PHPUnit executable, usually Composer's `vendor/bin/phpunit`.
    pub phpunit_binary: String,
    /// The PHPUnit XML configuration file.
    pub configuration: Utf8PathBuf,
    /// Where PHPUnit writes its JUnit report.
    pub junit_log: Utf8PathBuf,
    /// Test suites to restrict the run to, joined into one `--testsuite`
    /// flag.
    pub testsuites: Vec<String>,
    /// Groups to restrict the run to, joined into one `--group` flag.
    pub groups: Vec<String>,
    /// A rendered `--filter` expression.
    pub filter: Option<String>,
    /// Where PHPUnit writes its Clover coverage report, when coverage is
    /// requested.
    pub coverage_clover: Option<Utf8PathBuf>,
}

impl PhpUnitCommand {
    /// Renders the argv to execute.
    pub fn build(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(16);
        argv.push(self.php_binary.clone());
        argv.extend(self.php_args.iter().cloned());
        argv.push(self.phpunit_binary.clone());
        argv.push("--configuration".to_owned());
        argv.push(self.configuration.to_string());
        argv.push("--colors".to_owned());
        argv.push("--log-junit".to_owned());
        argv.push(self.junit_log.to_string());
        if !self.testsuites.is_empty() {
            argv.push("--testsuite".to_owned());
            argv.push(self.testsuites.join(","));
        }
        if !self.groups.is_empty() {
            argv.push("--group".to_owned());
            argv.push(self.groups.join(","));
        }
        if let Some(filter) = &self.filter {
            argv.push("--filter".to_owned());
            argv.push(filter.clone());
        }
        if let Some(clover) = &self.coverage_clover {
            argv.push("--coverage-clover".to_owned());
            argv.push(clover.to_string());
        }
        argv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base_command() -> PhpUnitCommand {
        PhpUnitCommand {
            php_binary: "php".to_owned(),
            php_args: Vec::new(),
            phpunit_binary: "vendor/bin/phpunit".to_owned(),
            configuration: "phpunit.xml".into(),
            junit_log: "build/phpunit/junit.xml".into(),
            testsuites: Vec::new(),
            groups: Vec::new(),
            filter: None,
            coverage_clover: None,
        }
    }

    #[test]
    fn minimal_command_always_logs_junit() {
        let argv = base_command().build();
        assert_eq!(
            argv,
            vec![
                "php",
                "vendor/bin/phpunit",
                "--configuration",
                "phpunit.xml",
                "--colors",
                "--log-junit",
                "build/phpunit/junit.xml",
            ]
        );
    }

    #[test]
    fn php_args_come_before_the_phpunit_binary() {
        let mut command = base_command();
        command.php_args = vec!["-dxdebug.mode=coverage".to_owned()];
        let argv = command.build();
        assert_eq!(argv[1], "-dxdebug.mode=coverage");
        assert_eq!(argv[2], "vendor/bin/phpunit");
    }

    #[test]
    fn suites_and_groups_join_into_single_flags() {
        let mut command = base_command();
        command.testsuites = vec!["unit".to_owned(), "functional".to_owned()];
        command.groups = vec!["fast".to_owned(), "db".to_owned()];
        let argv = command.build();
        let suite_at = argv.iter().position(|a| a == "--testsuite").unwrap();
        assert_eq!(argv[suite_at + 1], "unit,functional");
        let group_at = argv.iter().position(|a| a == "--group").unwrap();
        assert_eq!(argv[group_at + 1], "fast,db");
    }

    #[test]
    fn filter_and_coverage_trail_the_command() {
        let mut command = base_command();
        command.filter = Some("/MathTest::testAdd/".to_owned());
        command.coverage_clover = Some("build/phpunit/clover.xml".into());
        let argv = command.build();
        assert_eq!(
            &argv[argv.len() - 4..],
            &[
                "--filter",
                "/MathTest::testAdd/",
                "--coverage-clover",
                "build/phpunit/clover.xml",
            ]
        );
    }
}
