// Copyright (c) The phpunit-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-project configuration.
//!
//! Projects may carry a `phpunit.toml` at their root; a missing file means
//! the defaults apply. Every path in the file is interpreted relative to
//! the project root.

use crate::errors::ConfigReadError;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use tracing::debug;

/// The configuration file name, looked up at the project root.
pub static CONFIG_FILE_NAME: &str = "phpunit.toml";

/// Project-level runner configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProjectConfig {
    /// The PHP interpreter to invoke.
    pub php_binary: String,
    /// Extra arguments for the interpreter.
    pub php_args: Vec<String>,
    /// The PHPUnit executable, relative to the project root unless
    /// absolute.
    pub phpunit_binary: String,
    /// The PHPUnit XML configuration file.
    pub configuration: Utf8PathBuf,
    /// The directory report files are written to.
    pub report_dir: Utf8PathBuf,
    /// Whether to collect Clover coverage on every run.
    pub coverage: bool,

    /// The project root, recorded at load time.
    #[serde(skip)]
    root: Utf8PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            php_binary: "php".to_owned(),
            php_args: Vec::new(),
            phpunit_binary: "vendor/bin/phpunit".to_owned(),
            configuration: "phpunit.xml".into(),
            report_dir: "build/phpunit".into(),
            coverage: false,
            root: Utf8PathBuf::new(),
        }
    }
}

impl ProjectConfig {
    /// Loads configuration for the project rooted at `root`.
    ///
    /// A missing `phpunit.toml` yields the defaults; any other read or
    /// parse failure is an error.
    pub fn load(root: impl Into<Utf8PathBuf>) -> Result<Self, ConfigReadError> {
        let root = root.into();
        let path = root.join(CONFIG_FILE_NAME);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(root = %root, "no {CONFIG_FILE_NAME}, using defaults");
                let mut config = Self::default();
                config.root = root;
                return Ok(config);
            }
            Err(err) => {
                return Err(ConfigReadError::Read { path, source: err });
            }
        };
        let mut config: Self =
            toml::from_str(&contents).map_err(|err| ConfigReadError::Parse { path, source: err })?;
        config.root = root;
        Ok(config)
    }

    /// The project root this configuration was loaded for.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Resolves a configured path against the project root. Absolute paths
    /// pass through unchanged.
    pub fn resolve(&self, path: &Utf8Path) -> Utf8PathBuf {
        if path.is_absolute() {
            path.to_owned()
        } else {
            self.root.join(path)
        }
    }

    /// The resolved report directory.
    pub fn report_dir(&self) -> Utf8PathBuf {
        self.resolve(&self.report_dir)
    }

    /// The path PHPUnit writes its JUnit report to.
    pub fn junit_log_path(&self) -> Utf8PathBuf {
        self.report_dir().join("junit.xml")
    }

    /// The path PHPUnit writes its Clover coverage report to.
    pub fn clover_path(&self) -> Utf8PathBuf {
        self.report_dir().join("clover.xml")
    }
}
