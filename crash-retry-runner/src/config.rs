// Copyright (c) The crash-retry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for a harness run.

use crate::errors::HarnessConfigError;
use camino::{Utf8Path, Utf8PathBuf};

/// The number of retries performed if none is specified.
pub const DEFAULT_MAX_RETRIES: usize = 100;

/// Everything the harness needs to know to supervise a test binary.
///
/// A `HarnessConfig` is created once from the invocation arguments and is not changed while the
/// harness is running.
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    xml_output_path: Utf8PathBuf,
    log_path: Utf8PathBuf,
    max_retries: usize,
    filter_file: Option<Utf8PathBuf>,
    child_argv: Vec<String>,
}

impl HarnessConfig {
    /// Creates a new `HarnessConfig` with [`DEFAULT_MAX_RETRIES`] retries and no filter file.
    ///
    /// A leading `--` in `child_argv` is stripped. Returns an error if no command remains.
    pub fn new(
        xml_output_path: impl Into<Utf8PathBuf>,
        log_path: impl Into<Utf8PathBuf>,
        child_argv: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, HarnessConfigError> {
        let mut child_argv: Vec<String> = child_argv.into_iter().map(Into::into).collect();
        if child_argv.first().is_some_and(|arg| arg == "--") {
            child_argv.remove(0);
        }
        if child_argv.is_empty() {
            return Err(HarnessConfigError::EmptyCommand);
        }

        Ok(Self {
            xml_output_path: xml_output_path.into(),
            log_path: log_path.into(),
            max_retries: DEFAULT_MAX_RETRIES,
            filter_file: None,
            child_argv,
        })
    }

    /// Sets the number of times the child is re-run after a crash.
    pub fn set_max_retries(&mut self, max_retries: usize) -> &mut Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets a file that the current filter is written to after every crash.
    pub fn set_filter_file(&mut self, filter_file: impl Into<Utf8PathBuf>) -> &mut Self {
        self.filter_file = Some(filter_file.into());
        self
    }

    /// The JUnit XML file the child is expected to write.
    pub fn xml_output_path(&self) -> &Utf8Path {
        &self.xml_output_path
    }

    /// The file the child's combined output is teed to.
    pub fn log_path(&self) -> &Utf8Path {
        &self.log_path
    }

    /// The number of times the child is re-run after a crash.
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// The maximum number of attempts: one more than the number of retries.
    pub fn max_attempts(&self) -> usize {
        self.max_retries.saturating_add(1)
    }

    /// The file the filter is persisted to, if any.
    pub fn filter_file(&self) -> Option<&Utf8Path> {
        self.filter_file.as_deref()
    }

    /// The command line of the test binary, as provided by the caller.
    pub fn child_argv(&self) -> &[String] {
        &self.child_argv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_leading_separator() {
        let config = HarnessConfig::new("out.xml", "out.log", ["--", "./test_bin", "--", "x"])
            .expect("command is non-empty");
        assert_eq!(config.child_argv(), ["./test_bin", "--", "x"]);
        assert_eq!(config.max_retries(), DEFAULT_MAX_RETRIES);
        assert_eq!(config.max_attempts(), DEFAULT_MAX_RETRIES + 1);
        assert_eq!(config.filter_file(), None);
    }

    #[test]
    fn empty_command() {
        let err = HarnessConfig::new("out.xml", "out.log", Vec::<String>::new())
            .expect_err("no command");
        assert!(matches!(err, HarnessConfigError::EmptyCommand));

        let err = HarnessConfig::new("out.xml", "out.log", ["--"]).expect_err("only a separator");
        assert!(matches!(err, HarnessConfigError::EmptyCommand));
    }

    #[test]
    fn setters() {
        let mut config = HarnessConfig::new("out.xml", "out.log", ["./test_bin"]).unwrap();
        config.set_max_retries(0).set_filter_file("filter.txt");
        assert_eq!(config.max_attempts(), 1);
        assert_eq!(config.filter_file(), Some(Utf8Path::new("filter.txt")));

        config.set_max_retries(usize::MAX);
        assert_eq!(config.max_attempts(), usize::MAX);
    }
}
