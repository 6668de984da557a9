// Copyright (c) The crash-retry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A fake GoogleTest binary.
//!
//! It prints GoogleTest's progress markers for a list of tests given on the command line, honors
//! `--gtest_filter`, and "crashes" (exits without an end marker) or hangs in designated tests. On
//! completion it writes a placeholder XML file to the path given by `--gtest_output=xml:<path>`.

use camino::Utf8PathBuf;
use clap::Parser;
use color_eyre::{Result, eyre::WrapErr};
use std::{fs::OpenOptions, io::Write, time::Duration};

/// The exit code used when a test crashes: what a shell reports for SIGSEGV.
pub const CRASH_EXIT_CODE: i32 = 139;

/// The line recorded for an invocation without a filter.
pub const NO_FILTER_RECORD: &str = "<none>";

#[derive(Debug, Parser)]
#[command(name = "fake-gtest")]
pub struct FakeGtest {
    /// Tests to run, in order
    #[arg(long, value_delimiter = ',')]
    tests: Vec<String>,

    /// Tests that crash when run
    #[arg(long, value_delimiter = ',')]
    crash: Vec<String>,

    /// Tests that fail when run
    #[arg(long, value_delimiter = ',')]
    fail: Vec<String>,

    /// Tests that never finish
    #[arg(long, value_delimiter = ',')]
    hang: Vec<String>,

    /// Crash before running any test
    #[arg(long)]
    crash_before_tests: bool,

    /// Don't write XML output on completion
    #[arg(long)]
    no_xml: bool,

    /// Exit code to use on completion, instead of 1 if any test failed and 0 otherwise
    #[arg(long, allow_negative_numbers = true)]
    exit_code: Option<i32>,

    /// Append the filter this invocation received to this file
    #[arg(long)]
    record: Option<Utf8PathBuf>,

    #[arg(long = "gtest_filter")]
    gtest_filter: Option<String>,

    #[arg(long = "gtest_output")]
    gtest_output: Option<String>,
}

impl FakeGtest {
    /// Runs the fake tests, returning the exit code to use.
    pub fn run(self) -> Result<i32> {
        if let Some(record) = &self.record {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(record)
                .wrap_err_with(|| format!("failed to open {record}"))?;
            writeln!(
                file,
                "{}",
                self.gtest_filter.as_deref().unwrap_or(NO_FILTER_RECORD)
            )?;
        }

        if self.crash_before_tests {
            eprintln!("fake-gtest: crashed during startup");
            return Ok(CRASH_EXIT_CODE);
        }

        let filter = self.gtest_filter.as_deref().unwrap_or("");
        let selected: Vec<&String> = self
            .tests
            .iter()
            .filter(|test| filter_matches(filter, test))
            .collect();

        println!("[==========] Running {} tests from fake-gtest.", selected.len());
        let mut failed = Vec::new();
        for &test in &selected {
            println!("[ RUN      ] {test}");
            if self.hang.contains(test) {
                loop {
                    std::thread::sleep(Duration::from_secs(60));
                }
            }
            if self.crash.contains(test) {
                eprintln!("*** {test} crashed ***");
                return Ok(CRASH_EXIT_CODE);
            }
            if self.fail.contains(test) {
                println!("fake_gtest.rs:1: Failure");
                println!("[  FAILED  ] {test} (0 ms)");
                failed.push(test.as_str());
            } else {
                println!("[       OK ] {test} (0 ms)");
            }
        }
        println!("[==========] {} tests from fake-gtest ran.", selected.len());
        println!("[  PASSED  ] {} tests.", selected.len() - failed.len());

        if let Some(xml) = self.xml_output_path()
            && !self.no_xml
        {
            let contents = format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
                 <testsuites tests=\"{}\" failures=\"{}\" errors=\"0\"></testsuites>\n",
                selected.len(),
                failed.len(),
            );
            std::fs::write(&xml, contents).wrap_err_with(|| format!("failed to write {xml}"))?;
        }

        Ok(self
            .exit_code
            .unwrap_or(if failed.is_empty() { 0 } else { 1 }))
    }

    fn xml_output_path(&self) -> Option<Utf8PathBuf> {
        let path = self.gtest_output.as_deref()?.strip_prefix("xml:")?;
        Some(path.into())
    }
}

/// Returns true if `filter` selects `test`, following GoogleTest's rules.
///
/// Patterns that aren't valid globs match nothing.
pub fn filter_matches(filter: &str, test: &str) -> bool {
    let (positive, negative) = match filter.split_once('-') {
        Some((positive, negative)) => (positive, negative),
        None => (filter, ""),
    };
    let positive = if positive.is_empty() { "*" } else { positive };

    positive.split(':').any(|pattern| glob_matches(pattern, test))
        && !negative
            .split(':')
            .filter(|pattern| !pattern.is_empty())
            .any(|pattern| glob_matches(pattern, test))
}

fn glob_matches(pattern: &str, test: &str) -> bool {
    // Test names aren't paths, so match against the glob's regex rather than a GlobMatcher.
    let Ok(glob) = globset::GlobBuilder::new(pattern)
        .backslash_escape(false)
        .build()
    else {
        return false;
    };
    regex::bytes::Regex::new(glob.regex()).is_ok_and(|regex| regex.is_match(test.as_bytes()))
}
