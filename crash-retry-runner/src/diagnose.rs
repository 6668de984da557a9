// Copyright (c) The crash-retry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifying the test that was running when a child crashed.
//!
//! GoogleTest announces every test with a `[ RUN      ]` line and finishes it with one of
//! `[       OK ]`, `[  FAILED  ]` or `[  SKIPPED ]`. The test whose RUN line is the last one in
//! the log, and which has no end marker after it, is the one that crashed.

use crate::errors::DiagnoseError;
use camino::Utf8Path;
use regex::Regex;
use std::{fmt, io, sync::LazyLock};
use tracing::debug;

/// The marker GoogleTest prints when a test starts.
pub const RUN_MARKER: &str = "[ RUN      ]";

/// The markers GoogleTest prints when a test finishes.
pub const END_MARKERS: [&str; 3] = ["[       OK ]", "[  FAILED  ]", "[  SKIPPED ]"];

/// The suite reported when no suite could be identified.
pub const UNKNOWN_SUITE: &str = "UnknownSuite";

/// The test name reported when no test could be identified.
pub const UNKNOWN_TEST: &str = "UnknownTest";

static RUN_LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[ RUN      \]\s+(\S+)\s*$").expect("RUN line regex is valid")
});

/// A GoogleTest test, identified as `Suite.Name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TestIdentifier {
    suite: String,
    name: String,
}

impl TestIdentifier {
    /// Creates a new `TestIdentifier`.
    pub fn new(suite: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            name: name.into(),
        }
    }

    /// Splits a full test name on its first period.
    ///
    /// A name without a period is reported under [`UNKNOWN_SUITE`].
    pub fn from_full_name(full_name: &str) -> Self {
        match full_name.split_once('.') {
            Some((suite, name)) => Self::new(suite, name),
            None => Self::new(UNKNOWN_SUITE, full_name),
        }
    }

    /// Returns the suite.
    pub fn suite(&self) -> &str {
        &self.suite
    }

    /// Returns the test name within the suite.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if this is the `UnknownSuite.UnknownTest` placeholder.
    pub fn is_unknown(&self) -> bool {
        self.suite == UNKNOWN_SUITE && self.name == UNKNOWN_TEST
    }
}

impl fmt::Display for TestIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.suite, self.name)
    }
}

/// A test that was identified as having crashed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrashedTest {
    /// The test.
    pub test: TestIdentifier,

    /// The output printed after the test started.
    pub excerpt: String,
}

/// The result of diagnosing an attempt's log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnosis {
    /// A crashed test was identified.
    Crashed(CrashedTest),

    /// No crashed test could be identified.
    Unidentified(UnidentifiedReason),
}

/// The reason no crashed test could be identified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnidentifiedReason {
    /// The log file did not exist.
    LogMissing,

    /// The log contained no RUN marker.
    NoRunMarker,

    /// The last test to start also finished.
    EndedCleanly,

    /// The last RUN line did not name a test.
    MalformedRunLine,

    /// The last RUN line named the `UnknownSuite.UnknownTest` placeholder.
    PlaceholderName,
}

impl fmt::Display for UnidentifiedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LogMissing => write!(f, "the log file does not exist"),
            Self::NoRunMarker => write!(f, "no test was started"),
            Self::EndedCleanly => write!(f, "the last test to start also finished"),
            Self::MalformedRunLine => write!(f, "the last RUN line does not name a test"),
            Self::PlaceholderName => write!(
                f,
                "the last RUN line names the placeholder {UNKNOWN_SUITE}.{UNKNOWN_TEST}"
            ),
        }
    }
}

/// Diagnoses the output of a single attempt.
pub fn diagnose_output(output: &str) -> Diagnosis {
    let lines: Vec<&str> = output.split_inclusive('\n').collect();

    let Some(run_index) = lines.iter().rposition(|line| line.contains(RUN_MARKER)) else {
        return Diagnosis::Unidentified(UnidentifiedReason::NoRunMarker);
    };

    let trailing = &lines[run_index + 1..];
    if trailing
        .iter()
        .any(|line| END_MARKERS.iter().any(|marker| line.contains(marker)))
    {
        return Diagnosis::Unidentified(UnidentifiedReason::EndedCleanly);
    }

    let Some(captures) = RUN_LINE_REGEX.captures(lines[run_index]) else {
        return Diagnosis::Unidentified(UnidentifiedReason::MalformedRunLine);
    };

    let test = TestIdentifier::from_full_name(&captures[1]);
    if test.is_unknown() {
        return Diagnosis::Unidentified(UnidentifiedReason::PlaceholderName);
    }

    Diagnosis::Crashed(CrashedTest {
        test,
        excerpt: trailing.concat(),
    })
}

/// Reads the log at `path` and diagnoses it.
///
/// A missing log is not an error: it produces [`UnidentifiedReason::LogMissing`].
pub fn diagnose_log(path: &Utf8Path) -> Result<Diagnosis, DiagnoseError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            debug!("log file {path} does not exist");
            return Ok(Diagnosis::Unidentified(UnidentifiedReason::LogMissing));
        }
        Err(error) => return Err(DiagnoseError::new(path, error)),
    };

    Ok(diagnose_output(&String::from_utf8_lossy(&bytes)))
}
