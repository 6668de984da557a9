// Copyright (c) The crash-retry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! GoogleTest filter expressions, and tracking them across attempts.
//!
//! A filter has the form `<positive>-<neg1>:<neg2>:...`, where either half may be absent. The
//! harness only ever grows the negative half: each crashed test is appended to it so that the next
//! attempt skips it.

use crate::{diagnose::TestIdentifier, errors::FilterPersistError};
use camino::Utf8Path;
use std::{fmt, io::Write, mem};

/// The prefix of the command-line token that carries a filter.
pub const GTEST_FILTER_PREFIX: &str = "--gtest_filter=";

/// A parsed GoogleTest filter.
///
/// Parsing and displaying are lossless, except that the match-everything pattern `*` is normalized
/// to [`GtestFilter::Empty`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum GtestFilter {
    /// No filter: every test runs.
    #[default]
    Empty,

    /// A positive pattern with no exclusions.
    Positive(String),

    /// Exclusions only.
    Negative(Vec<String>),

    /// A positive pattern followed by exclusions.
    Mixed {
        /// The positive pattern.
        positive: String,

        /// The excluded entries.
        negative: Vec<String>,
    },
}

impl GtestFilter {
    /// Parses a filter from the value of a `--gtest_filter=` token.
    pub fn parse(value: &str) -> Self {
        if value.is_empty() || value == "*" {
            return Self::Empty;
        }

        match value.split_once('-') {
            None => Self::Positive(value.to_owned()),
            Some(("", negative)) => Self::Negative(split_negative(negative)),
            Some((positive, negative)) => Self::Mixed {
                positive: positive.to_owned(),
                negative: split_negative(negative),
            },
        }
    }

    /// Returns true if this filter selects every test.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns the positive pattern, if any.
    pub fn positive(&self) -> Option<&str> {
        match self {
            Self::Positive(positive) | Self::Mixed { positive, .. } => Some(positive),
            Self::Empty | Self::Negative(_) => None,
        }
    }

    /// Returns the excluded entries, in the order they were added.
    pub fn negative(&self) -> &[String] {
        match self {
            Self::Negative(negative) | Self::Mixed { negative, .. } => negative,
            Self::Empty | Self::Positive(_) => &[],
        }
    }

    /// Excludes a test from this filter.
    ///
    /// An entry that is already excluded is appended again; GoogleTest accepts repeats.
    pub fn append_exclusion(&mut self, test: &TestIdentifier) {
        let entry = test.to_string();
        *self = match mem::take(self) {
            Self::Empty => Self::Negative(vec![entry]),
            Self::Positive(positive) => Self::Mixed {
                positive,
                negative: vec![entry],
            },
            Self::Negative(mut negative) => {
                negative.push(entry);
                Self::Negative(negative)
            }
            Self::Mixed {
                positive,
                mut negative,
            } => {
                negative.push(entry);
                Self::Mixed { positive, negative }
            }
        };
    }

    /// Returns the command-line token for this filter.
    pub fn to_arg(&self) -> String {
        format!("{GTEST_FILTER_PREFIX}{self}")
    }
}

fn split_negative(negative: &str) -> Vec<String> {
    negative.split(':').map(str::to_owned).collect()
}

impl fmt::Display for GtestFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Positive(positive) => write!(f, "{positive}"),
            Self::Negative(negative) => write!(f, "-{}", negative.join(":")),
            Self::Mixed { positive, negative } => {
                write!(f, "{positive}-{}", negative.join(":"))
            }
        }
    }
}

/// Tracks the filter passed to the child across attempts.
///
/// The command line the harness was invoked with is never modified. Instead,
/// [`compose_argv`](Self::compose_argv) produces a fresh command line for every attempt.
#[derive(Clone, Debug)]
pub struct FilterManager {
    base_argv: Vec<String>,
    filter: GtestFilter,
    filter_arg_index: Option<usize>,
    excluded: Vec<TestIdentifier>,
}

impl FilterManager {
    /// Creates a new `FilterManager` seeded from the child's command line.
    ///
    /// Only the first `--gtest_filter=` token is recognized. A filter of `*` is dropped from the
    /// command line entirely.
    pub fn new(child_argv: &[String]) -> Self {
        let mut base_argv = child_argv.to_vec();
        let mut filter = GtestFilter::Empty;
        let mut filter_arg_index = None;

        if let Some((index, value)) = child_argv
            .iter()
            .enumerate()
            .find_map(|(index, arg)| Some((index, arg.strip_prefix(GTEST_FILTER_PREFIX)?)))
        {
            if value == "*" {
                base_argv.remove(index);
            } else {
                filter = GtestFilter::parse(value);
                filter_arg_index = Some(index);
            }
        }

        Self {
            base_argv,
            filter,
            filter_arg_index,
            excluded: Vec::new(),
        }
    }

    /// Returns the current filter.
    pub fn filter(&self) -> &GtestFilter {
        &self.filter
    }

    /// Returns the tests excluded so far, in the order they crashed.
    pub fn excluded(&self) -> &[TestIdentifier] {
        &self.excluded
    }

    /// Returns the command line for the next attempt.
    ///
    /// If the filter is non-empty, it replaces the original filter token or, if there was none,
    /// is appended to the end.
    pub fn compose_argv(&self) -> Vec<String> {
        let mut argv = self.base_argv.clone();
        if self.filter.is_empty() {
            return argv;
        }

        let arg = self.filter.to_arg();
        match self.filter_arg_index {
            Some(index) => argv[index] = arg,
            None => argv.push(arg),
        }
        argv
    }

    /// Excludes a crashed test from subsequent attempts.
    pub fn append_exclusion(&mut self, test: &TestIdentifier) {
        self.filter.append_exclusion(test);
        self.excluded.push(test.clone());
    }

    /// Overwrites `path` with the current filter.
    pub fn persist(&self, path: &Utf8Path) -> Result<(), FilterPersistError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|error| {
                FilterPersistError::new(path, atomicwrites::Error::Internal(error))
            })?;
        }

        let contents = self.filter.to_string();
        atomicwrites::AtomicFile::new(path, atomicwrites::AllowOverwrite)
            .write(|file| file.write_all(contents.as_bytes()))
            .map_err(|error| FilterPersistError::new(path, error))
    }
}
