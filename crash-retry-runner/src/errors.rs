// Copyright (c) The crash-retry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by crash-retry.

use camino::Utf8PathBuf;
use std::{error, fmt};
use thiserror::Error;

/// An error that occurred while building a [`HarnessConfig`](crate::config::HarnessConfig).
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum HarnessConfigError {
    /// No command was provided to run.
    #[error("no command was specified to run")]
    EmptyCommand,
}

/// An error that occurred while building a [`RetryHarness`](crate::supervisor::RetryHarness).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HarnessBuildError {
    /// An error occurred while creating the Tokio runtime.
    #[error("error creating Tokio runtime")]
    TokioRuntimeCreate(#[source] std::io::Error),

    /// An error occurred while setting up the signal handler.
    #[error(transparent)]
    SignalHandlerSetup(#[from] SignalHandlerSetupError),
}

/// An error occurred while setting up the signal handler.
#[derive(Debug, Error)]
#[error("error setting up signal handler")]
pub struct SignalHandlerSetupError(#[from] std::io::Error);

/// An error that occurred while preparing or running a single attempt of the child.
///
/// Failing to spawn the child is not one of these: that is reported as an attempt that produced
/// no XML.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunChildError {
    /// A parent directory for one of the output files could not be created.
    #[error("failed to create directory `{dir}`")]
    CreateDir {
        /// The directory being created.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// XML output left over from an earlier attempt could not be removed.
    #[error("failed to remove existing XML output at `{path}`")]
    RemoveStaleXml {
        /// The XML output path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The log file could not be opened for writing.
    #[error("failed to open log file `{path}`")]
    OpenLog {
        /// The log file path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// Writing to the log file failed.
    #[error("failed to write to log file `{path}`")]
    WriteLog {
        /// The log file path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The pipe carrying the child's output could not be created.
    #[error("failed to create pipe for child output")]
    CreatePipe(#[source] std::io::Error),

    /// Reading the child's output failed.
    #[error("error reading child output")]
    ReadOutput(#[source] std::io::Error),

    /// Echoing the child's output to our own output failed.
    #[error("error echoing child output")]
    Echo(#[source] std::io::Error),

    /// Waiting for the child to exit failed.
    #[error("error waiting for child process to exit")]
    Wait(#[source] std::io::Error),
}

/// An error that occurred while reading a log file for diagnosis.
#[derive(Debug, Error)]
#[error("failed to read log file `{path}`")]
pub struct DiagnoseError {
    path: Utf8PathBuf,
    #[source]
    error: std::io::Error,
}

impl DiagnoseError {
    pub(crate) fn new(path: impl Into<Utf8PathBuf>, error: std::io::Error) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }
}

/// An error that occurred while writing the filter to the filter file.
#[derive(Debug, Error)]
#[error("failed to write filter to `{path}`")]
pub struct FilterPersistError {
    path: Utf8PathBuf,
    #[source]
    error: atomicwrites::Error<std::io::Error>,
}

impl FilterPersistError {
    pub(crate) fn new(
        path: impl Into<Utf8PathBuf>,
        error: atomicwrites::Error<std::io::Error>,
    ) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }
}

/// An error that occurred while producing the synthesized crash report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CrashReportError {
    /// Serializing the report to XML failed.
    #[error("failed to serialize crash report")]
    Serialize(#[source] quick_xml::Error),

    /// Writing the report to disk failed.
    #[error("failed to write crash report to `{path}`")]
    Write {
        /// The report path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: atomicwrites::Error<std::io::Error>,
    },
}

/// An error that stopped the harness before it reached a verdict.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HarnessError {
    /// Running an attempt failed.
    #[error("attempt {attempt} could not be run")]
    RunChild {
        /// The 1-based attempt number.
        attempt: usize,

        /// The underlying error.
        #[source]
        error: RunChildError,
    },

    /// The log file could not be read.
    #[error(transparent)]
    Diagnose(#[from] DiagnoseError),

    /// The filter could not be persisted.
    #[error(transparent)]
    FilterPersist(#[from] FilterPersistError),

    /// The crash report could not be written.
    #[error(transparent)]
    CrashReport(#[from] CrashReportError),
}

/// Displays an error along with its chain of sources.
#[derive(Clone, Copy, Debug)]
pub struct DisplayErrorChain<E>(E);

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self(error)
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;

        let mut current = self.0.source();
        while let Some(source) = current {
            write!(f, "\n  caused by:\n  - {source}")?;
            current = source.source();
        }

        Ok(())
    }
}
