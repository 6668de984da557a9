// Copyright (c) The crash-retry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crash_retry_runner::{
    errors::{DisplayErrorChain, HarnessBuildError, HarnessConfigError, HarnessError},
    exit_codes::HarnessExitCode,
};
use thiserror::Error;
use tracing::error;

// Only HarnessBuildFailed's message is shown; the others are placeholders. Errors are printed
// with display_to_stderr.

/// An error that stopped crash-retry from reaching a verdict about the child.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("invalid invocation")]
    InvocationError {
        #[from]
        err: HarnessConfigError,
    },
    #[error("failed to set up the harness")]
    HarnessBuildFailed {
        #[source]
        err: HarnessBuildError,
    },
    #[error("harness failed")]
    HarnessFailed {
        #[source]
        err: HarnessError,
    },
}

impl ExpectedError {
    pub(crate) fn harness_build_failed(err: HarnessBuildError) -> Self {
        Self::HarnessBuildFailed { err }
    }

    pub(crate) fn harness_failed(err: HarnessError) -> Self {
        Self::HarnessFailed { err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::InvocationError { .. }
            | Self::HarnessBuildFailed { .. }
            | Self::HarnessFailed { .. } => HarnessExitCode::FAILURE,
        }
    }

    /// Logs this error, along with its chain of causes, to stderr.
    pub fn display_to_stderr(&self) {
        match self {
            Self::InvocationError { err } => error!("{err} (see --help for usage)"),
            Self::HarnessBuildFailed { .. } => error!("{}", DisplayErrorChain::new(self)),
            Self::HarnessFailed { err } => error!("{}", DisplayErrorChain::new(err)),
        }
    }
}
