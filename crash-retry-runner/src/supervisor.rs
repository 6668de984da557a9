// Copyright (c) The crash-retry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The retry loop.
//!
//! A harness run is a sequence of attempts. Each attempt runs the child with the current filter.
//! If the child writes its XML output, the run is over. Otherwise the log is diagnosed, the
//! crashed test is excluded, and the child is run again, until the retry budget is used up.

use crate::{
    config::HarnessConfig,
    diagnose::{self, Diagnosis, TestIdentifier, UnidentifiedReason},
    errors::{HarnessBuildError, HarnessError},
    exit_codes::HarnessExitCode,
    gtest_filter::{FilterManager, GtestFilter},
    junit::CrashReport,
    signal::{ShutdownEvent, SignalHandler, SignalHandlerKind},
    test_command::{self, ChildExit},
};
use camino::Utf8Path;
use std::io::{self, Write};
use tokio::runtime::Runtime;
use tracing::debug;

/// Builds a [`RetryHarness`].
#[derive(Clone, Debug, Default)]
pub struct RetryHarnessBuilder {
    signal_handler: SignalHandlerKind,
}

impl RetryHarnessBuilder {
    /// Sets the kind of signal handling to use. Defaults to [`SignalHandlerKind::Standard`].
    pub fn set_signal_handler(&mut self, signal_handler: SignalHandlerKind) -> &mut Self {
        self.signal_handler = signal_handler;
        self
    }

    /// Creates a new harness for `config`.
    pub fn build(self, config: &HarnessConfig) -> Result<RetryHarness<'_>, HarnessBuildError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(HarnessBuildError::TokioRuntimeCreate)?;
        let _guard = runtime.enter();

        // signal_handler.build() must be called from within the guard.
        let signal_handler = self.signal_handler.build()?;

        Ok(RetryHarness {
            config,
            runtime,
            signal_handler,
        })
    }
}

/// Runs a child until it produces XML output, crashes in a way that can't be diagnosed, or runs
/// out of retries.
///
/// Created using [`RetryHarnessBuilder::build`].
#[derive(Debug)]
pub struct RetryHarness<'a> {
    config: &'a HarnessConfig,
    runtime: Runtime,
    signal_handler: SignalHandler,
}

impl RetryHarness<'_> {
    /// Executes the harness.
    ///
    /// The child's output is teed to `echo` as well as to the log file. Progress is reported
    /// through `callback`.
    pub fn execute<W, F>(
        self,
        mut echo: W,
        mut callback: F,
    ) -> Result<HarnessSummary, HarnessError>
    where
        W: Write,
        F: FnMut(HarnessEvent<'_>),
    {
        let Self {
            config,
            runtime,
            mut signal_handler,
        } = self;
        let _guard = runtime.enter();

        runtime.block_on(run_attempts(
            config,
            &mut echo,
            &mut signal_handler,
            &mut callback,
        ))
    }
}

async fn run_attempts<F>(
    config: &HarnessConfig,
    echo: &mut dyn Write,
    signal_handler: &mut SignalHandler,
    callback: &mut F,
) -> Result<HarnessSummary, HarnessError>
where
    F: FnMut(HarnessEvent<'_>),
{
    let mut filter = FilterManager::new(config.child_argv());
    let max_attempts = config.max_attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let run_child_error = |error| HarnessError::RunChild { attempt, error };

        let argv = filter.compose_argv();
        callback(HarnessEvent::AttemptStarted {
            attempt,
            max_attempts,
            argv: &argv,
        });

        test_command::prepare_attempt(config.xml_output_path()).map_err(run_child_error)?;
        let exit = test_command::run_child(&argv, config.log_path(), echo, signal_handler)
            .await
            .map_err(run_child_error)?;

        let exit_code = match exit {
            ChildExit::Exited(code) => Some(code),
            ChildExit::SpawnFailed(error) => {
                callback(HarnessEvent::SpawnFailed {
                    attempt,
                    program: &argv[0],
                    error: &error,
                });
                None
            }
            ChildExit::Interrupted(event) => {
                callback(HarnessEvent::Interrupted { attempt, event });
                return Ok(HarnessSummary::new(
                    HarnessOutcome::Interrupted { event },
                    attempt,
                    filter,
                ));
            }
        };

        let xml_present = test_command::attempt_succeeded(config.xml_output_path());
        callback(HarnessEvent::AttemptFinished {
            attempt,
            exit_code,
            xml_present,
        });

        if xml_present {
            // The XML can only be present if the child was spawned.
            let exit_code = exit_code.unwrap_or(HarnessExitCode::FAILURE);
            return Ok(HarnessSummary::new(
                HarnessOutcome::Passed { exit_code },
                attempt,
                filter,
            ));
        }

        let crashed = match diagnose::diagnose_log(config.log_path())? {
            Diagnosis::Crashed(crashed) => crashed,
            Diagnosis::Unidentified(reason) => {
                callback(HarnessEvent::UnidentifiedCrash { attempt, reason });
                return Ok(HarnessSummary::new(
                    HarnessOutcome::UnidentifiedCrash { reason },
                    attempt,
                    filter,
                ));
            }
        };

        filter.append_exclusion(&crashed.test);
        callback(HarnessEvent::CrashDiagnosed {
            attempt,
            test: &crashed.test,
            filter: filter.filter(),
        });

        if let Some(path) = config.filter_file() {
            filter.persist(path)?;
            callback(HarnessEvent::FilterPersisted {
                path,
                filter: filter.filter(),
            });
        }

        // Every attempt so far has crashed, so the attempt number is also the number of retries
        // used up.
        if attempt > config.max_retries() {
            // The log is not written to after the attempt, so the diagnosis above is also the
            // diagnosis of the most recent log.
            CrashReport::new(&crashed.test, &crashed.excerpt)
                .write_to_path(config.xml_output_path())?;
            callback(HarnessEvent::RetriesExhausted {
                attempts: attempt,
                test: &crashed.test,
                xml_output_path: config.xml_output_path(),
            });
            return Ok(HarnessSummary::new(
                HarnessOutcome::RetriesExhausted { test: crashed.test },
                attempt,
                filter,
            ));
        }

        debug!("retrying without {}", crashed.test);
    }
}

/// A progress event reported by [`RetryHarness::execute`].
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum HarnessEvent<'a> {
    /// An attempt is about to start.
    AttemptStarted {
        /// The 1-based attempt number.
        attempt: usize,

        /// The most attempts that will be made.
        max_attempts: usize,

        /// The command line the child is run with.
        argv: &'a [String],
    },

    /// The child could not be started. The attempt is treated as having produced no XML.
    SpawnFailed {
        /// The attempt number.
        attempt: usize,

        /// The program that could not be started.
        program: &'a str,

        /// The error returned by the operating system.
        error: &'a io::Error,
    },

    /// An attempt finished.
    AttemptFinished {
        /// The attempt number.
        attempt: usize,

        /// The child's exit code, or `None` if it could not be started.
        exit_code: Option<i32>,

        /// Whether the child wrote its XML output.
        xml_present: bool,
    },

    /// A crashed test was identified and excluded from subsequent attempts.
    CrashDiagnosed {
        /// The attempt number.
        attempt: usize,

        /// The crashed test.
        test: &'a TestIdentifier,

        /// The filter after excluding the test.
        filter: &'a GtestFilter,
    },

    /// The filter was written to the filter file.
    FilterPersisted {
        /// The filter file.
        path: &'a Utf8Path,

        /// The filter that was written.
        filter: &'a GtestFilter,
    },

    /// The child crashed, but the crashed test could not be identified.
    UnidentifiedCrash {
        /// The attempt number.
        attempt: usize,

        /// Why no test could be identified.
        reason: UnidentifiedReason,
    },

    /// Every attempt crashed. A report for the last crash was written.
    RetriesExhausted {
        /// The number of attempts made.
        attempts: usize,

        /// The test that crashed in the final attempt.
        test: &'a TestIdentifier,

        /// Where the report was written.
        xml_output_path: &'a Utf8Path,
    },

    /// A shutdown signal was received and the child was killed.
    Interrupted {
        /// The attempt number.
        attempt: usize,

        /// The signal that was received.
        event: ShutdownEvent,
    },
}

/// How a harness run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HarnessOutcome {
    /// The child wrote its XML output.
    Passed {
        /// The child's exit code.
        exit_code: i32,
    },

    /// The child crashed and the crashed test could not be identified.
    UnidentifiedCrash {
        /// Why no test could be identified.
        reason: UnidentifiedReason,
    },

    /// Every attempt crashed.
    RetriesExhausted {
        /// The test that crashed in the final attempt.
        test: TestIdentifier,
    },

    /// A shutdown signal was received.
    Interrupted {
        /// The signal.
        event: ShutdownEvent,
    },
}

/// A summary of a harness run.
#[derive(Clone, Debug)]
pub struct HarnessSummary {
    /// How the run ended.
    pub outcome: HarnessOutcome,

    /// The number of attempts made.
    pub attempts: usize,

    /// The tests excluded over the course of the run, in the order they crashed.
    pub excluded: Vec<TestIdentifier>,

    /// The filter in effect at the end of the run.
    pub final_filter: GtestFilter,
}

impl HarnessSummary {
    fn new(outcome: HarnessOutcome, attempts: usize, filter: FilterManager) -> Self {
        Self {
            outcome,
            attempts,
            excluded: filter.excluded().to_vec(),
            final_filter: filter.filter().clone(),
        }
    }

    /// Returns the exit code the harness should exit with.
    pub fn exit_code(&self) -> i32 {
        match &self.outcome {
            HarnessOutcome::Passed { exit_code } => *exit_code,
            HarnessOutcome::UnidentifiedCrash { .. } | HarnessOutcome::RetriesExhausted { .. } => {
                HarnessExitCode::FAILURE
            }
            HarnessOutcome::Interrupted { event } => event.exit_code(),
        }
    }
}
