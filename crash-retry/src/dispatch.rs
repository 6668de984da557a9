// Copyright (c) The crash-retry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    output::{OutputContext, OutputOpts},
    reporter::HarnessReporter,
};
use camino::Utf8PathBuf;
use clap::{Args, Parser};
use crash_retry_runner::{
    config::{DEFAULT_MAX_RETRIES, HarnessConfig},
    exit_codes::HarnessExitCode,
    supervisor::RetryHarnessBuilder,
};

/// Runs a GoogleTest binary, retrying without the tests it crashes in.
///
/// The child must write its JUnit XML output to --xml_output_file when it completes. An attempt
/// that doesn't is treated as a crash: the test that was running is excluded through
/// --gtest_filter, and the child is run again.
#[derive(Debug, Parser)]
#[command(
    name = "crash-retry",
    version,
    styles = crate::output::CLAP_STYLES,
    max_term_width = 100
)]
pub struct CrashRetryApp {
    #[clap(flatten)]
    output: OutputOpts,

    #[clap(flatten)]
    harness: HarnessOpts,
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Harness options")]
struct HarnessOpts {
    /// JUnit XML file the child writes on completion
    ///
    /// Written by crash-retry if every attempt crashes.
    #[arg(
        long = "xml_output_file",
        value_name = "PATH",
        env = "CRASH_RETRY_XML_OUTPUT_FILE"
    )]
    xml_output_file: Utf8PathBuf,

    /// File the child's combined output is written to
    #[arg(long = "log_file", value_name = "PATH", env = "CRASH_RETRY_LOG_FILE")]
    log_file: Utf8PathBuf,

    /// Number of times to re-run the child after a crash
    #[arg(
        long = "max_retries",
        value_name = "N",
        default_value_t = DEFAULT_MAX_RETRIES,
        env = "CRASH_RETRY_MAX_RETRIES"
    )]
    max_retries: usize,

    /// File the current filter is written to after every crash
    #[arg(long = "filter_file", value_name = "PATH", env = "CRASH_RETRY_FILTER_FILE")]
    filter_file: Option<Utf8PathBuf>,

    /// The test binary and its arguments
    #[arg(
        value_name = "COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    command: Vec<String>,
}

impl HarnessOpts {
    fn to_config(&self) -> Result<HarnessConfig, ExpectedError> {
        let mut config = HarnessConfig::new(
            self.xml_output_file.clone(),
            self.log_file.clone(),
            self.command.iter().cloned(),
        )?;
        config.set_max_retries(self.max_retries);
        if let Some(filter_file) = &self.filter_file {
            config.set_filter_file(filter_file.clone());
        }
        Ok(config)
    }
}

impl CrashRetryApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the exit code to use.
    pub fn exec(self, output: OutputContext) -> Result<i32, ExpectedError> {
        let config = self.harness.to_config()?;

        let harness = RetryHarnessBuilder::default()
            .build(&config)
            .map_err(ExpectedError::harness_build_failed)?;

        let mut reporter = HarnessReporter::new(output.stderr_styles());
        let summary = harness
            .execute(std::io::stdout().lock(), |event| reporter.report_event(&event))
            .map_err(ExpectedError::harness_failed)?;
        reporter.report_summary(&summary);

        Ok(summary.exit_code())
    }
}

/// The entry point for the crash-retry binary.
pub fn main_impl() -> ! {
    match CrashRetryApp::try_parse() {
        Ok(app) => {
            let output = app.init_output();
            match app.exec(output) {
                Ok(code) => std::process::exit(code),
                Err(error) => {
                    error.display_to_stderr();
                    std::process::exit(error.process_exit_code())
                }
            }
        }
        Err(err) => std::process::exit(handle_clap_error(err)),
    }
}

/// Prints a clap error and returns the exit code to use.
///
/// Usage errors exit with the harness's failure code rather than clap's default of 2.
fn handle_clap_error(err: clap::Error) -> i32 {
    use clap::error::ErrorKind;

    let _ = err.print();
    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        | ErrorKind::DisplayVersion => 0,
        _ => HarnessExitCode::FAILURE,
    }
}
