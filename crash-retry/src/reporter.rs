// Copyright (c) The crash-retry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Renders harness progress to stderr through `tracing`.

use crate::output::StderrStyles;
use crash_retry_runner::supervisor::{HarnessEvent, HarnessOutcome, HarnessSummary};
use owo_colors::OwoColorize;
use tracing::{Level, debug, error, info, warn};

#[derive(Debug)]
pub(crate) struct HarnessReporter {
    styles: StderrStyles,
}

impl HarnessReporter {
    pub(crate) fn new(styles: StderrStyles) -> Self {
        Self { styles }
    }

    pub(crate) fn report_event(&mut self, event: &HarnessEvent<'_>) {
        if let Some((level, message)) = self.format_event(event) {
            log(level, &message);
        }
    }

    pub(crate) fn report_summary(&mut self, summary: &HarnessSummary) {
        let (level, message) = self.format_summary(summary);
        log(level, &message);
    }

    fn format_event(&self, event: &HarnessEvent<'_>) -> Option<(Level, String)> {
        let bold = self.styles.bold;
        let message = match event {
            HarnessEvent::AttemptStarted {
                attempt,
                max_attempts,
                argv,
            } => (
                Level::INFO,
                format!(
                    "attempt {attempt}/{max_attempts}: running `{}`",
                    shell_words::join(argv.iter()).style(bold),
                ),
            ),
            HarnessEvent::SpawnFailed {
                attempt,
                program,
                error,
            } => (
                Level::WARN,
                format!(
                    "attempt {attempt}: failed to start `{}`: {error}",
                    program.style(bold)
                ),
            ),
            HarnessEvent::AttemptFinished {
                attempt,
                exit_code,
                xml_present,
            } => {
                let exit_code = match exit_code {
                    Some(code) => code.to_string(),
                    None => "none".to_owned(),
                };
                (
                    Level::DEBUG,
                    format!(
                        "attempt {attempt} finished (exit code: {exit_code}, XML output {})",
                        if *xml_present { "present" } else { "missing" },
                    ),
                )
            }
            HarnessEvent::CrashDiagnosed {
                attempt,
                test,
                filter,
            } => (
                Level::WARN,
                format!(
                    "attempt {attempt} crashed in {}, excluding it (filter is now `{}`)",
                    test.style(bold),
                    filter.style(bold),
                ),
            ),
            HarnessEvent::FilterPersisted { path, filter } => (
                Level::DEBUG,
                format!("wrote filter `{filter}` to {path}"),
            ),
            HarnessEvent::UnidentifiedCrash { attempt, reason } => (
                Level::ERROR,
                format!(
                    "attempt {attempt} did not produce XML output, \
                     and the crashed test could not be identified: {reason}"
                ),
            ),
            HarnessEvent::RetriesExhausted {
                attempts,
                test,
                xml_output_path,
            } => (
                Level::ERROR,
                format!(
                    "all {attempts} attempts crashed; wrote a crash report for {} to {}",
                    test.style(bold),
                    xml_output_path.style(bold),
                ),
            ),
            HarnessEvent::Interrupted { attempt, event } => (
                Level::WARN,
                format!("received {event} during attempt {attempt}, child was killed"),
            ),
            _ => return None,
        };
        Some(message)
    }

    fn format_summary(&self, summary: &HarnessSummary) -> (Level, String) {
        let level = match summary.outcome {
            HarnessOutcome::Passed { .. } => Level::INFO,
            _ => Level::DEBUG,
        };

        let mut message = format!(
            "finished after {} {} with exit code {}",
            summary.attempts,
            plural(summary.attempts, "attempt", "attempts"),
            summary.exit_code(),
        );
        if !summary.excluded.is_empty() {
            let excluded: Vec<String> = summary
                .excluded
                .iter()
                .map(|test| test.style(self.styles.warning_text).to_string())
                .collect();
            message = format!(
                "{message}; excluded {} crashed {}: {}",
                excluded.len(),
                plural(excluded.len(), "test", "tests"),
                excluded.join(" "),
            );
        }
        if !summary.final_filter.is_empty() {
            message = format!(
                "{message} (final filter `{}`)",
                summary.final_filter.style(self.styles.bold),
            );
        }

        (level, message)
    }
}

fn plural(count: usize, singular: &'static str, plural: &'static str) -> &'static str {
    if count == 1 { singular } else { plural }
}

fn log(level: Level, message: &str) {
    match level {
        Level::ERROR => error!("{message}"),
        Level::WARN => warn!("{message}"),
        Level::INFO => info!("{message}"),
        _ => debug!("{message}"),
    }
}
