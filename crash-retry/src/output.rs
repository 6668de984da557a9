// Copyright (c) The crash-retry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Color selection and the stderr logger.
//!
//! Everything the harness says about its own progress goes through `tracing` to stderr, one
//! `level: message` line per event. The child's output goes to stdout untouched.

use clap::{
    Args, ValueEnum,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use owo_colors::{OwoColorize, Style, style};
use std::{fmt, sync::Once};
use tracing::{Event, Level, Subscriber, level_filters::LevelFilter};
use tracing_subscriber::{
    Layer,
    filter::{ParseError, Targets},
    fmt::{FmtContext, FormatEvent, FormatFields, format},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// The environment variable read for per-target log levels.
const LOG_ENV: &str = "CRASH_RETRY_LOG";

pub(crate) const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Copy, Clone, Debug, Args)]
#[must_use]
pub(crate) struct OutputOpts {
    /// Log every attempt's exit status and filter writes
    #[arg(long, short, env = "CRASH_RETRY_VERBOSE")]
    pub(crate) verbose: bool,

    /// Produce color output: auto, always, never
    #[arg(
        long,
        value_enum,
        default_value_t,
        hide_possible_values = true,
        value_name = "WHEN",
        env = "CARGO_TERM_COLOR"
    )]
    pub(crate) color: Color,
}

impl OutputOpts {
    pub(crate) fn init(self) -> OutputContext {
        init_logger(self.verbose, self.color.should_colorize());
        OutputContext { color: self.color }
    }
}

#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct OutputContext {
    color: Color,
}

impl OutputContext {
    /// Returns the styles used for highlights within log messages.
    pub fn stderr_styles(&self) -> StderrStyles {
        if self.color.should_colorize() {
            StderrStyles {
                bold: style().bold(),
                warning_text: style().yellow(),
            }
        } else {
            StderrStyles::default()
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
#[must_use]
pub enum Color {
    #[default]
    Auto,
    Always,
    Never,
}

impl Color {
    fn should_colorize(self) -> bool {
        match self {
            Color::Auto => supports_color::on_cached(supports_color::Stream::Stderr).is_some(),
            Color::Always => true,
            Color::Never => false,
        }
    }
}

/// Highlights applied inside harness log messages.
#[derive(Clone, Debug, Default)]
pub struct StderrStyles {
    pub(crate) bold: Style,
    pub(crate) warning_text: Style,
}

static INIT_LOGGER: Once = Once::new();

fn init_logger(verbose: bool, colorize: bool) {
    INIT_LOGGER.call_once(|| {
        let value = std::env::var(LOG_ENV).ok();
        let (targets, parse_error) = log_targets(value.as_deref(), verbose);

        let layer = tracing_subscriber::fmt::layer()
            .event_format(LevelPrefixFormat { colorize })
            .with_writer(std::io::stderr)
            .with_filter(targets);
        tracing_subscriber::registry().with(layer).init();

        if let (Some(value), Some(error)) = (value, parse_error) {
            tracing::warn!("ignoring invalid {LOG_ENV} value `{value}`: {error}");
        }
    });
}

/// Returns the log filter for `value`, falling back to a single default level when it is unset,
/// empty, or invalid.
fn log_targets(value: Option<&str>, verbose: bool) -> (Targets, Option<ParseError>) {
    let default_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let fallback = || Targets::new().with_default(default_level);

    match value.filter(|value| !value.is_empty()) {
        None => (fallback(), None),
        Some(value) => match value.parse::<Targets>() {
            Ok(targets) => (targets, None),
            Err(error) => (fallback(), Some(error)),
        },
    }
}

/// Prefixes each event with its level, then writes its fields. Multi-line messages such as error
/// chains are written as-is.
struct LevelPrefixFormat {
    colorize: bool,
}

impl LevelPrefixFormat {
    fn heading(&self, level: Level) -> (&'static str, Style) {
        let (label, color) = match level {
            Level::ERROR => ("error", style().red().bold()),
            Level::WARN => ("warning", style().yellow().bold()),
            Level::INFO => ("info", style().bold()),
            Level::DEBUG => ("debug", style().bold()),
            Level::TRACE => ("trace", style().dimmed()),
        };
        (label, if self.colorize { color } else { Style::new() })
    }
}

impl<S, N> FormatEvent<S, N> for LevelPrefixFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let (label, color) = self.heading(*event.metadata().level());
        write!(writer, "{}: ", label.style(color))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
