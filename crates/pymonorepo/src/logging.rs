use std::fmt;

use anstream::ColorChoice;
use anyhow::Context;
use owo_colors::OwoColorize;
use tracing::level_filters::LevelFilter;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use pymonorepo_static::EnvVars;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Level {
    /// Show warnings by default (overridable by `PYMONOREPO_LOG`).
    #[default]
    Default,
    /// Show debug messages by default (overridable by `PYMONOREPO_LOG`).
    Verbose,
    /// Show trace messages and their targets by default (overridable by `PYMONOREPO_LOG`).
    ExtraVerbose,
}

impl Level {
    pub(crate) fn from_verbosity(verbose: u8) -> Self {
        match verbose {
            0 => Self::Default,
            1 => Self::Verbose,
            _ => Self::ExtraVerbose,
        }
    }
}

struct PymonorepoFormat {
    display_target: bool,
}

/// See <https://docs.rs/tracing-subscriber/0.3.18/src/tracing_subscriber/fmt/format/mod.rs.html#1026-1156>
impl<S, N> FormatEvent<S, N> for PymonorepoFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let ansi = writer.has_ansi_escapes();

        let level = meta.level();
        // Same colors as tracing
        if ansi {
            match *level {
                tracing::Level::TRACE => write!(writer, "{} ", level.purple())?,
                tracing::Level::DEBUG => write!(writer, "{} ", level.blue())?,
                tracing::Level::INFO => write!(writer, "{} ", level.green())?,
                tracing::Level::WARN => write!(writer, "{} ", level.yellow())?,
                tracing::Level::ERROR => write!(writer, "{} ", level.red())?,
            }
        } else {
            write!(writer, "{level} ")?;
        }

        if self.display_target {
            if ansi {
                write!(writer, "{} ", meta.target().dimmed())?;
            } else {
                write!(writer, "{} ", meta.target())?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Configure `tracing` based on the given [`Level`], taking into account the `PYMONOREPO_LOG`
/// environment variable.
pub(crate) fn setup_logging(level: Level) -> anyhow::Result<()> {
    let default_directive = match level {
        Level::Default => LevelFilter::WARN,
        Level::Verbose => LevelFilter::DEBUG,
        Level::ExtraVerbose => LevelFilter::TRACE,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(default_directive.into())
        .with_env_var(EnvVars::PYMONOREPO_LOG)
        .from_env()
        .with_context(|| format!("Invalid {} directives", EnvVars::PYMONOREPO_LOG))?;

    let ansi = match anstream::Stderr::choice(&std::io::stderr()) {
        ColorChoice::Always | ColorChoice::AlwaysAnsi => true,
        ColorChoice::Never => false,
        // We just asked anstream for a choice, that can't be auto
        ColorChoice::Auto => unreachable!(),
    };
    let format = PymonorepoFormat {
        display_target: level == Level::ExtraVerbose,
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(format)
                .with_writer(std::io::stderr)
                .with_ansi(ansi)
                .with_filter(filter),
        )
        .init();

    Ok(())
}
