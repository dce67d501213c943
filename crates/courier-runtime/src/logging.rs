//! Logging setup for Courier nodes.
//!
//! Built on `tracing-subscriber`, configured either from a [`LoggingConfig`]
//! or by hand through [`LoggingBuilder`]. `RUST_LOG`, when set, replaces the
//! configured base level.
//!
//! The dispatcher wraps every call in a `dispatch` span carrying the
//! request's address and protocol. Enabling [`SpanEvents::LIFECYCLE`] logs
//! when each call starts and how long it took.
//!
//! ```rust,ignore
//! use courier_runtime::logging::{LoggingBuilder, SpanEvents};
//!
//! LoggingBuilder::new()
//!     .directive("courier_core=debug")
//!     .span_events(SpanEvents::LIFECYCLE)
//!     .init();
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::Registry;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::config::{LogFormat, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

/// Span lifecycle events written as log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanEvents {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    /// Includes the span's busy and idle time.
    pub close: bool,
}

impl SpanEvents {
    pub const NONE: Self = Self {
        new: false,
        enter: false,
        exit: false,
        close: false,
    };

    /// Open and close of each span, enough to time a dispatch.
    pub const LIFECYCLE: Self = Self {
        new: true,
        close: true,
        ..Self::NONE
    };

    pub const FULL: Self = Self {
        new: true,
        enter: true,
        exit: true,
        close: true,
    };

    fn to_fmt_span(self) -> FmtSpan {
        [
            (self.new, FmtSpan::NEW),
            (self.enter, FmtSpan::ENTER),
            (self.exit, FmtSpan::EXIT),
            (self.close, FmtSpan::CLOSE),
        ]
        .into_iter()
        .filter(|(on, _)| *on)
        .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
    }
}

impl From<&SpanEventConfig> for SpanEvents {
    fn from(events: &SpanEventConfig) -> Self {
        Self {
            new: events.new,
            enter: events.enter,
            exit: events.exit,
            close: events.close,
        }
    }
}

/// Installs the global subscriber described by `config`.
///
/// A subscriber installed earlier is left in place.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

/// Extra fields printed on every line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineFields {
    target: bool,
    thread_ids: bool,
    source_location: bool,
}

/// Configures and installs the global tracing subscriber.
#[derive(Debug)]
pub struct LoggingBuilder {
    level: Level,
    directives: Vec<String>,
    format: LogFormat,
    span_events: SpanEvents,
    fields: LineFields,
    output: LogOutput,
    rotation: LogRotation,
    file_path: Option<PathBuf>,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    /// Compact `info` lines with targets, on stdout.
    pub fn new() -> Self {
        Self {
            level: Level::INFO,
            directives: Vec::new(),
            format: LogFormat::default(),
            span_events: SpanEvents::NONE,
            fields: LineFields {
                target: true,
                thread_ids: false,
                source_location: false,
            },
            output: LogOutput::default(),
            rotation: LogRotation::default(),
            file_path: None,
        }
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        let directives = config
            .filters
            .iter()
            .map(|(module, level)| format!("{module}={level}"))
            .collect();

        Self {
            level: config.level.to_tracing_level(),
            directives,
            format: config.format,
            span_events: SpanEvents::from(&config.span_events),
            fields: LineFields {
                target: true,
                thread_ids: config.thread_ids,
                source_location: config.file_location,
            },
            output: config.output,
            rotation: config.rotation,
            file_path: config.file_path.clone(),
        }
    }

    /// Base level, used when `RUST_LOG` is unset.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Adds a filter directive such as `courier_transport=trace`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Log file used with [`LogOutput::File`].
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.fields.target = enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.fields.thread_ids = enabled;
        self
    }

    /// Prints the source file and line of each event.
    pub fn with_source_location(mut self, enabled: bool) -> Self {
        self.fields.source_location = enabled;
        self
    }

    /// `RUST_LOG` if set, else the base level; directives go on top.
    /// Directives that fail to parse are skipped.
    fn filter(&self) -> EnvFilter {
        let base = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str().to_lowercase()));

        self.directives
            .iter()
            .filter_map(|d| d.parse::<Directive>().ok())
            .fold(base, |filter, d| filter.add_directive(d))
    }

    /// The writer for the configured output and whether a requested file
    /// had to fall back to stdout.
    fn writer(&self) -> (BoxMakeWriter, bool) {
        match (self.output, self.file_path.as_deref()) {
            (LogOutput::Stdout, _) => (BoxMakeWriter::new(std::io::stdout), false),
            (LogOutput::Stderr, _) => (BoxMakeWriter::new(std::io::stderr), false),
            (LogOutput::File, Some(path)) => {
                (BoxMakeWriter::new(file_appender(path, self.rotation)), false)
            }
            (LogOutput::File, None) => (BoxMakeWriter::new(std::io::stdout), true),
        }
    }

    fn fmt_layer(&self, writer: BoxMakeWriter) -> Box<dyn Layer<Registry> + Send + Sync> {
        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(self.span_events.to_fmt_span())
            .with_target(self.fields.target)
            .with_thread_ids(self.fields.thread_ids)
            .with_file(self.fields.source_location)
            .with_line_number(self.fields.source_location);

        match self.format {
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Full => layer.boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            // Json lands here when `json-log` is off.
            _ => layer.compact().boxed(),
        }
    }

    /// Installs the subscriber, ignoring failure.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Installs the subscriber. Fails if one is already set.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let (writer, fell_back) = self.writer();

        tracing_subscriber::registry()
            .with(self.fmt_layer(writer))
            .with(self.filter())
            .try_init()?;

        if fell_back {
            tracing::warn!("file output selected without logging.file_path, writing to stdout");
        }
        Ok(())
    }
}

fn file_appender(path: &Path, rotation: LogRotation) -> RollingFileAppender {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path.file_name().unwrap_or_else(|| OsStr::new("courier.log"));
    let rotation = match rotation {
        LogRotation::Never => Rotation::NEVER,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
    };
    RollingFileAppender::new(rotation, dir, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_span_events_flags() {
        assert_eq!(SpanEvents::NONE.to_fmt_span(), FmtSpan::NONE);
        assert_eq!(
            SpanEvents::LIFECYCLE.to_fmt_span(),
            FmtSpan::NEW | FmtSpan::CLOSE
        );
        assert_eq!(SpanEvents::FULL.to_fmt_span(), FmtSpan::FULL);
    }

    #[test]
    fn test_builder_from_config() {
        let mut config = LoggingConfig::default();
        config.level = LogLevel::Debug;
        config.format = LogFormat::Pretty;
        config.file_location = true;
        config.filters.insert("courier_core".into(), LogLevel::Trace);

        let builder = LoggingBuilder::from_config(&config);

        assert_eq!(builder.level, Level::DEBUG);
        assert_eq!(builder.format, LogFormat::Pretty);
        assert!(builder.fields.source_location);
        assert!(!builder.fields.thread_ids);
        assert_eq!(builder.directives, vec!["courier_core=trace"]);
    }
}
