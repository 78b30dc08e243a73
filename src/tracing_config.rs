//! Tracing configuration for the CLI
//!
//! The library only emits trace events; the CLI configures the subscriber.
//! A console layer is always installed, and the training command adds a
//! rotating file layer that persists errors across runs.

use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

/// Subscriber configuration built from CLI flags
#[derive(Debug, Default)]
pub struct TracingConfig {
    /// Verbosity level (maps to log levels)
    pub verbosity: u8,
    /// Rotating error log destination: (directory, file name prefix)
    pub error_log: Option<(PathBuf, String)>,
}

impl TracingConfig {
    /// Create a new tracing configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity level (0-2+)
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Add a rotating error log in `dir` with the given file name prefix
    #[must_use]
    pub fn with_error_log<P: Into<PathBuf>, S: Into<String>>(mut self, dir: P, name: S) -> Self {
        self.error_log = Some((dir.into(), name.into()));
        self
    }

    /// Convert verbosity level to a tracing filter string
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",  // Default: informational messages and above
            1 => "debug", // -v: internal state and computations
            _ => "trace", // -vv+: extremely detailed traces
        }
    }

    /// Initialize the global tracing subscriber
    ///
    /// Returns the worker guard of the rotating log writer, which must stay
    /// alive for buffered error records to reach the file.
    ///
    /// # Errors
    ///
    /// Returns an error when the filter cannot be parsed or a subscriber is
    /// already installed.
    pub fn init(self) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
        use tracing_subscriber::fmt;

        let filter = EnvFilter::try_new(self.verbosity_to_filter())?;
        let registry = Registry::default().with(filter);

        let console_layer = fmt::layer()
            .with_ansi(true)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_file(false)
            .with_line_number(false)
            .with_level(true)
            .compact();

        match self.error_log {
            Some((dir, name)) => {
                use tracing_appender::{non_blocking, rolling};

                let file_appender = rolling::daily(&dir, &name);
                let (file_writer, guard) = non_blocking(file_appender);
                let file_layer = fmt::layer()
                    .with_ansi(false)
                    .with_writer(file_writer)
                    .compact()
                    .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

                registry.with(console_layer).with(file_layer).init();
                Ok(Some(guard))
            },
            None => {
                registry.with(console_layer).init();
                Ok(None)
            },
        }
    }
}
