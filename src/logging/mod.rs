pub mod config;
pub mod layers;

pub use config::LoggingConfig;

use crate::logging::layers::file;
use crate::Result;
use anyhow::{anyhow, Context};
use serde::Deserialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::Subscriber;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::{self as tracing_fmt, format, writer::BoxMakeWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::{LookupSpan, Registry};

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Sink for human-readable log lines.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleOutput {
    Stdout,
    #[default]
    Stderr,
    None,
}

impl ConsoleOutput {
    const ALL: [ConsoleOutput; 3] = [
        ConsoleOutput::Stdout,
        ConsoleOutput::Stderr,
        ConsoleOutput::None,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConsoleOutput::Stdout => "stdout",
            ConsoleOutput::Stderr => "stderr",
            ConsoleOutput::None => "none",
        }
    }

    /// Sink used by a command. Log lines never share stdout with workflow output, so a
    /// stdout sink falls back to stderr for commands that print a result.
    pub fn for_command(self, prints_output: bool) -> ConsoleOutput {
        match self {
            ConsoleOutput::Stdout if prints_output => ConsoleOutput::Stderr,
            other => other,
        }
    }

    fn make_writer(self) -> BoxMakeWriter {
        match self {
            ConsoleOutput::Stdout => BoxMakeWriter::new(io::stdout),
            ConsoleOutput::Stderr => BoxMakeWriter::new(io::stderr),
            ConsoleOutput::None => BoxMakeWriter::new(io::sink),
        }
    }
}

impl fmt::Display for ConsoleOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsoleOutput {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|output| output.as_str() == wanted)
            .ok_or_else(|| {
                format!("unknown console output '{}' (expected stdout, stderr or none)", value)
            })
    }
}

type ConsoleFmtLayer<S> =
    tracing_fmt::Layer<S, format::DefaultFields, format::Format<format::Compact>, BoxMakeWriter>;

fn console_layer<S>(output: ConsoleOutput) -> ConsoleFmtLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_fmt::layer()
        .compact()
        .with_writer(output.make_writer())
        .with_ansi(false)
        .with_target(false)
}

/// Keeps logging sinks alive for the duration of the process.
pub struct LoggingGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
    console_output: ConsoleOutput,
    log_file_path: Option<PathBuf>,
}

impl LoggingGuard {
    /// Console sink selected during initialization.
    pub fn console_output(&self) -> ConsoleOutput {
        self.console_output
    }

    /// Log file written by the file sink, when enabled.
    pub fn log_file_path(&self) -> Option<&Path> {
        self.log_file_path.as_deref()
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `logging.default_level`. `prints_output` marks commands
/// that write their result to stdout. Errors when called more than once per process.
pub fn init(
    config: &LoggingConfig,
    base_dir: Option<&Path>,
    prints_output: bool,
) -> Result<LoggingGuard> {
    if LOGGER_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(anyhow!("logging already initialized"));
    }

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_level))
        .context("failed to configure tracing level")?;

    let log_file_path = if config.enable_file {
        Some(file::log_file_path(config, base_dir)?)
    } else {
        None
    };

    type FileSubscriber = file::FileLayerStack<Registry>;

    let (file_layer, file_guard) = file::file_layer::<Registry>(log_file_path.as_deref())?;
    let console_output = config
        .console_output
        .unwrap_or_default()
        .for_command(prints_output);
    let console_layer = console_layer::<FileSubscriber>(console_output);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(env_filter)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
        console_output,
        log_file_path,
    })
}
