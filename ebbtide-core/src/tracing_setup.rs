//! Tracing setup: console output at the user's chosen level plus a full
//! trace log on disk, so post-mortems never depend on the verbosity a run
//! happened to be started with.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

const LOGS_DIR: &str = "logs";
const LOG_FILE: &str = "ebbtide-last-run.log";

/// Installs the global subscriber and returns the path of the trace log.
///
/// The console layer honors `RUST_LOG` when set, otherwise `console_level`.
/// The file layer always captures trace, overwriting the previous run's log.
///
/// # Errors
///
/// Fails if the log file cannot be created or a subscriber is already
/// installed.
pub fn init_tracing(console_level: Level) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let logs_dir = Path::new(LOGS_DIR);
    create_dir_all(logs_dir)?;
    let log_path = logs_dir.join(LOG_FILE);
    let log_file = File::create(&log_path)?;

    let console_layer = fmt::layer().with_target(true).with_filter(
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(console_level.to_string())),
    );

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(EnvFilter::new("trace"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!(console = %console_level, file = %log_path.display(), "tracing initialized");
    Ok(log_path)
}

/// Console log levels selectable from the CLI.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliLogLevel {
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Informational, warning, and error messages
    Info,
    /// Debug, informational, warning, and error messages
    Debug,
    /// All messages including detailed tracing
    Trace,
}

impl CliLogLevel {
    /// Converts CLI log level to tracing Level enum.
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}
