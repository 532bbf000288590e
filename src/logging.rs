use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How the binary talks to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// One-shot commands (generate, cleanup, init)
    Batch,
    /// The edit session, which owns stdin/stdout
    Interactive,
}

/// Initialize logging based on mode
///
/// # Batch mode
/// - stderr logging at `info` unless `RUST_LOG` says otherwise
/// - also appends to `log_file` when given
///
/// # Interactive mode
/// - with `log_file`: file only, so the prompt stays clean
/// - without: stderr, limited to `warn`
pub fn init_logging(mode: LogMode, log_file: Option<&Path>) -> Result<()> {
    match (mode, log_file) {
        (LogMode::Batch, Some(path)) => init_dual_logging(path),
        (LogMode::Batch, None) => init_console_logging("info"),
        (LogMode::Interactive, Some(path)) => init_file_logging(path),
        (LogMode::Interactive, None) => init_console_logging("warn"),
    }
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into())
}

fn open_log(path: &Path) -> Result<std::fs::File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Console-only logging (stderr)
fn init_console_logging(default: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter(default))
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Logging was already initialized")
}

/// File-only logging
fn init_file_logging(path: &Path) -> Result<()> {
    let file = open_log(path)?;
    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(fmt::layer().with_writer(file).with_ansi(false))
        .try_init()
        .context("Logging was already initialized")
}

/// Both console (stderr) and file
fn init_dual_logging(path: &Path) -> Result<()> {
    let file = open_log(path)?;
    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(file).with_ansi(false))
        .try_init()
        .context("Logging was already initialized")
}
