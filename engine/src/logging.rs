//! Process-wide `tracing` subscriber setup.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use dataverse_config::LoggingConfig;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Where log output ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
    /// A global subscriber was already installed; nothing changed.
    AlreadyInitialized,
}

/// Install a subscriber filtered by `RUST_LOG`, else `config.level()`.
///
/// With `config.file` set, output is appended there without ANSI colors;
/// otherwise it goes to stderr. Calling this again after a subscriber is
/// installed is a no-op.
pub fn init_tracing(config: &LoggingConfig) -> Result<LogTarget> {
    let level = config.level();
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .with_context(|| format!("invalid log level `{level}`"))?;

    let (target, installed) = match &config.file {
        Some(path) => {
            let file = open_log_file(path)?;
            let installed = tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(env_filter)
                .try_init()
                .is_ok();
            (LogTarget::File(path.clone()), installed)
        }
        None => {
            let installed = tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(env_filter)
                .try_init()
                .is_ok();
            (LogTarget::Stderr, installed)
        }
    };

    if !installed {
        return Ok(LogTarget::AlreadyInitialized);
    }
    tracing::info!(level = %level, target = ?target, "Logging initialized");
    Ok(target)
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log dir {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}
