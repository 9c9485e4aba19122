//! Diagnostics setup.
//!
//! Diagnostics go to stderr by default so stdout carries only answers.
//! `RUST_LOG` overrides the level chosen here.

use std::fs::{self, File};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Where diagnostics are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// Truncated on each run.
    File(PathBuf),
}

fn env_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "warn,db_ask=debug" } else { "warn,db_ask=info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Installs the global subscriber. A file that cannot be created falls back
/// to stderr with a warning.
pub fn init(target: LogTarget, verbose: bool) {
    let file = match target {
        LogTarget::Stderr => None,
        LogTarget::File(path) => match open_log_file(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("Warning: Could not create log file {}: {e}", path.display());
                None
            }
        },
    };

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(verbose));
    match file {
        Some(file) => builder.with_writer(file).with_ansi(false).init(),
        None => builder.with_writer(std::io::stderr).init(),
    }
}

fn open_log_file(path: &std::path::Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    File::create(path)
}

/// `~/.local/state/db-ask/db-ask.log` on Linux; the config directory where
/// the platform has no state directory.
pub fn get_log_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::config_dir)
        .map(|dir| dir.join("db-ask").join("db-ask.log"))
        .unwrap_or_else(|| std::env::temp_dir().join("db-ask.log"))
}
