//! Tracing subscriber setup.

use crate::config::LoggingSettings;
use chrono::{Local, NaiveDate};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Cannot create log directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot open log file {}: {source}", path.display())]
    OpenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Logging is already initialised: {0}")]
    Init(String),
}

/// `<dir>/<YYYY-MM-DD>.log`
pub fn log_file_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}.log", date.format("%Y-%m-%d")))
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose { "lootsort=debug" } else { "lootsort=info" }
}

/// `RUST_LOG` wins over the built-in default.
fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn open_log_file(dir: &Path) -> Result<(PathBuf, File), LoggingError> {
    fs::create_dir_all(dir).map_err(|source| LoggingError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = log_file_path(dir, Local::now().date_naive());
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| LoggingError::OpenFile {
            path: path.clone(),
            source,
        })?;
    Ok((path, file))
}

/// Installs the global subscriber.
///
/// With logging enabled, events are appended to today's file in
/// `settings.log_directory` and the file path is returned. Otherwise only
/// warnings reach stderr.
pub fn init(settings: &LoggingSettings, verbose: bool) -> Result<Option<PathBuf>, LoggingError> {
    if !settings.enabled {
        let filter = env_filter(if verbose { "lootsort=debug" } else { "warn" });
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))?;
        return Ok(None);
    }

    let (path, file) = open_log_file(&settings.log_directory)?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_directive(verbose)))
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    tracing::info!("logging to {}", path.display());
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_file_is_named_by_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            log_file_path(Path::new("logs"), date),
            PathBuf::from("logs/2024-03-09.log")
        );
    }

    #[test]
    fn test_verbose_raises_level() {
        assert_eq!(default_directive(false), "lootsort=info");
        assert_eq!(default_directive(true), "lootsort=debug");
    }

    #[test]
    fn test_open_log_file_creates_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nested/logs");
        let (path, _file) = open_log_file(&dir).unwrap();
        assert!(path.exists());
        assert_eq!(path.parent(), Some(dir.as_path()));
    }
}
