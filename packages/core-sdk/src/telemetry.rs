use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Result;
use once_cell::sync::Lazy;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing_subscriber::EnvFilter;

static LOG_FILE: Lazy<std::sync::RwLock<Option<PathBuf>>> =
    Lazy::new(|| std::sync::RwLock::new(None));

/**
 * \brief Install the console subscriber (filtered by `RUST_LOG`, default `info`)
 * and the optional file sink. Safe to call more than once.
 */
pub fn init(log_file: Option<PathBuf>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
    set_log_file(log_file);
}

/**
 * \brief Point the file sink at `path`, or disable it with `None`.
 */
pub fn set_log_file(path: Option<PathBuf>) {
    if let Ok(mut guard) = LOG_FILE.write() {
        *guard = path;
    }
}

pub fn log_file() -> Option<PathBuf> {
    LOG_FILE.read().ok().and_then(|g| g.clone())
}

/**
 * \brief Record a routine event.
 */
pub fn log_event(category: &str, message: &str) {
    tracing::info!(category, "{}", message);
    append("INFO", category, message);
}

/**
 * \brief Record something the caller will not see but an operator should.
 */
pub fn log_warn(category: &str, message: &str) {
    tracing::warn!(category, "{}", message);
    append("WARN", category, message);
}

/**
 * \brief Record a failure.
 */
pub fn log_error(category: &str, message: &str) {
    tracing::error!(category, "{}", message);
    append("ERROR", category, message);
}

fn append(level: &str, category: &str, message: &str) {
    let Some(path) = log_file() else {
        return;
    };
    if let Err(err) = write_line(&path, level, category, message) {
        eprintln!("telemetry write failed: {}", err);
    }
}

fn write_line(path: &Path, level: &str, category: &str, message: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let timestamp = OffsetDateTime::now_utc().format(&Rfc3339)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{} [{}] {} - {}", timestamp, level, category, message)?;
    Ok(())
}
