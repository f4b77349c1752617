use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::llm::DEFAULT_API_BASE;
use crate::registry::ModelRegistry;
use crate::telemetry;

pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const API_BASE_VAR: &str = "GEMINI_API_BASE";
pub const UI_DIR_VAR: &str = "NOVARIA_UI_DIR";
pub const MODELS_FILE_VAR: &str = "NOVARIA_MODELS_FILE";
pub const LOG_FILE_VAR: &str = "NOVARIA_LOG_FILE";

/**
 * \brief Process-level settings, read once at startup.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /** \brief Upstream credential. Absence defers failure to the first request. */
    pub api_key: Option<String>,
    pub api_base: String,
    /** \brief Static front-end served on unmatched routes. */
    pub ui_dir: PathBuf,
    /** \brief Optional JSON file replacing the built-in model table. */
    pub models_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            ui_dir: PathBuf::from("public"),
            models_file: None,
            log_file: None,
        }
    }
}

impl Config {
    /**
     * \brief Load `.env` (if any) and read the process environment.
     */
    pub fn from_env() -> Self {
        report_dotenv(dotenvy::dotenv());
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /**
     * \brief Build from an arbitrary variable source; blank values count as unset.
     */
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            api_key: get(API_KEY_VAR),
            api_base: get(API_BASE_VAR).unwrap_or(defaults.api_base),
            ui_dir: get(UI_DIR_VAR).map(PathBuf::from).unwrap_or(defaults.ui_dir),
            models_file: get(MODELS_FILE_VAR).map(PathBuf::from),
            log_file: get(LOG_FILE_VAR).map(PathBuf::from),
        }
    }

    /**
     * \brief Log (but tolerate) a missing credential.
     */
    pub fn report_missing_credential(&self) -> bool {
        if self.api_key.is_none() {
            telemetry::log_error(
                "config",
                &format!("{} is not defined; requests will fail until it is set", API_KEY_VAR),
            );
            return true;
        }
        false
    }

    /**
     * \brief The configured model table, or the built-in one.
     */
    pub fn load_registry(&self) -> Result<ModelRegistry> {
        match &self.models_file {
            Some(path) => ModelRegistry::load(path)
                .with_context(|| format!("load models file {} failed", path.display())),
            None => Ok(ModelRegistry::builtin()),
        }
    }
}

/**
 * \brief A missing `.env` is normal; anything else is logged. Returns whether a warning was raised.
 */
fn report_dotenv(result: Result<PathBuf, dotenvy::Error>) -> bool {
    match result {
        Ok(path) => {
            telemetry::log_event("config", &format!("loaded {}", path.display()));
            false
        }
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => false,
        Err(err) => {
            telemetry::log_warn("config", &format!("ignoring .env: {}", err));
            true
        }
    }
}
