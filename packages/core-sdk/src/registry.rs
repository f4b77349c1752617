use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/** \brief Key of the fallback entry every registry must carry. */
pub const DEFAULT_MODEL_KEY: &str = "default";

/**
 * \brief Content-risk categories understood by the upstream service.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmCategory {
    HarmCategoryHarassment,
    HarmCategoryHateSpeech,
    HarmCategorySexuallyExplicit,
    HarmCategoryDangerousContent,
}

/**
 * \brief Block threshold applied to a single harm category.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

/**
 * \brief Sampling parameters sent as `generationConfig`.
 */
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

/**
 * \brief One selectable model: the client-facing key, the upstream model id
 * and everything needed to open a session against it.
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelEntry {
    /** \brief Key supplied by callers as `selectedModel`. */
    pub key: String,
    /** \brief Model identifier on the upstream API. */
    pub upstream_model: String,
    pub generation: GenerationParams,
    /** \brief Ordered per-category thresholds. */
    pub safety: Vec<SafetySetting>,
    /** \brief Whether inline binary attachments are forwarded to this model. */
    pub supports_inline_data: bool,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("model registry has no `{}` entry", DEFAULT_MODEL_KEY)]
    MissingDefault,
    #[error("duplicate model key `{0}`")]
    DuplicateKey(String),
    #[error("read models file failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse models file failed: {0}")]
    Parse(#[from] serde_json::Error),
}

/**
 * \brief Immutable table of selectable models. Always holds a `default` entry.
 */
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    entries: Vec<ModelEntry>,
    default_index: usize,
}

/**
 * \brief Model families known to accept inline attachments.
 */
pub fn multimodal_family(upstream_model: &str) -> bool {
    ["gemini-1.5-", "gemini-2.0-"]
        .iter()
        .any(|prefix| upstream_model.contains(prefix))
}

fn permissive_safety() -> Vec<SafetySetting> {
    [
        HarmCategory::HarmCategoryHarassment,
        HarmCategory::HarmCategoryHateSpeech,
        HarmCategory::HarmCategorySexuallyExplicit,
        HarmCategory::HarmCategoryDangerousContent,
    ]
    .into_iter()
    .map(|category| SafetySetting {
        category,
        threshold: HarmBlockThreshold::BlockNone,
    })
    .collect()
}

fn builtin(key: &str, upstream_model: &str, temperature: f32) -> ModelEntry {
    ModelEntry {
        key: key.to_string(),
        upstream_model: upstream_model.to_string(),
        generation: GenerationParams {
            temperature,
            top_k: 1,
            top_p: 1.0,
            max_output_tokens: 2048,
        },
        safety: permissive_safety(),
        supports_inline_data: true,
    }
}

/** \brief Entry shape accepted from a models file; the capability flag is optional. */
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelEntryFile {
    key: String,
    upstream_model: String,
    generation: GenerationParams,
    #[serde(default = "permissive_safety")]
    safety: Vec<SafetySetting>,
    #[serde(default)]
    supports_inline_data: Option<bool>,
}

impl From<ModelEntryFile> for ModelEntry {
    fn from(raw: ModelEntryFile) -> Self {
        let supports_inline_data = raw
            .supports_inline_data
            .unwrap_or_else(|| multimodal_family(&raw.upstream_model));
        ModelEntry {
            key: raw.key,
            upstream_model: raw.upstream_model,
            generation: raw.generation,
            safety: raw.safety,
            supports_inline_data,
        }
    }
}

impl ModelRegistry {
    /**
     * \brief Build a registry, rejecting tables without a `default` entry or with duplicate keys.
     */
    pub fn new(entries: Vec<ModelEntry>) -> Result<Self, RegistryError> {
        for (idx, entry) in entries.iter().enumerate() {
            if entries[..idx].iter().any(|e| e.key == entry.key) {
                return Err(RegistryError::DuplicateKey(entry.key.clone()));
            }
        }
        let default_index = entries
            .iter()
            .position(|e| e.key == DEFAULT_MODEL_KEY)
            .ok_or(RegistryError::MissingDefault)?;
        Ok(Self {
            entries,
            default_index,
        })
    }

    /**
     * \brief The table the service ships with.
     */
    pub fn builtin() -> Self {
        let entries = vec![
            builtin("gemini-2.5-flash", "gemini-1.5-flash-latest", 0.9),
            builtin("gemini-2.0-flash", "gemini-1.5-pro-latest", 0.7),
            builtin("gemini-1.5-flash", "gemini-1.5-flash-latest", 0.8),
            builtin(DEFAULT_MODEL_KEY, "gemini-1.5-flash-latest", 0.9),
        ];
        let default_index = entries.len() - 1;
        Self {
            entries,
            default_index,
        }
    }

    /**
     * \brief Parse a JSON array of entries.
     */
    pub fn from_json(raw: &str) -> Result<Self, RegistryError> {
        let parsed: Vec<ModelEntryFile> = serde_json::from_str(raw)?;
        Self::new(parsed.into_iter().map(ModelEntry::from).collect())
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /**
     * \brief Look up `key`, falling back to the `default` entry. Never fails.
     */
    pub fn resolve(&self, key: &str) -> &ModelEntry {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .unwrap_or(&self.entries[self.default_index])
    }

    pub fn default_entry(&self) -> &ModelEntry {
        &self.entries[self.default_index]
    }

    pub fn entries(&self) -> &[ModelEntry] {
        &self.entries
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.key.as_str()).collect()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
