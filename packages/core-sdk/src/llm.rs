use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::UpstreamError;
use crate::registry::{GenerationParams, ModelEntry, SafetySetting};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/** \brief Finish reasons that mean the candidate was withheld. */
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

/**
 * \brief Turn author on the upstream protocol. Only two values exist.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    /**
     * \brief Caller roles other than exactly "user" become the model role.
     */
    pub fn from_caller(role: &str) -> Self {
        if role == "user" {
            Role::User
        } else {
            Role::Model
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Part::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part::text(text)],
        }
    }
}

/**
 * \brief Body of a `generateContent` call.
 */
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationParams,
    pub safety_settings: Vec<SafetySetting>,
}

/**
 * \brief The generative service as the handler sees it.
 */
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /**
     * \brief Run one generation against `model` and return the reply text.
     */
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<String, UpstreamError>;

    /** \brief Whether a credential is available; used by health reporting. */
    fn is_configured(&self) -> bool {
        true
    }
}

/**
 * \brief reqwest-backed client for the Gemini REST API.
 */
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
}

impl GeminiClient {
    /**
     * \brief Build a client. A missing key is accepted here and reported on first use.
     */
    pub fn new(api_base: &str, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: normalize_gemini_base(api_base),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<String, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(UpstreamError::MissingCredential)?;
        let url = format!("{}/models/{}:generateContent", self.api_base, model);

        let resp = self
            .http
            .post(url)
            .query(&[("key", api_key)])
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(api_error_from_body(status.as_u16(), resp.text().await));
        }
        let v: Value = resp.json().await?;
        extract_reply(&v)
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/**
 * \brief Stateful conversation against one model entry.
 */
pub struct ChatSession<'a> {
    backend: &'a dyn GenerativeBackend,
    entry: &'a ModelEntry,
    history: Vec<Content>,
}

/**
 * \brief Open a session seeded with prior turns.
 */
pub fn start_chat<'a>(
    backend: &'a dyn GenerativeBackend,
    entry: &'a ModelEntry,
    history: Vec<Content>,
) -> ChatSession<'a> {
    ChatSession {
        backend,
        entry,
        history,
    }
}

impl<'a> ChatSession<'a> {
    /**
     * \brief Submit `parts` as the next user turn. History only grows on success.
     */
    pub async fn send_message(&mut self, parts: Vec<Part>) -> Result<String, UpstreamError> {
        let user_turn = Content {
            role: Role::User,
            parts,
        };
        let mut contents = self.history.clone();
        contents.push(user_turn.clone());

        let request = GenerateContentRequest {
            contents,
            generation_config: self.entry.generation,
            safety_settings: self.entry.safety.clone(),
        };
        let reply = self
            .backend
            .generate_content(&self.entry.upstream_model, &request)
            .await?;

        self.history.push(user_turn);
        self.history.push(Content::text(Role::Model, reply.clone()));
        Ok(reply)
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }
}

fn normalize_gemini_base(api_base: &str) -> String {
    let trimmed = api_base.trim_end_matches('/');
    if trimmed.ends_with("/v1")
        || trimmed.ends_with("/v1beta")
        || trimmed.contains("/v1/")
        || trimmed.contains("/v1beta/")
    {
        trimmed.to_string()
    } else {
        format!("{}/v1beta", trimmed)
    }
}

/**
 * \brief Error for a non-2xx reply; a failed body read keeps its transport cause.
 */
fn api_error_from_body<E: std::fmt::Display>(
    status: u16,
    body: Result<String, E>,
) -> UpstreamError {
    match body {
        Ok(text) => parse_api_error(status, &text),
        Err(err) => UpstreamError::Transport(format!(
            "read error body of {} {} failed: {}",
            status,
            status_text(status),
            err
        )),
    }
}

fn status_text(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}

fn parse_api_error(status: u16, body: &str) -> UpstreamError {
    let envelope = serde_json::from_str::<Value>(body).ok();
    let error = envelope.as_ref().and_then(|v| v.get("error"));
    let code = error
        .and_then(|e| e.get("status"))
        .and_then(|s| s.as_str())
        .map(|s| s.to_string());
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(|m| m.to_string())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "request failed".to_string()
            } else {
                trimmed.to_string()
            }
        });
    UpstreamError::Api {
        status,
        code,
        message,
    }
}

fn extract_reply(v: &Value) -> Result<String, UpstreamError> {
    if let Some(reason) = v
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(|r| r.as_str())
    {
        return Err(UpstreamError::Blocked {
            reason: reason.to_string(),
        });
    }

    let first = match v
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
    {
        Some(first) => first,
        None => return Ok(String::new()),
    };

    if let Some(reason) = first
        .get("finishReason")
        .and_then(|r| r.as_str())
        .filter(|r| BLOCKING_FINISH_REASONS.contains(r))
    {
        return Err(UpstreamError::Blocked {
            reason: reason.to_string(),
        });
    }

    let text = first
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();
    Ok(text)
}
