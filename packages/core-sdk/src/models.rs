use serde::{Deserialize, Serialize};

/**
 * \brief One prior turn as supplied by the caller. `role` is free text; anything
 * other than "user" is treated as the assistant.
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/**
 * \brief Base64-encoded file sent inline with the prompt.
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub mime_type: String,
    pub data: String,
}

/**
 * \brief Body of `POST /api/generate`. Every field may be absent or null.
 */
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub user_message: Option<String>,
    #[serde(default)]
    pub conversation_history: Option<Vec<ConversationTurn>>,
    #[serde(default)]
    pub attached_files: Option<Vec<Attachment>>,
    #[serde(default)]
    pub selected_model: Option<String>,
}

impl GenerateRequest {
    pub fn message(&self) -> &str {
        self.user_message.as_deref().unwrap_or("")
    }

    pub fn history(&self) -> &[ConversationTurn] {
        self.conversation_history.as_deref().unwrap_or(&[])
    }

    pub fn attachments(&self) -> &[Attachment] {
        self.attached_files.as_deref().unwrap_or(&[])
    }

    pub fn model_key(&self) -> &str {
        self.selected_model.as_deref().unwrap_or("")
    }
}

/**
 * \brief Successful reply. `image_url` is always null; image generation is not offered.
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub text: String,
    pub image_url: Option<String>,
    /** \brief Echo of the caller's `selectedModel`, not the resolved key; omitted when absent. */
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
}

/**
 * \brief Error body shared by every failure status.
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}
