use std::sync::Arc;

use crate::error::ApiError;
use crate::llm::{self, Content, GenerativeBackend, Part, Role};
use crate::models::{Attachment, ConversationTurn, GenerateRequest, GenerateResponse};
use crate::registry::{ModelEntry, ModelRegistry};
use crate::telemetry;

/**
 * \brief Turns one caller request into one upstream conversation turn.
 * Holds no per-request state; clones share the registry and backend.
 */
#[derive(Clone)]
pub struct GenerateService {
    registry: Arc<ModelRegistry>,
    backend: Arc<dyn GenerativeBackend>,
}

impl GenerateService {
    pub fn new(registry: Arc<ModelRegistry>, backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { registry, backend }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn backend(&self) -> &dyn GenerativeBackend {
        self.backend.as_ref()
    }

    /**
     * \brief Validate, resolve the model, assemble the prompt and dispatch it.
     */
    pub async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ApiError> {
        validate(&request)?;

        let entry = self.registry.resolve(request.model_key());
        let history = normalize_history(request.history());
        let parts = build_parts(entry, request.attachments(), request.message());

        telemetry::log_event(
            "handler.generate",
            &format!(
                "selected={} resolved={} upstream={} history={} parts={}",
                request.model_key(),
                entry.key,
                entry.upstream_model,
                history.len(),
                parts.len()
            ),
        );

        let mut chat = llm::start_chat(self.backend.as_ref(), entry, history);
        match chat.send_message(parts).await {
            Ok(text) => Ok(format_response(text, &request)),
            Err(err) => {
                telemetry::log_error("handler.generate", &format!("upstream failed: {}", err));
                Err(ApiError::from(err))
            }
        }
    }
}

/**
 * \brief Reject requests carrying neither text nor attachments.
 */
pub fn validate(request: &GenerateRequest) -> Result<(), ApiError> {
    if request.message().is_empty() && request.attachments().is_empty() {
        return Err(ApiError::Validation);
    }
    Ok(())
}

pub fn normalize_history(turns: &[ConversationTurn]) -> Vec<Content> {
    turns
        .iter()
        .map(|turn| Content::text(Role::from_caller(&turn.role), turn.content.clone()))
        .collect()
}

/**
 * \brief Inline attachments (when the model accepts them) followed by the user text.
 * The text part is always last, even when empty.
 */
pub fn build_parts(entry: &ModelEntry, attachments: &[Attachment], message: &str) -> Vec<Part> {
    let mut parts = Vec::with_capacity(attachments.len() + 1);
    for file in attachments {
        if entry.supports_inline_data {
            parts.push(Part::inline(file.mime_type.clone(), file.data.clone()));
        } else {
            telemetry::log_warn(
                "handler.attachments",
                &format!(
                    "model {} does not accept inline data; dropped {} attachment",
                    entry.upstream_model, file.mime_type
                ),
            );
        }
    }
    parts.push(Part::text(message));
    parts
}

pub fn format_response(text: String, request: &GenerateRequest) -> GenerateResponse {
    GenerateResponse {
        text,
        image_url: None,
        model_used: request.selected_model.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FailureKind, UpstreamError};
    use crate::llm::GenerateContentRequest;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StubBackend {
        reply: Result<String, String>,
        calls: Mutex<Vec<(String, GenerateContentRequest)>>,
    }

    impl StubBackend {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(message.to_string()),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl GenerativeBackend for StubBackend {
        async fn generate_content(
            &self,
            model: &str,
            request: &GenerateContentRequest,
        ) -> Result<String, UpstreamError> {
            self.calls
                .lock()
                .unwrap()
                .push((model.to_string(), request.clone()));
            self.reply.clone().map_err(UpstreamError::Other)
        }
    }

    fn service(backend: Arc<StubBackend>) -> GenerateService {
        GenerateService::new(Arc::new(ModelRegistry::builtin()), backend)
    }

    fn text_only_entry() -> ModelEntry {
        ModelEntry {
            supports_inline_data: false,
            ..ModelRegistry::builtin().default_entry().clone()
        }
    }

    fn attachment() -> Attachment {
        Attachment {
            mime_type: "image/png".into(),
            data: "iVBORw0KGgo=".into(),
        }
    }

    #[test]
    fn test_validate_requires_text_or_attachment() {
        assert!(matches!(
            validate(&GenerateRequest::default()),
            Err(ApiError::Validation)
        ));
        let empty_text = GenerateRequest {
            user_message: Some(String::new()),
            attached_files: Some(Vec::new()),
            ..Default::default()
        };
        assert!(matches!(validate(&empty_text), Err(ApiError::Validation)));

        let attachment_only = GenerateRequest {
            attached_files: Some(vec![attachment()]),
            ..Default::default()
        };
        assert!(validate(&attachment_only).is_ok());

        let text_only = GenerateRequest {
            user_message: Some("hi".into()),
            ..Default::default()
        };
        assert!(validate(&text_only).is_ok());
    }

    #[test]
    fn test_normalize_history_coerces_roles() {
        let turns = vec![
            ConversationTurn {
                role: "user".into(),
                content: "q".into(),
            },
            ConversationTurn {
                role: "assistant".into(),
                content: "a".into(),
            },
            ConversationTurn {
                role: "bot".into(),
                content: "b".into(),
            },
        ];
        let roles: Vec<_> = normalize_history(&turns).iter().map(|c| c.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Model, Role::Model]);
    }

    #[test]
    fn test_build_parts_orders_attachments_before_text() {
        let registry = ModelRegistry::builtin();
        let parts = build_parts(registry.default_entry(), &[attachment(), attachment()], "look");
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], Part::inline("image/png", "iVBORw0KGgo="));
        assert_eq!(parts[2], Part::text("look"));
    }

    #[test]
    fn test_build_parts_drops_attachments_for_text_only_models() {
        let parts = build_parts(&text_only_entry(), &[attachment()], "");
        assert_eq!(parts, vec![Part::text("")]);
    }

    #[tokio::test]
    async fn test_generate_success_echoes_selected_model() {
        let backend = StubBackend::ok("Hi!");
        let svc = service(backend.clone());
        let resp = svc
            .generate(GenerateRequest {
                user_message: Some("Hello".into()),
                conversation_history: Some(Vec::new()),
                attached_files: Some(Vec::new()),
                selected_model: Some("gemini-2.5-flash".into()),
            })
            .await
            .expect("generate");
        assert_eq!(
            resp,
            GenerateResponse {
                text: "Hi!".into(),
                image_url: None,
                model_used: Some("gemini-2.5-flash".into()),
            }
        );
        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls[0].0, "gemini-1.5-flash-latest");
        assert_eq!(calls[0].1.contents.len(), 1);
    }

    #[tokio::test]
    async fn test_generate_unknown_model_uses_default_entry() {
        let backend = StubBackend::ok("ok");
        let svc = service(backend.clone());
        let resp = svc
            .generate(GenerateRequest {
                user_message: Some("hi".into()),
                selected_model: Some("nonexistent-model".into()),
                ..Default::default()
            })
            .await
            .expect("generate");
        assert_eq!(resp.model_used.as_deref(), Some("nonexistent-model"));

        let calls = backend.calls.lock().unwrap();
        let default = ModelRegistry::builtin().default_entry().clone();
        assert_eq!(calls[0].0, default.upstream_model);
        assert_eq!(calls[0].1.generation_config, default.generation);
        assert_eq!(calls[0].1.safety_settings, default.safety);
    }

    #[tokio::test]
    async fn test_generate_seeds_history_before_new_turn() {
        let backend = StubBackend::ok("fine");
        let svc = service(backend.clone());
        svc.generate(GenerateRequest {
            user_message: Some("and now?".into()),
            conversation_history: Some(vec![
                ConversationTurn {
                    role: "user".into(),
                    content: "hello".into(),
                },
                ConversationTurn {
                    role: "assistant".into(),
                    content: "hi".into(),
                },
            ]),
            selected_model: Some("gemini-1.5-flash".into()),
            ..Default::default()
        })
        .await
        .expect("generate");

        let calls = backend.calls.lock().unwrap();
        let contents = &calls[0].1.contents;
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1], Content::text(Role::Model, "hi"));
        assert_eq!(contents[2], Content::text(Role::User, "and now?"));
    }

    #[tokio::test]
    async fn test_generate_validation_skips_upstream() {
        let backend = StubBackend::ok("unused");
        let svc = service(backend.clone());
        let err = svc.generate(GenerateRequest::default()).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation));
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generate_maps_upstream_failures() {
        let svc = service(StubBackend::failing("429: quota exceeded for this project"));
        let err = svc
            .generate(GenerateRequest {
                user_message: Some("hi".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Upstream {
                kind: FailureKind::QuotaExceeded,
                ..
            }
        ));

        let svc = service(StubBackend::failing("boom"));
        let err = svc
            .generate(GenerateRequest {
                user_message: Some("hi".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Maaf, terjadi kesalahan: boom");
    }
}
