use axum::http::StatusCode;
use thiserror::Error;

pub const VALIDATION_MESSAGE: &str = "User message or attached file is required.";
pub const METHOD_NOT_ALLOWED_MESSAGE: &str = "Method Not Allowed";

/**
 * \brief Failures raised while talking to the generative API.
 */
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("GEMINI_API_KEY is not configured")]
    MissingCredential,
    #[error("request to upstream failed: {0}")]
    Transport(String),
    #[error("[{} {}] {}", .status, status_reason(.status), .message)]
    Api {
        status: u16,
        /** \brief Canonical status from the error envelope, e.g. `RESOURCE_EXHAUSTED`. */
        code: Option<String>,
        message: String,
    },
    #[error("response was blocked due to {reason}")]
    Blocked { reason: String },
    #[error("unexpected upstream payload: {0}")]
    Decode(String),
    #[error("{0}")]
    Other(String),
}

fn status_reason(status: &u16) -> &'static str {
    StatusCode::from_u16(*status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown Status")
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            UpstreamError::Decode(err.to_string())
        } else {
            UpstreamError::Transport(err.to_string())
        }
    }
}

/**
 * \brief Caller-facing categories of upstream failure.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    SafetyBlock,
    QuotaExceeded,
    BadRequest,
    Unknown,
}

/**
 * \brief Map an upstream failure to a [`FailureKind`], preferring structured data
 * and falling back to the error text.
 */
pub fn classify(err: &UpstreamError) -> FailureKind {
    match err {
        UpstreamError::Blocked { reason } if reason == "RECITATION" => FailureKind::Unknown,
        UpstreamError::Blocked { .. } => FailureKind::SafetyBlock,
        UpstreamError::Api { status, code, .. } => {
            match (*status, code.as_deref()) {
                (429, _) | (_, Some("RESOURCE_EXHAUSTED")) => FailureKind::QuotaExceeded,
                (400, _) | (_, Some("INVALID_ARGUMENT")) => FailureKind::BadRequest,
                _ => classify_message(&err.to_string()),
            }
        }
        other => classify_message(&other.to_string()),
    }
}

/**
 * \brief Substring classifier for errors that carry no structured code.
 */
pub fn classify_message(text: &str) -> FailureKind {
    let lower = text.to_ascii_lowercase();
    if lower.contains("blocked due to safety") {
        FailureKind::SafetyBlock
    } else if lower.contains("quota exceeded") {
        FailureKind::QuotaExceeded
    } else if lower.contains("400 bad request") {
        FailureKind::BadRequest
    } else {
        FailureKind::Unknown
    }
}

/**
 * \brief User-facing (Indonesian) text for a failure kind.
 */
pub fn localized_message(kind: FailureKind, raw: &str) -> String {
    match kind {
        FailureKind::SafetyBlock => "Maaf, respons ini diblokir karena masalah keamanan konten. Coba formulasi ulang pertanyaan Anda.".to_string(),
        FailureKind::QuotaExceeded => "Maaf, kuota API telah habis. Silakan coba lagi nanti atau periksa pengaturan API Anda.".to_string(),
        FailureKind::BadRequest => "Maaf, permintaan tidak valid. Mungkin ada masalah dengan input Anda atau model yang tidak kompatibel dengan jenis input.".to_string(),
        FailureKind::Unknown => format!("Maaf, terjadi kesalahan: {}", raw),
    }
}

fn upstream_message(kind: &FailureKind, detail: &str) -> String {
    localized_message(*kind, detail)
}

/**
 * \brief Every way a generate call can fail, as seen by the HTTP layer.
 */
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{}", METHOD_NOT_ALLOWED_MESSAGE)]
    MethodNotAllowed,
    #[error("{}", VALIDATION_MESSAGE)]
    Validation,
    #[error("Invalid request body: {0}")]
    MalformedBody(String),
    #[error("Request body exceeds the {0} byte limit.")]
    PayloadTooLarge(usize),
    #[error("{}", upstream_message(.kind, .detail))]
    Upstream { kind: FailureKind, detail: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Validation | ApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        ApiError::Upstream {
            kind: classify(&err),
            detail: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_structured_errors() {
        let quota = UpstreamError::Api {
            status: 429,
            code: Some("RESOURCE_EXHAUSTED".into()),
            message: "Resource has been exhausted (e.g. check quota).".into(),
        };
        assert_eq!(classify(&quota), FailureKind::QuotaExceeded);

        let invalid = UpstreamError::Api {
            status: 400,
            code: Some("INVALID_ARGUMENT".into()),
            message: "Unsupported MIME type".into(),
        };
        assert_eq!(classify(&invalid), FailureKind::BadRequest);

        let blocked = UpstreamError::Blocked {
            reason: "SAFETY".into(),
        };
        assert_eq!(classify(&blocked), FailureKind::SafetyBlock);

        let recitation = UpstreamError::Blocked {
            reason: "RECITATION".into(),
        };
        assert_eq!(classify(&recitation), FailureKind::Unknown);
        assert_eq!(
            ApiError::from(recitation).message(),
            "Maaf, terjadi kesalahan: response was blocked due to RECITATION"
        );

        let unavailable = UpstreamError::Api {
            status: 503,
            code: Some("UNAVAILABLE".into()),
            message: "The model is overloaded.".into(),
        };
        assert_eq!(classify(&unavailable), FailureKind::Unknown);
    }

    #[test]
    fn test_classify_falls_back_to_message_text() {
        let err = UpstreamError::Other("Quota Exceeded for project".into());
        assert_eq!(classify(&err), FailureKind::QuotaExceeded);
        assert_eq!(
            classify_message("[GoogleGenerativeAI Error]: 400 Bad Request"),
            FailureKind::BadRequest
        );
        assert_eq!(
            classify_message("Text not available. Response was blocked due to SAFETY"),
            FailureKind::SafetyBlock
        );
        assert_eq!(classify_message("socket hang up"), FailureKind::Unknown);
    }

    #[test]
    fn test_api_display_includes_reason_phrase() {
        let err = UpstreamError::Api {
            status: 400,
            code: None,
            message: "bad part".into(),
        };
        assert_eq!(err.to_string(), "[400 Bad Request] bad part");
    }

    #[test]
    fn test_unknown_message_interpolates_raw_text() {
        let err = ApiError::from(UpstreamError::Transport("connection reset".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.message(),
            "Maaf, terjadi kesalahan: request to upstream failed: connection reset"
        );
    }

    #[test]
    fn test_statuses() {
        assert_eq!(ApiError::MethodNotAllowed.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(ApiError::MethodNotAllowed.message(), "Method Not Allowed");
        assert_eq!(ApiError::Validation.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Validation.message(), VALIDATION_MESSAGE);
        let too_large = ApiError::PayloadTooLarge(5 * 1024 * 1024);
        assert_eq!(too_large.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(too_large.message(), "Request body exceeds the 5242880 byte limit.");
        let safety = ApiError::from(UpstreamError::Blocked {
            reason: "SAFETY".into(),
        });
        assert_eq!(safety.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(safety.message().starts_with("Maaf, respons ini diblokir"));
    }
}
