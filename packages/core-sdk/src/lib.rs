pub mod config;
pub mod error;
pub mod handler;
pub mod llm;
pub mod models;
pub mod registry;
pub mod server;
pub mod telemetry;

/**
 * \brief SDK prelude: the modules front-ends reach for most.
 */
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{ApiError, FailureKind, UpstreamError};
    pub use crate::handler::GenerateService;
    pub use crate::llm;
    pub use crate::models::{Attachment, ConversationTurn, GenerateRequest, GenerateResponse};
    pub use crate::registry::{ModelEntry, ModelRegistry};
    pub use crate::server;
    pub use crate::telemetry;
}
