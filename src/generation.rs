//! Generation client: the only point of contact with the external text-generation service.
//!
//! `TextGenerator` is the transport seam (OpenAI in production, scripted stubs in tests).
//! `GenerationClient::generate` sends one instruction and parses the reply against the
//! schema declared by the caller. No retries happen here; failures propagate immediately.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::error::Category;
use tracing::{debug, instrument};

use crate::error::GenerationError;
use crate::schema::ReplySchema;
use crate::util::{strip_code_fence, trunc_for_log};

/// Raw text completion for a single instruction.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, instruction: &str) -> Result<String, GenerationError>;

    /// Short backend description for logs.
    fn describe(&self) -> String {
        "text-generator".to_string()
    }
}

#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn TextGenerator>,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn TextGenerator>) -> Self {
        Self { backend }
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    /// Send `instruction` and parse the reply as `S`.
    #[instrument(level = "debug", skip(self, instruction), fields(schema = S::NAME, instruction_len = instruction.len()))]
    pub async fn generate<S: ReplySchema>(&self, instruction: &str) -> Result<S, GenerationError> {
        let raw = self.backend.complete(instruction).await?;
        debug!(reply_len = raw.len(), preview = %trunc_for_log(&raw, 80), "Generation reply received");
        parse_reply::<S>(&raw)
    }
}

/// Parse a raw reply into the declared schema.
///
/// Syntax errors become `Malformed`; well-formed JSON with missing or ill-typed
/// fields becomes `SchemaMismatch`.
pub fn parse_reply<S: ReplySchema>(raw: &str) -> Result<S, GenerationError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(GenerationError::EmptyReply);
    }
    serde_json::from_str::<S>(body).map_err(|e| match e.classify() {
        Category::Data => GenerationError::SchemaMismatch {
            schema: S::NAME,
            detail: e.to_string(),
        },
        Category::Syntax | Category::Eof | Category::Io => GenerationError::Malformed {
            schema: S::NAME,
            source: e,
        },
    })
}
