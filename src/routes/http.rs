//! HTTP endpoint handlers. Thin wrappers that forward to the pipeline.
//! Each handler is instrumented and logs request sizes and basic result info.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, info, instrument};

use crate::error::PipelineError;
use crate::pipeline::generate_question_bank;
use crate::protocol::*;
use crate::state::AppState;

/// Handler-level failures and their HTTP mapping.
#[derive(Debug)]
pub enum ApiError {
    GenerationDisabled,
    Pipeline(PipelineError),
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError::Pipeline(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::GenerationDisabled => (
                StatusCode::SERVICE_UNAVAILABLE,
                "question generation is disabled: OPENAI_API_KEY is not set".to_string(),
            ),
            ApiError::Pipeline(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        (status, Json(ErrorOut { detail })).into_response()
    }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthOut { ok: true, generation_enabled: state.generation_enabled() })
}

#[instrument(
    level = "info",
    skip(state, body),
    fields(article_len = body.article.len(), bank_len = body.current_question_bank.len())
)]
pub async fn http_generate_questions(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QuestionRequestIn>,
) -> Result<Json<QuestionBankOut>, ApiError> {
    let Some(client) = state.client.clone() else {
        error!(target: "mcq_bank_backend", "Generation requested but no backend is configured");
        return Err(ApiError::GenerationDisabled);
    };

    let bank = generate_question_bank(client, Arc::clone(&state.config), body.into()).await?;
    info!(target: "mcq_bank_backend", questions = bank.len(), "HTTP question bank served");
    Ok(Json(QuestionBankOut::from(&bank)))
}
