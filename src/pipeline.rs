//! Pipeline orchestrator: difficulty scheduling, the per-question waves, then assembly.
//!
//! A run either returns a complete 9-question bank or fails with the first error.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, instrument, Instrument};
use uuid::Uuid;

use crate::assembler;
use crate::config::GeneratorConfig;
use crate::domain::{GenerationRequest, QuestionBank, BANK_SIZE};
use crate::error::{Checkpoint, PipelineError, Result};
use crate::generation::GenerationClient;
use crate::scheduler;
use crate::stages::RetryPolicy;

/// Everything a run needs, cheap to clone into worker tasks.
#[derive(Clone)]
pub struct RunContext {
    pub client: GenerationClient,
    pub config: Arc<GeneratorConfig>,
    pub request: Arc<GenerationRequest>,
}

impl RunContext {
    pub fn new(client: GenerationClient, config: Arc<GeneratorConfig>, request: GenerationRequest) -> Self {
        Self { client, config, request: Arc::new(request) }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.config.pipeline)
    }
}

fn ensure_count(checkpoint: Checkpoint, actual: usize) -> Result<()> {
    if actual == BANK_SIZE {
        Ok(())
    } else {
        Err(PipelineError::CountMismatch { checkpoint, expected: BANK_SIZE, actual })
    }
}

/// Generate a full question bank for `request`.
pub async fn generate_question_bank(
    client: GenerationClient,
    config: Arc<GeneratorConfig>,
    request: GenerationRequest,
) -> Result<QuestionBank> {
    let run_id = Uuid::new_v4();
    let ctx = RunContext::new(client, config, request);
    let span = tracing::info_span!(target: "pipeline", "question_bank_run", %run_id);
    run(&ctx).instrument(span).await
}

#[instrument(level = "debug", skip_all, fields(article_len = ctx.request.source_text.len()))]
async fn run(ctx: &RunContext) -> Result<QuestionBank> {
    let start = Instant::now();
    info!(target: "pipeline", backend = %ctx.client.describe(), "Question bank run started");

    let result = async {
        let questions = scheduler::schedule_tiers(ctx).await?;
        ensure_count(Checkpoint::AfterScheduling, questions.len())?;

        let waves = scheduler::run_waves(ctx, &questions).await?;

        let bank = assembler::assemble(&questions, &waves)?;
        ensure_count(Checkpoint::AfterAssembly, bank.len())?;
        Ok::<_, PipelineError>(bank)
    }
    .await;

    match &result {
        Ok(bank) => info!(target: "pipeline", elapsed = ?start.elapsed(), questions = bank.len(), "Question bank run complete"),
        Err(e) => error!(target: "pipeline", elapsed = ?start.elapsed(), error = %e, stage = ?e.stage(), "Question bank run failed"),
    }
    result
}
