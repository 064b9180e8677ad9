//! Stage functions: one external call each, typed input to typed output.
//!
//! - QuestionSet: three questions for one difficulty tier
//! - CorrectAnswer: one short correct answer for a question
//! - Distractors: three plausible incorrect answers keyed d1..d3
//! - Explanations: one explanation for the correct answer and one per distractor
//!
//! Instructions are built from the configured templates; configuration is passed in explicitly.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::config::{GeneratorConfig, PipelineSettings};
use crate::domain::{Difficulty, Distractors, Explanations, GenerationRequest, Question, QUESTIONS_PER_TIER};
use crate::error::GenerationError;
use crate::generation::GenerationClient;
use crate::schema::{CorrectAnswerReply, DistractorsReply, ExplanationsReply, QuestionSetReply, ReplySchema};
use crate::util::fill_template;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
  QuestionSet,
  CorrectAnswer,
  Distractors,
  Explanations,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Stage::QuestionSet => "QuestionSet",
      Stage::CorrectAnswer => "CorrectAnswer",
      Stage::Distractors => "Distractors",
      Stage::Explanations => "Explanations",
    })
  }
}

/// Bounded retry on `GenerationError` for a single stage call.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub backoff: Duration,
}

impl From<&PipelineSettings> for RetryPolicy {
  fn from(s: &PipelineSettings) -> Self {
    Self { max_attempts: s.max_attempts.max(1), backoff: Duration::from_millis(s.retry_backoff_ms) }
  }
}

/// Run `op` until it succeeds or the policy is exhausted; the last error is returned.
pub async fn retrying<T, F, Fut>(policy: RetryPolicy, stage: Stage, mut op: F) -> Result<T, GenerationError>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, GenerationError>>,
{
  let mut attempt = 1;
  loop {
    match op().await {
      Ok(v) => return Ok(v),
      Err(e) if attempt < policy.max_attempts => {
        warn!(target: "pipeline", %stage, attempt, max_attempts = policy.max_attempts, error = %e, "Stage call failed; retrying");
        if !policy.backoff.is_zero() {
          tokio::time::sleep(policy.backoff).await;
        }
        attempt += 1;
      }
      Err(e) => return Err(e),
    }
  }
}

/// Build the QuestionSet instruction for a tier.
pub fn question_set_instruction(cfg: &GeneratorConfig, difficulty: Difficulty, request: &GenerationRequest) -> String {
  let level = difficulty.level().to_string();
  fill_template(
    &cfg.prompts.question_set,
    &[
      ("article", request.source_text.as_str()),
      ("blooms", cfg.criteria.taxonomy(difficulty)),
      ("current_question_bank", request.existing_question_bank_text.as_str()),
      ("criteria", cfg.criteria.question.as_str()),
      ("ek_codes", request.competency_codes.as_str()),
      ("lo_codes", request.objective_codes.as_str()),
      ("difficulty", level.as_str()),
      ("json_structure", QuestionSetReply::SHAPE),
    ],
  )
}

pub fn correct_answer_instruction(cfg: &GeneratorConfig, question: &Question, request: &GenerationRequest) -> String {
  fill_template(
    &cfg.prompts.correct_answer,
    &[
      ("article", request.source_text.as_str()),
      ("ek_codes", request.competency_codes.as_str()),
      ("lo_codes", request.objective_codes.as_str()),
      ("question", question.text.as_str()),
      ("blooms", cfg.criteria.taxonomy(question.difficulty)),
      ("criteria", cfg.criteria.correct_answer.as_str()),
      ("json_structure", CorrectAnswerReply::SHAPE),
    ],
  )
}

pub fn distractors_instruction(
  cfg: &GeneratorConfig,
  question: &Question,
  correct_answer: &str,
  request: &GenerationRequest,
) -> String {
  let criteria = cfg.criteria.distractor_with_absolutes();
  fill_template(
    &cfg.prompts.distractors,
    &[
      ("article", request.source_text.as_str()),
      ("question", question.text.as_str()),
      ("correct", correct_answer),
      ("blooms", cfg.criteria.taxonomy(question.difficulty)),
      ("criteria", criteria.as_str()),
      ("json_structure", DistractorsReply::SHAPE),
    ],
  )
}

pub fn explanations_instruction(
  cfg: &GeneratorConfig,
  question: &Question,
  correct_answer: &str,
  distractors: &Distractors,
  request: &GenerationRequest,
) -> String {
  let listed = distractors
    .iter()
    .map(|(k, text)| format!("{}: {}", k.as_str(), text))
    .collect::<Vec<_>>()
    .join("\n");
  fill_template(
    &cfg.prompts.explanations,
    &[
      ("article", request.source_text.as_str()),
      ("question", question.text.as_str()),
      ("criteria", cfg.criteria.explanation.as_str()),
      ("correct", correct_answer),
      ("distractors", listed.as_str()),
      ("json_structure", ExplanationsReply::SHAPE),
    ],
  )
}

/// Generate exactly three questions for `difficulty`, in reply order.
/// Numbers are provisional (1..3) until the scheduler renumbers them.
#[instrument(level = "info", skip(client, cfg, request), fields(difficulty = difficulty.level()))]
pub async fn question_set(
  client: &GenerationClient,
  cfg: &GeneratorConfig,
  difficulty: Difficulty,
  request: &GenerationRequest,
) -> Result<Vec<Question>, GenerationError> {
  let instruction = question_set_instruction(cfg, difficulty, request);
  let reply: QuestionSetReply = client.generate(&instruction).await?;

  if reply.questions.len() != QUESTIONS_PER_TIER {
    return Err(GenerationError::SchemaMismatch {
      schema: QuestionSetReply::NAME,
      detail: format!("expected {} questions, got {}", QUESTIONS_PER_TIER, reply.questions.len()),
    });
  }

  let questions = reply
    .questions
    .into_iter()
    .enumerate()
    .map(|(i, q)| {
      match Difficulty::try_from(q.difficulty) {
        Ok(d) if d == difficulty => {}
        other => {
          warn!(target: "pipeline", expected = %difficulty, got = ?other, question_number = q.question_number, "Reply difficulty differs from tier; using tier");
        }
      }
      Question {
        number: i as u32 + 1,
        text: q.question_text,
        competency_code: q.ek_code_specific_to_this_question,
        objective_code: q.lo_code_specific_to_this_question,
        task_verb: q.task_verb,
        difficulty,
      }
    })
    .collect::<Vec<_>>();
  debug!(target: "pipeline", count = questions.len(), "Question set generated");
  Ok(questions)
}

#[instrument(level = "info", skip(client, cfg, question, request), fields(question_number = question.number))]
pub async fn correct_answer(
  client: &GenerationClient,
  cfg: &GeneratorConfig,
  question: &Question,
  request: &GenerationRequest,
) -> Result<String, GenerationError> {
  let instruction = correct_answer_instruction(cfg, question, request);
  let reply: CorrectAnswerReply = client.generate(&instruction).await?;
  Ok(reply.correct_answer.response_text)
}

#[instrument(level = "info", skip(client, cfg, question, correct_answer, request), fields(question_number = question.number))]
pub async fn distractors(
  client: &GenerationClient,
  cfg: &GeneratorConfig,
  question: &Question,
  correct_answer: &str,
  request: &GenerationRequest,
) -> Result<Distractors, GenerationError> {
  let instruction = distractors_instruction(cfg, question, correct_answer, request);
  let reply: DistractorsReply = client.generate(&instruction).await?;
  Ok(reply.into())
}

#[instrument(level = "info", skip_all, fields(question_number = question.number))]
pub async fn explanations(
  client: &GenerationClient,
  cfg: &GeneratorConfig,
  question: &Question,
  correct_answer: &str,
  distractors: &Distractors,
  request: &GenerationRequest,
) -> Result<Explanations, GenerationError> {
  let instruction = explanations_instruction(cfg, question, correct_answer, distractors, request);
  let reply: ExplanationsReply = client.generate(&instruction).await?;
  Ok(reply.into())
}
