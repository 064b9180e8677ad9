//! Schedulers: the difficulty fan-out and the three per-question waves.
//!
//! Every wave is a parallel map over keyed inputs with a join barrier. The barrier
//! surfaces the first failure; sibling tasks already running are detached and
//! their results dropped, so a wave's results are visible all-or-nothing.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument};

use crate::domain::{Difficulty, Distractors, Explanations, Question, BANK_SIZE};
use crate::error::{Checkpoint, GenerationError, PipelineError, Result};
use crate::pipeline::RunContext;
use crate::stages::{self, retrying, Stage};

/// Concurrent workers for the difficulty fan-out (one per tier).
pub const TIER_WORKERS: usize = 3;

/// Why a wave stopped before every task succeeded.
#[derive(Debug)]
pub enum WaveFailure<K> {
  Task { key: K, error: GenerationError },
  Aborted { detail: String },
  DuplicateKey { key: K },
}

/// Run `task` over every `(key, input)` pair with at most `workers` in flight.
///
/// Returns all results keyed by `key`, or the first failure observed.
pub async fn fan_out<K, I, T, F, Fut>(
  items: Vec<(K, I)>,
  workers: usize,
  task: F,
) -> std::result::Result<BTreeMap<K, T>, WaveFailure<K>>
where
  K: Ord + Copy + Send + 'static,
  T: Send + 'static,
  F: Fn(I) -> Fut,
  Fut: Future<Output = std::result::Result<T, GenerationError>> + Send + 'static,
{
  let permits = Arc::new(Semaphore::new(workers.max(1)));
  let mut set = JoinSet::new();
  for (key, input) in items {
    let permits = Arc::clone(&permits);
    let fut = task(input);
    set.spawn(async move {
      let _permit = match permits.acquire_owned().await {
        Ok(p) => p,
        Err(_) => return (key, Err(GenerationError::Service("worker pool closed".into()))),
      };
      (key, fut.await)
    });
  }

  let mut results = BTreeMap::new();
  while let Some(joined) = set.join_next().await {
    let failure = match joined {
      Ok((key, Ok(value))) => {
        if results.insert(key, value).is_none() {
          continue;
        }
        WaveFailure::DuplicateKey { key }
      }
      Ok((key, Err(error))) => WaveFailure::Task { key, error },
      Err(e) => WaveFailure::Aborted { detail: e.to_string() },
    };
    // Siblings keep running to completion; nothing reads their output.
    set.detach_all();
    return Err(failure);
  }
  Ok(results)
}

/// Assign bank-wide numbers to one tier's questions, preserving reply order.
pub fn renumber(questions: &mut [Question], difficulty: Difficulty) {
  for (i, q) in questions.iter_mut().enumerate() {
    q.number = difficulty.question_number(i + 1);
  }
}

/// Concatenate tiers in ascending difficulty and check the total.
pub fn merge_tiers(tiers: BTreeMap<Difficulty, Vec<Question>>) -> Result<Vec<Question>> {
  let merged: Vec<Question> = tiers.into_values().flatten().collect();
  if merged.len() != BANK_SIZE {
    return Err(PipelineError::CountMismatch {
      checkpoint: Checkpoint::AfterScheduling,
      expected: BANK_SIZE,
      actual: merged.len(),
    });
  }
  Ok(merged)
}

/// Run QuestionSet for all three tiers concurrently and return the 9 numbered questions.
#[instrument(level = "info", skip_all)]
pub async fn schedule_tiers(ctx: &RunContext) -> Result<Vec<Question>> {
  let start = Instant::now();
  let policy = ctx.retry_policy();
  let items: Vec<(Difficulty, Difficulty)> = Difficulty::ALL.iter().map(|d| (*d, *d)).collect();

  let tiers = fan_out(items, TIER_WORKERS, |difficulty| {
    let ctx = ctx.clone();
    async move {
      let mut questions = retrying(policy, Stage::QuestionSet, || {
        stages::question_set(&ctx.client, &ctx.config, difficulty, &ctx.request)
      })
      .await?;
      renumber(&mut questions, difficulty);
      for q in &questions {
        debug!(target: "pipeline", question_number = q.number, task_verb = %q.task_verb, ek = %q.competency_code, lo = %q.objective_code, "Question scheduled");
      }
      info!(target: "pipeline", difficulty = difficulty.level(), count = questions.len(), "Tier questions generated");
      Ok::<_, GenerationError>(questions)
    }
  })
  .await
  .map_err(|failure| match failure {
    WaveFailure::Task { key, error } => {
      error!(target: "pipeline", difficulty = key.level(), error = %error, "QuestionSet failed");
      PipelineError::Generation { stage: Stage::QuestionSet, difficulty: key, source: error }
    }
    WaveFailure::Aborted { detail } => PipelineError::WorkerAborted { stage: Stage::QuestionSet, detail },
    WaveFailure::DuplicateKey { key } => {
      PipelineError::Internal(format!("difficulty {key} produced twice"))
    }
  })?;

  let questions = merge_tiers(tiers)?;
  info!(target: "pipeline", elapsed = ?start.elapsed(), total = questions.len(), "Difficulty scheduling complete");
  Ok(questions)
}

/// Results of the three per-question waves, keyed by question number.
#[derive(Debug, Default)]
pub struct WaveResults {
  pub correct_answers: BTreeMap<u32, String>,
  pub distractors: BTreeMap<u32, Distractors>,
  pub explanations: BTreeMap<u32, Explanations>,
}

fn wave_error(stage: Stage, questions: &BTreeMap<u32, Question>, failure: WaveFailure<u32>) -> PipelineError {
  match failure {
    WaveFailure::Task { key, error } => match questions.get(&key) {
      Some(q) => {
        error!(target: "pipeline", %stage, question_number = key, error = %error, "Wave task failed; aborting run");
        PipelineError::StageFailure { stage, question_number: key, difficulty: q.difficulty, source: error }
      }
      None => PipelineError::Internal(format!("{stage} failed for unknown question {key}: {error}")),
    },
    WaveFailure::Aborted { detail } => PipelineError::WorkerAborted { stage, detail },
    WaveFailure::DuplicateKey { key } => PipelineError::Internal(format!("{stage} produced question {key} twice")),
  }
}

fn lookup<'a, T>(map: &'a BTreeMap<u32, T>, stage: Stage, number: u32) -> Result<&'a T> {
  map.get(&number)
    .ok_or_else(|| PipelineError::Internal(format!("{stage} result for question {number} is missing")))
}

/// Waves A (correct answers), B (distractors) and C (explanations), each parallel
/// across all questions and each starting only after the previous one fully succeeded.
#[instrument(level = "info", skip_all, fields(questions = questions.len()))]
pub async fn run_waves(ctx: &RunContext, questions: &[Question]) -> Result<WaveResults> {
  let by_number: BTreeMap<u32, Question> = questions.iter().map(|q| (q.number, q.clone())).collect();
  let workers = ctx.config.pipeline.question_workers;
  let policy = ctx.retry_policy();

  // Wave A
  let start = Instant::now();
  let items: Vec<(u32, Question)> = by_number.iter().map(|(n, q)| (*n, q.clone())).collect();
  let correct_answers = fan_out(items, workers, |q: Question| {
    let ctx = ctx.clone();
    async move {
      retrying(policy, Stage::CorrectAnswer, || {
        stages::correct_answer(&ctx.client, &ctx.config, &q, &ctx.request)
      })
      .await
    }
  })
  .await
  .map_err(|f| wave_error(Stage::CorrectAnswer, &by_number, f))?;
  info!(target: "pipeline", wave = "A", max_attempts = policy.max_attempts, elapsed = ?start.elapsed(), "Correct answers generated");

  // Wave B
  let start = Instant::now();
  let mut items = Vec::with_capacity(by_number.len());
  for (n, q) in &by_number {
    let answer = lookup(&correct_answers, Stage::CorrectAnswer, *n)?;
    items.push((*n, (q.clone(), answer.clone())));
  }
  let distractors = fan_out(items, workers, |(q, answer): (Question, String)| {
    let ctx = ctx.clone();
    async move {
      retrying(policy, Stage::Distractors, || {
        stages::distractors(&ctx.client, &ctx.config, &q, &answer, &ctx.request)
      })
      .await
    }
  })
  .await
  .map_err(|f| wave_error(Stage::Distractors, &by_number, f))?;
  info!(target: "pipeline", wave = "B", elapsed = ?start.elapsed(), "Distractors generated");

  // Wave C
  let start = Instant::now();
  let mut items = Vec::with_capacity(by_number.len());
  for (n, q) in &by_number {
    let answer = lookup(&correct_answers, Stage::CorrectAnswer, *n)?;
    let d = lookup(&distractors, Stage::Distractors, *n)?;
    items.push((*n, (q.clone(), answer.clone(), d.clone())));
  }
  let explanations = fan_out(items, workers, |(q, answer, d): (Question, String, Distractors)| {
    let ctx = ctx.clone();
    async move {
      retrying(policy, Stage::Explanations, || {
        stages::explanations(&ctx.client, &ctx.config, &q, &answer, &d, &ctx.request)
      })
      .await
    }
  })
  .await
  .map_err(|f| wave_error(Stage::Explanations, &by_number, f))?;
  info!(target: "pipeline", wave = "C", elapsed = ?start.elapsed(), "Explanations generated");

  Ok(WaveResults { correct_answers, distractors, explanations })
}
