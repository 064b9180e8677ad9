//! Scripted generation backend for tests.
//!
//! Replies are derived from the instruction itself: the embedded reply shape selects the
//! stage, `<question>` selects the question, and the difficulty line selects the tier.
//! Failures can be injected per stage and per tier/question; calls and concurrency are counted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::domain::GenerationRequest;
use crate::error::GenerationError;
use crate::generation::TextGenerator;
use crate::schema::{CorrectAnswerReply, DistractorsReply, ExplanationsReply, QuestionSetReply, ReplySchema};
use crate::stages::Stage;

pub fn sample_request() -> GenerationRequest {
  GenerationRequest {
    source_text: "The Silk Road connected Han China with the Mediterranean world.".into(),
    existing_question_bank_text: "Which goods moved west along the Silk Road?".into(),
    competency_codes: "EK 2.1.I".into(),
    objective_codes: "LO 2.1".into(),
  }
}

#[derive(Clone, Debug)]
pub enum Target {
  Any,
  Tier(u8),
  Question(String),
}

#[derive(Clone, Copy, Debug)]
pub enum FailMode {
  /// The service call itself errors.
  Service,
  /// The first matching call errors; later calls succeed.
  ServiceOnce,
  /// Reply parses as JSON but drops a required key.
  SchemaInvalid,
}

#[derive(Clone, Debug)]
struct Failure {
  stage: Stage,
  target: Target,
  mode: FailMode,
}

#[derive(Clone)]
pub struct ScriptedGenerator {
  questions_per_tier: usize,
  failures: Arc<Mutex<Vec<Failure>>>,
  calls: Arc<[AtomicUsize; 4]>,
  in_flight: Arc<AtomicUsize>,
  peak: Arc<AtomicUsize>,
  latency: Duration,
  reversed_tier_latency: bool,
}

fn stage_index(stage: Stage) -> usize {
  match stage {
    Stage::QuestionSet => 0,
    Stage::CorrectAnswer => 1,
    Stage::Distractors => 2,
    Stage::Explanations => 3,
  }
}

fn between<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
  let start = text.find(open)? + open.len();
  let end = text[start..].find(close)? + start;
  Some(&text[start..end])
}

impl ScriptedGenerator {
  pub fn new() -> Self {
    Self {
      questions_per_tier: 3,
      failures: Arc::new(Mutex::new(Vec::new())),
      calls: Arc::new([AtomicUsize::new(0), AtomicUsize::new(0), AtomicUsize::new(0), AtomicUsize::new(0)]),
      in_flight: Arc::new(AtomicUsize::new(0)),
      peak: Arc::new(AtomicUsize::new(0)),
      latency: Duration::ZERO,
      reversed_tier_latency: false,
    }
  }

  pub fn with_questions_per_tier(mut self, n: usize) -> Self {
    self.questions_per_tier = n;
    self
  }

  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = latency;
    self
  }

  /// Tier 1 answers last and tier 3 first.
  pub fn with_reversed_tier_latency(mut self) -> Self {
    self.reversed_tier_latency = true;
    self
  }

  pub fn failing(self, stage: Stage, target: Target, mode: FailMode) -> Self {
    self.failures.lock().expect("failures lock").push(Failure { stage, target, mode });
    self
  }

  pub fn calls(&self, stage: Stage) -> usize {
    self.calls[stage_index(stage)].load(Ordering::SeqCst)
  }

  pub fn peak_concurrency(&self) -> usize {
    self.peak.load(Ordering::SeqCst)
  }

  pub fn question_text(level: u8, index: usize) -> String {
    format!("Tier {level} question {index}: which factor best explains the exchange?")
  }

  pub fn answer_for(question: &str) -> String {
    format!("Answer to [{question}]")
  }

  pub fn distractor_for(question: &str, key: usize) -> String {
    format!("Distractor {key} for [{question}]")
  }

  fn stage_of(instruction: &str) -> Option<Stage> {
    if instruction.contains(ExplanationsReply::SHAPE) {
      Some(Stage::Explanations)
    } else if instruction.contains(DistractorsReply::SHAPE) {
      Some(Stage::Distractors)
    } else if instruction.contains(CorrectAnswerReply::SHAPE) {
      Some(Stage::CorrectAnswer)
    } else if instruction.contains(QuestionSetReply::SHAPE) {
      Some(Stage::QuestionSet)
    } else {
      None
    }
  }

  fn tier_of(instruction: &str) -> u8 {
    between(instruction, "should have difficulty: ", "\n")
      .and_then(|s| s.trim().parse().ok())
      .unwrap_or(0)
  }

  fn failure_for(&self, stage: Stage, tier: u8, question: &str) -> Option<FailMode> {
    let mut failures = self.failures.lock().expect("failures lock");
    let idx = failures.iter().position(|f| {
      f.stage == stage
        && match &f.target {
          Target::Any => true,
          Target::Tier(t) => *t == tier,
          Target::Question(q) => q == question,
        }
    })?;
    let mode = failures[idx].mode;
    if let FailMode::ServiceOnce = mode {
      failures.remove(idx);
    }
    Some(mode)
  }

  fn reply(&self, stage: Stage, tier: u8, question: &str, mode: Option<FailMode>) -> serde_json::Value {
    let broken = matches!(mode, Some(FailMode::SchemaInvalid));
    match stage {
      Stage::QuestionSet => {
        let questions: Vec<_> = (1..=self.questions_per_tier)
          .map(|i| {
            json!({
              "question_number": i,
              "question_text": Self::question_text(tier, i),
              "ek_code_specific_to_this_question": "EK 2.1.I",
              "lo_code_specific_to_this_question": "LO 2.1",
              "task_verb": "Explain",
              "difficulty": tier,
            })
          })
          .collect();
        if broken { json!({ "items": questions }) } else { json!({ "questions": questions }) }
      }
      Stage::CorrectAnswer => {
        if broken {
          json!({ "correct_answer": {} })
        } else {
          json!({ "correct_answer": { "response_text": Self::answer_for(question) } })
        }
      }
      Stage::Distractors => {
        let mut d = json!({
          "d1": { "response_text": Self::distractor_for(question, 1) },
          "d2": { "response_text": Self::distractor_for(question, 2) },
          "d3": { "response_text": Self::distractor_for(question, 3) },
        });
        if broken {
          if let Some(map) = d.as_object_mut() {
            map.remove("d3");
          }
        }
        json!({ "distractors": d })
      }
      Stage::Explanations => {
        let d3 = if broken { json!({}) } else { json!({ "explanation": format!("Explanation d3: [{question}] is incorrect") }) };
        json!({
          "explanations": {
            "correct_answer_explanation": format!("Explanation: [{question}] is correct"),
            "distractor_explanations": {
              "d1": { "explanation": format!("Explanation d1: [{question}] is incorrect") },
              "d2": { "explanation": format!("Explanation d2: [{question}] is incorrect") },
              "d3": d3,
            }
          }
        })
      }
    }
  }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
  async fn complete(&self, instruction: &str) -> Result<String, GenerationError> {
    let Some(stage) = Self::stage_of(instruction) else {
      return Err(GenerationError::Service("unrecognized instruction".into()));
    };
    self.calls[stage_index(stage)].fetch_add(1, Ordering::SeqCst);
    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak.fetch_max(now, Ordering::SeqCst);

    let tier = Self::tier_of(instruction);
    let question = between(instruction, "<question>", "</question>").unwrap_or_default().to_string();

    let mut delay = self.latency;
    if self.reversed_tier_latency && stage == Stage::QuestionSet {
      delay += Duration::from_millis(20 * (4 - tier.min(3)) as u64);
    }
    if !delay.is_zero() {
      tokio::time::sleep(delay).await;
    }
    self.in_flight.fetch_sub(1, Ordering::SeqCst);

    let mode = self.failure_for(stage, tier, &question);
    if let Some(FailMode::Service | FailMode::ServiceOnce) = mode {
      return Err(GenerationError::Service(format!("injected {stage} failure")));
    }
    Ok(self.reply(stage, tier, &question, mode).to_string())
  }

  fn describe(&self) -> String {
    "scripted".to_string()
  }
}
