//! Reply schemas expected from the generation service, one per stage.
//!
//! Each schema carries the JSON shape embedded into its instruction and is
//! deserialized strictly: a missing or ill-typed field is a schema mismatch.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;

use crate::domain::{Distractors, Explanations};

/// A structured reply type declared by the caller of the generation client.
pub trait ReplySchema: DeserializeOwned {
  /// Schema name used in errors and logs.
  const NAME: &'static str;
  /// Example shape embedded into the instruction.
  const SHAPE: &'static str;
}

#[derive(Debug, Deserialize)]
pub struct QuestionSetReply {
  pub questions: Vec<QuestionEntry>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionEntry {
  pub question_number: u32,
  pub question_text: String,
  pub ek_code_specific_to_this_question: String,
  pub lo_code_specific_to_this_question: String,
  pub task_verb: String,
  #[serde(deserialize_with = "lenient_level")]
  pub difficulty: u8,
}

#[derive(Debug, Deserialize)]
pub struct ResponseText {
  pub response_text: String,
}

#[derive(Debug, Deserialize)]
pub struct CorrectAnswerReply {
  pub correct_answer: ResponseText,
}

#[derive(Debug, Deserialize)]
pub struct DistractorsReply {
  pub distractors: DistractorSet,
}

#[derive(Debug, Deserialize)]
pub struct DistractorSet {
  pub d1: ResponseText,
  pub d2: ResponseText,
  pub d3: ResponseText,
}

#[derive(Debug, Deserialize)]
pub struct ExplanationsReply {
  pub explanations: ExplanationSet,
}

#[derive(Debug, Deserialize)]
pub struct ExplanationSet {
  pub correct_answer_explanation: String,
  pub distractor_explanations: DistractorExplanations,
}

#[derive(Debug, Deserialize)]
pub struct DistractorExplanations {
  pub d1: ExplanationText,
  pub d2: ExplanationText,
  pub d3: ExplanationText,
}

#[derive(Debug, Deserialize)]
pub struct ExplanationText {
  pub explanation: String,
}

impl ReplySchema for QuestionSetReply {
  const NAME: &'static str = "QuestionSet";
  const SHAPE: &'static str = r#"{
  "questions": [
    {
      "question_number": 1,
      "question_text": "string",
      "ek_code_specific_to_this_question": "string",
      "lo_code_specific_to_this_question": "string",
      "task_verb": "string",
      "difficulty": "integer"
    },
    {
      "question_number": 2,
      "question_text": "string",
      "ek_code_specific_to_this_question": "string",
      "lo_code_specific_to_this_question": "string",
      "task_verb": "string",
      "difficulty": "integer"
    },
    {
      "question_number": 3,
      "question_text": "string",
      "ek_code_specific_to_this_question": "string",
      "lo_code_specific_to_this_question": "string",
      "task_verb": "string",
      "difficulty": "integer"
    }
  ]
}"#;
}

impl ReplySchema for CorrectAnswerReply {
  const NAME: &'static str = "CorrectAnswer";
  const SHAPE: &'static str = r#"{
  "correct_answer": {
    "response_text": "string"
  }
}"#;
}

impl ReplySchema for DistractorsReply {
  const NAME: &'static str = "Distractors";
  const SHAPE: &'static str = r#"{
  "distractors": {
    "d1": { "response_text": "string" },
    "d2": { "response_text": "string" },
    "d3": { "response_text": "string" }
  }
}"#;
}

impl ReplySchema for ExplanationsReply {
  const NAME: &'static str = "Explanations";
  const SHAPE: &'static str = r#"{
  "explanations": {
    "correct_answer_explanation": "string",
    "distractor_explanations": {
      "d1": { "explanation": "string" },
      "d2": { "explanation": "string" },
      "d3": { "explanation": "string" }
    }
  }
}"#;
}

impl From<DistractorsReply> for Distractors {
  fn from(r: DistractorsReply) -> Self {
    let d = r.distractors;
    Distractors::new(d.d1.response_text, d.d2.response_text, d.d3.response_text)
  }
}

impl From<ExplanationsReply> for Explanations {
  fn from(r: ExplanationsReply) -> Self {
    let e = r.explanations;
    let d = e.distractor_explanations;
    Explanations::new(e.correct_answer_explanation, d.d1.explanation, d.d2.explanation, d.d3.explanation)
  }
}

/// Accept `2` as well as `"2"` for the difficulty level.
fn lenient_level<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Level {
    Int(u8),
    Text(String),
  }
  match Level::deserialize(deserializer)? {
    Level::Int(n) => Ok(n),
    Level::Text(s) => s.trim().parse::<u8>().map_err(|_| de::Error::custom(format!("invalid difficulty {s:?}"))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::DistractorKey;

  #[test]
  fn every_shape_names_its_required_keys() {
    assert!(QuestionSetReply::SHAPE.contains("\"questions\""));
    assert!(CorrectAnswerReply::SHAPE.contains("\"correct_answer\""));
    assert!(DistractorsReply::SHAPE.contains("\"d3\""));
    assert!(ExplanationsReply::SHAPE.contains("\"distractor_explanations\""));
  }

  #[test]
  fn question_entry_accepts_string_difficulty() {
    let reply: QuestionSetReply = serde_json::from_str(
      r#"{"questions":[{"question_number":1,"question_text":"Why?","ek_code_specific_to_this_question":"EK1",
          "lo_code_specific_to_this_question":"LO1","task_verb":"Explain","difficulty":"2"}]}"#,
    )
    .expect("reply");
    assert_eq!(reply.questions[0].difficulty, 2);
    assert_eq!(reply.questions[0].ek_code_specific_to_this_question, "EK1");
  }

  #[test]
  fn explanations_keep_every_field() {
    let reply: ExplanationsReply = serde_json::from_str(
      r#"{"explanations":{"correct_answer_explanation":"right",
          "distractor_explanations":{"d1":{"explanation":"e1"},"d2":{"explanation":"e2"},"d3":{"explanation":"e3"}}}}"#,
    )
    .expect("reply");
    let e = Explanations::from(reply);
    assert_eq!(e.correct, "right");
    assert_eq!(e.for_distractor(DistractorKey::D1), "e1");
    assert_eq!(e.for_distractor(DistractorKey::D3), "e3");
  }

  #[test]
  fn distractors_without_d3_are_rejected() {
    let err = serde_json::from_str::<DistractorsReply>(
      r#"{"distractors":{"d1":{"response_text":"a"},"d2":{"response_text":"b"}}}"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("d3"));
  }
}
