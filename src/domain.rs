//! Domain models: the generation request, questions, answer options and the final bank.

use std::fmt;

/// Questions produced per difficulty tier.
pub const QUESTIONS_PER_TIER: usize = 3;
/// Questions in a complete bank (three tiers of three).
pub const BANK_SIZE: usize = QUESTIONS_PER_TIER * 3;

/// Input bundle for one pipeline run. Read-only to every stage.
#[derive(Clone, Debug, Default)]
pub struct GenerationRequest {
  pub source_text: String,
  pub existing_question_bank_text: String,
  pub competency_codes: String,
  pub objective_codes: String,
}

/// Difficulty tier. Each tier owns a contiguous block of question numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Difficulty {
  Easy,
  Moderate,
  Difficult,
}

impl Difficulty {
  pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Moderate, Difficulty::Difficult];

  pub fn level(self) -> u8 {
    match self {
      Difficulty::Easy => 1,
      Difficulty::Moderate => 2,
      Difficulty::Difficult => 3,
    }
  }

  pub fn from_level(level: u8) -> Option<Self> {
    match level {
      1 => Some(Difficulty::Easy),
      2 => Some(Difficulty::Moderate),
      3 => Some(Difficulty::Difficult),
      _ => None,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      Difficulty::Easy => "easy",
      Difficulty::Moderate => "moderate",
      Difficulty::Difficult => "difficult",
    }
  }

  /// Bank-wide number for the `local_index`-th (1-based) question of this tier.
  pub fn question_number(self, local_index: usize) -> u32 {
    (self.level() as u32 - 1) * QUESTIONS_PER_TIER as u32 + local_index as u32
  }
}

impl TryFrom<u8> for Difficulty {
  type Error = String;
  fn try_from(level: u8) -> Result<Self, Self::Error> {
    Difficulty::from_level(level).ok_or_else(|| format!("difficulty must be 1, 2 or 3 (got {level})"))
  }
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.level(), self.label())
  }
}

/// A generated question. `number` is reassigned by the difficulty scheduler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Question {
  pub number: u32,
  pub text: String,
  pub competency_code: String,
  pub objective_code: String,
  pub task_verb: String,
  pub difficulty: Difficulty,
}

/// Position of a distractor; pairs each distractor with its explanation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DistractorKey {
  D1,
  D2,
  D3,
}

impl DistractorKey {
  pub const ALL: [DistractorKey; 3] = [DistractorKey::D1, DistractorKey::D2, DistractorKey::D3];

  fn index(self) -> usize {
    match self {
      DistractorKey::D1 => 0,
      DistractorKey::D2 => 1,
      DistractorKey::D3 => 2,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      DistractorKey::D1 => "d1",
      DistractorKey::D2 => "d2",
      DistractorKey::D3 => "d3",
    }
  }
}

/// Exactly three incorrect answer texts, keyed d1..d3.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Distractors([String; 3]);

impl Distractors {
  pub fn new(d1: String, d2: String, d3: String) -> Self { Self([d1, d2, d3]) }

  pub fn get(&self, key: DistractorKey) -> &str { &self.0[key.index()] }

  pub fn iter(&self) -> impl Iterator<Item = (DistractorKey, &str)> {
    DistractorKey::ALL.into_iter().map(move |k| (k, self.get(k)))
  }
}

/// Explanation for the correct answer plus one per distractor key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Explanations {
  pub correct: String,
  distractors: [String; 3],
}

impl Explanations {
  pub fn new(correct: String, d1: String, d2: String, d3: String) -> Self {
    Self { correct, distractors: [d1, d2, d3] }
  }

  pub fn for_distractor(&self, key: DistractorKey) -> &str { &self.distractors[key.index()] }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerOption {
  pub label: String,
  pub is_correct: bool,
  pub explanation: String,
}

/// Terminal artifact: one question with its four options in randomized order.
#[derive(Clone, Debug)]
pub struct FormattedQuestion {
  pub number: u32,
  pub prompt_text: String,
  pub options: [AnswerOption; 4],
  pub difficulty: Difficulty,
}

impl FormattedQuestion {
  pub fn correct_position(&self) -> Option<usize> {
    self.options.iter().position(|o| o.is_correct)
  }
}

/// Ordered by ascending question number.
#[derive(Clone, Debug, Default)]
pub struct QuestionBank {
  pub questions: Vec<FormattedQuestion>,
}

impl QuestionBank {
  pub fn len(&self) -> usize { self.questions.len() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tiers_own_contiguous_number_blocks() {
    let numbers: Vec<Vec<u32>> = Difficulty::ALL
      .iter()
      .map(|d| (1..=QUESTIONS_PER_TIER).map(|i| d.question_number(i)).collect())
      .collect();
    assert_eq!(numbers, vec![vec![1, 2, 3], vec![4, 5, 6], vec![7, 8, 9]]);
  }

  #[test]
  fn difficulty_rejects_out_of_range_levels() {
    assert_eq!(Difficulty::try_from(2u8), Ok(Difficulty::Moderate));
    assert!(Difficulty::try_from(0u8).is_err());
    assert!(Difficulty::try_from(4u8).is_err());
  }

  #[test]
  fn distractors_iterate_in_key_order() {
    let d = Distractors::new("a".into(), "b".into(), "c".into());
    let keys: Vec<&str> = d.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["d1", "d2", "d3"]);
    assert_eq!(d.get(DistractorKey::D3), "c");
  }
}
