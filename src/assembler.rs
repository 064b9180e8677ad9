//! Assembler: joins each question's answer, distractors and explanations into four
//! options and shuffles them. The shuffle is unseeded so the answer key has no fixed slot.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::domain::{AnswerOption, Distractors, Explanations, FormattedQuestion, Question, QuestionBank};
use crate::error::{PipelineError, Result};
use crate::scheduler::WaveResults;

/// Build the four options for one question (each distractor paired with the
/// explanation of the same key) and shuffle them with `rng`.
pub fn format_question<R: Rng + ?Sized>(
  question: &Question,
  correct_answer: &str,
  distractors: &Distractors,
  explanations: &Explanations,
  rng: &mut R,
) -> FormattedQuestion {
  let [d1, d2, d3] = crate::domain::DistractorKey::ALL.map(|key| AnswerOption {
    label: distractors.get(key).to_string(),
    is_correct: false,
    explanation: explanations.for_distractor(key).to_string(),
  });
  let mut options = [
    AnswerOption {
      label: correct_answer.to_string(),
      is_correct: true,
      explanation: explanations.correct.clone(),
    },
    d1,
    d2,
    d3,
  ];
  options.shuffle(rng);

  FormattedQuestion {
    number: question.number,
    prompt_text: question.text.clone(),
    options,
    difficulty: question.difficulty,
  }
}

/// Format every question in ascending number order.
pub fn assemble(questions: &[Question], waves: &WaveResults) -> Result<QuestionBank> {
  let mut ordered: Vec<&Question> = questions.iter().collect();
  ordered.sort_by_key(|q| q.number);

  let mut rng = rand::thread_rng();
  let mut formatted = Vec::with_capacity(ordered.len());
  for q in ordered {
    let missing = |what: &str| PipelineError::Internal(format!("no {what} for question {}", q.number));
    let answer = waves.correct_answers.get(&q.number).ok_or_else(|| missing("correct answer"))?;
    let distractors = waves.distractors.get(&q.number).ok_or_else(|| missing("distractors"))?;
    let explanations = waves.explanations.get(&q.number).ok_or_else(|| missing("explanations"))?;
    let f = format_question(q, answer, distractors, explanations, &mut rng);
    debug!(target: "pipeline", question_number = f.number, correct_slot = ?f.correct_position(), "Options shuffled");
    formatted.push(f);
  }
  Ok(QuestionBank { questions: formatted })
}

#[cfg(test)]
mod tests {
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  use super::*;
  use crate::domain::Difficulty;

  fn sample(number: u32) -> (Question, String, Distractors, Explanations) {
    let q = Question {
      number,
      text: format!("Question {number}?"),
      competency_code: "EK".into(),
      objective_code: "LO".into(),
      task_verb: "Explain".into(),
      difficulty: Difficulty::Easy,
    };
    let d = Distractors::new("wrong one".into(), "wrong two".into(), "wrong three".into());
    let e = Explanations::new("why right".into(), "why one".into(), "why two".into(), "why three".into());
    (q, "right".into(), d, e)
  }

  #[test]
  fn exactly_one_correct_option_with_matching_explanations() {
    let (q, answer, d, e) = sample(1);
    let mut rng = StdRng::seed_from_u64(7);
    let f = format_question(&q, &answer, &d, &e, &mut rng);

    assert_eq!(f.options.iter().filter(|o| o.is_correct).count(), 1);
    for o in &f.options {
      let expected = match o.label.as_str() {
        "right" => "why right",
        "wrong one" => "why one",
        "wrong two" => "why two",
        "wrong three" => "why three",
        other => panic!("unexpected label {other}"),
      };
      assert_eq!(o.explanation, expected);
    }
    assert_eq!(f.prompt_text, "Question 1?");
  }

  #[test]
  fn correct_slot_is_spread_uniformly() {
    let (q, answer, d, e) = sample(1);
    let mut rng = rand::thread_rng();
    let mut slots = [0usize; 4];
    let runs = 4000;
    for _ in 0..runs {
      let f = format_question(&q, &answer, &d, &e, &mut rng);
      slots[f.correct_position().expect("correct option")] += 1;
    }
    // Expected 1000 per slot, sd ~27; the bounds are far outside chance.
    for (slot, count) in slots.iter().enumerate() {
      assert!((800..=1200).contains(count), "slot {slot} got {count} of {runs}");
    }
  }

  #[test]
  fn assemble_orders_by_question_number() {
    let mut questions = Vec::new();
    let mut waves = WaveResults::default();
    for n in [3u32, 1, 2] {
      let (q, answer, d, e) = sample(n);
      waves.correct_answers.insert(n, answer);
      waves.distractors.insert(n, d);
      waves.explanations.insert(n, e);
      questions.push(q);
    }
    let bank = assemble(&questions, &waves).expect("bank");
    assert_eq!(bank.questions.iter().map(|f| f.number).collect::<Vec<_>>(), vec![1, 2, 3]);
  }

  #[test]
  fn assemble_reports_missing_results() {
    let (q, answer, d, _) = sample(4);
    let mut waves = WaveResults::default();
    waves.correct_answers.insert(4, answer);
    waves.distractors.insert(4, d);
    let err = assemble(&[q], &waves).unwrap_err();
    assert!(matches!(err, PipelineError::Internal(ref m) if m.contains("explanations")), "{err}");
  }
}
