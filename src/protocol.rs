//! Public protocol structs for the HTTP endpoints (serde ready).
//! Field names match what the existing assessment frontend sends and reads.

use serde::{Deserialize, Serialize};

use crate::domain::{FormattedQuestion, GenerationRequest, QuestionBank};

/// Body of `POST /generate-questions`.
#[derive(Debug, Deserialize)]
pub struct QuestionRequestIn {
    pub article: String,
    pub current_question_bank: String,
    pub ek_codes: String,
    pub lo_codes: String,
}

impl From<QuestionRequestIn> for GenerationRequest {
    fn from(r: QuestionRequestIn) -> Self {
        GenerationRequest {
            source_text: r.article,
            existing_question_bank_text: r.current_question_bank,
            competency_codes: r.ek_codes,
            objective_codes: r.lo_codes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResponseOut {
    pub label: String,
    #[serde(rename = "isCorrect")]
    pub is_correct: bool,
    pub explanation: String,
}

#[derive(Debug, Serialize)]
pub struct McqOut {
    pub material: String,
    pub responses: Vec<ResponseOut>,
    pub difficulty: u8,
}

#[derive(Debug, Serialize)]
pub struct QuestionBankOut {
    #[serde(rename = "questionBank")]
    pub question_bank: Vec<McqOut>,
}

/// Convert one formatted question to the public DTO, keeping the shuffled option order.
pub fn to_out(q: &FormattedQuestion) -> McqOut {
    McqOut {
        material: q.prompt_text.clone(),
        responses: q
            .options
            .iter()
            .map(|o| ResponseOut {
                label: o.label.clone(),
                is_correct: o.is_correct,
                explanation: o.explanation.clone(),
            })
            .collect(),
        difficulty: q.difficulty.level(),
    }
}

impl From<&QuestionBank> for QuestionBankOut {
    fn from(bank: &QuestionBank) -> Self {
        QuestionBankOut { question_bank: bank.questions.iter().map(to_out).collect() }
    }
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub generation_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AnswerOption, Difficulty};

    #[test]
    fn request_fields_map_onto_generation_request() {
        let body: QuestionRequestIn = serde_json::from_str(
            r#"{"article":"A","current_question_bank":"B","ek_codes":"EK","lo_codes":"LO"}"#,
        )
        .expect("body");
        let req = GenerationRequest::from(body);
        assert_eq!(req.source_text, "A");
        assert_eq!(req.existing_question_bank_text, "B");
        assert_eq!(req.competency_codes, "EK");
        assert_eq!(req.objective_codes, "LO");
    }

    #[test]
    fn bank_serializes_with_frontend_field_names() {
        let option = |label: &str, is_correct| AnswerOption {
            label: label.into(),
            is_correct,
            explanation: format!("about {label}"),
        };
        let bank = QuestionBank {
            questions: vec![FormattedQuestion {
                number: 4,
                prompt_text: "Why?".into(),
                options: [option("b", false), option("a", true), option("c", false), option("d", false)],
                difficulty: Difficulty::Moderate,
            }],
        };
        let v = serde_json::to_value(QuestionBankOut::from(&bank)).expect("json");
        let q = &v["questionBank"][0];
        assert_eq!(q["material"], "Why?");
        assert_eq!(q["difficulty"], 2);
        assert_eq!(q["responses"][1]["label"], "a");
        assert_eq!(q["responses"][1]["isCorrect"], true);
        assert_eq!(q["responses"][0]["explanation"], "about b");
        assert!(q.get("number").is_none());
    }
}
