//! Loading generator configuration (criteria texts, instruction templates, pipeline knobs) from TOML.
//!
//! Every section and field is optional; missing values fall back to the built-in texts.
//! The loaded value is immutable and shared behind an `Arc` for the lifetime of the process.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::Difficulty;

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct GeneratorConfig {
  pub criteria: Criteria,
  pub prompts: Prompts,
  pub pipeline: PipelineSettings,
}

/// Task-verb taxonomies and writing criteria embedded into every instruction.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Criteria {
  pub blooms_easy: String,
  pub blooms_moderate: String,
  pub blooms_difficult: String,
  pub question: String,
  pub correct_answer: String,
  /// May reference `{absolutes}`.
  pub distractor: String,
  pub explanation: String,
  /// Absolute/extreme qualifiers distractors must avoid.
  pub absolutes: String,
}

impl Criteria {
  /// Task-verb taxonomy for a tier.
  pub fn taxonomy(&self, difficulty: Difficulty) -> &str {
    match difficulty {
      Difficulty::Easy => &self.blooms_easy,
      Difficulty::Moderate => &self.blooms_moderate,
      Difficulty::Difficult => &self.blooms_difficult,
    }
  }

  /// Distractor criteria with the absolutes list substituted in.
  pub fn distractor_with_absolutes(&self) -> String {
    crate::util::fill_template(&self.distractor, &[("absolutes", self.absolutes.trim())])
  }
}

/// Instruction templates. Placeholders use `{name}` and are filled per stage.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub question_set: String,
  pub correct_answer: String,
  pub distractors: String,
  pub explanations: String,
}

/// Scheduling and retry knobs.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
  /// Concurrent workers for each per-question wave.
  pub question_workers: usize,
  /// Attempts per stage call (1 = no retry).
  pub max_attempts: u32,
  pub retry_backoff_ms: u64,
}

impl Default for PipelineSettings {
  fn default() -> Self {
    Self { question_workers: 9, max_attempts: 1, retry_backoff_ms: 500 }
  }
}

impl Default for Criteria {
  fn default() -> Self {
    Self {
      blooms_easy: r#"
"Of the following, which definition" Define: Provide the exact meaning of a word, term, or concept.
"Select the statement which best identifies" Identify: Recognize and name specific components or characteristics.
"Which list" List: Enumerate items or ideas in a concise format.
"Which response best states" State: Express information clearly and concisely.
"Choose the option that best describes" Describe: Provide a detailed account of something's characteristics or features.
"Select the best explanation" Explain: Clarify a concept or process by providing reasons or examples.
"Choose the best summary" Summarize: Present the main points of information in a concise form.
"What interpretation" Interpret: Explain the meaning or significance of something.
"Which statement best illustrates" Illustrate: Provide examples or visual representations to clarify a point.
"How should one classify" Classify: Organize items into categories based on shared characteristics.
"Select the statement that best compares" Compare: Examine similarities between two or more things.
"Which statement best shows the contrast" Contrast: Examine differences between two or more things.
"How should you classify" Categorize: Group items or concepts based on shared characteristics.
"From the following options, choose the best estimate" Estimate: Make an approximate calculation or judgment.
"Which prediction" Predict: Anticipate future outcomes based on current information.
"#.into(),
      blooms_moderate: r#"
Calculate: Determine a value using mathematical processes.
"Which statement demonstrates" Demonstrate: Show how something works or how a process is completed.
"Determine which option" Determine: Establish or conclude after consideration or investigation.
"Choose the best option from the following options to respond to the question. Differentiate.." Differentiate: Identify the differences between two or more things.
"Which response best justifies" Justify: Provide reasons or evidence to support a claim or decision.
Organize: Arrange information or items in a structured manner.
"Which response best relates" Relate: Show or establish a connection between things.
Solve: Find a solution to a problem or challenge.
"Which statement best supports" Support: Provide evidence or arguments to back up a claim or position.
"#.into(),
      blooms_difficult: r#"
"Of the following responses, which is the most accurate appraisal" Appraise: Assess the value or quality of something.
"Apply what you learned in the article to" Apply: Use knowledge or skills in a new situation.
"Which argument best" Argue: Present reasons for or against a point or idea.
"Which is the most logical conclusion..." Conclude: Reach a logical end or judgment by reasoning.
"What is the most likely critique for" Critique: Offer a detailed analysis and assessment of something.
"Which of the following is the best design for" Design: Plan or create something for a specific purpose.
"What is the most logical evaluation" Evaluate: Make a judgment about the value or quality of something.
"Which hypothesis" Hypothesize: Propose an explanation for a phenomenon based on limited evidence.
Judge: Form an opinion or conclusion about something.
"Which is the most logical plan" Plan: Devise a method for doing or achieving something.
"Which of the following would you propose as the best" Propose: Put forward an idea or plan for consideration.
"Which of the following would you recommend" Recommend: Suggest something as worthy of being adopted or done.
"#.into(),
      question: "
Relates to one or more ek_codes
Contains task verbs from LOs if present
Can be answered by information in the text.
Can be answered in 1 to 2 short sentences
Connects a concept in the text to the broader themes in the ek or lo codes
The question contains all of the information a well prepared student would need to find the correct response.
The question is clearly stated (does not have another interpretation)
There is only one connection being made in the question: the word and is not used to create compound questions
".into(),
      correct_answer: "
The response is factually correct
Is one sentence of up to 20 words.
Responds to all parts of the question. If the question asks for a comparison, a comparison is made.
Correctly uses the task verb. If the question is regarding an argument, the response includes an argument. If the question asks for a combination, the response includes a combination
".into(),
      distractor: "
A distractor does not use {absolutes} or extreme phrases because an intelligent student would not believe sentences with these words
Is not more than 2 words longer or shorter than the correct response.
Contains the same number of commas as the correct response
Correctly uses the task verbs in blooms. If the question is regarding an argument, the response includes an argument. If the question asks for a combination, the response includes a combination
Responds to all parts of the question
Could not be confused for a correct answer
Each distractor is unique in interpretation from all other response options
Is related to the time period or lo_code
".into(),
      explanation: "
Factually correct information provided to enhance or cement student learning
1-2 sentences explaining: why the response is correct or incorrect based on relevant information in the text.
Addresses what is correct and what is incorrect in the response
".into(),
      absolutes: "all, absolute, always, complete, completely, entirely, every, exclusively, extinction, identical, \
immediate, immediately, irrelevant, never, none, purely, solely, sole, unchanging, uniform, universal".into(),
    }
  }
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      question_set: "You are a psychometrician turned high school teacher. Your task is building AP level learning assessments.
The assessment is to test whether students read this <article>{article}</article>
+Use task verbs from <blooms>{blooms}</blooms> to write exactly three questions that will prove a student can connect the article information to their understanding
+Read these <questions>{current_question_bank}</questions> that are already on the assessment to ensure you do not write a duplicate question.
+Follow these specific <criteria>{criteria}</criteria>
+You must write all 3 questions without using and to create compound questions.
+Ask the 3 questions in the format \"which\" \"what\" \"how\" \"why\" etc
+For each question, specify which ek_code and lo_code it addresses from <ek>{ek_codes}</ek> and <lo>{lo_codes}</lo>
+Do not refer to the article in the question. students know where the questions come from.
+All questions in this set should have difficulty: {difficulty}
You have to cleverly add escape characters if something could break the JSON from being processed through code. You have to strictly use the provided schema.

Please output your response in this exact JSON format without any additional text outside JSON:
{json_structure}".into(),
      correct_answer: "You are a student who has to take an AP assessment.
The teacher wants to be sure you read <article>{article}</article>, and that you understand how to connect <ek>{ek_codes}</ek> and other information in the article to the important <lo>{lo_codes}</lo> and has written an assignment.
This is the question <question>{question}</question>.
+You must first identify the task verb used in the question. Review Blooms <difficulty>{blooms}</difficulty> to ensure that you correctly follow the necessary steps to answer the question.
-(e.g. if the question asks for a definition, you will provide a definition in the correct response)
+The teacher also gave you <criteria>{criteria}</criteria> to teach you how to answer these questions and do well on the AP Exam.
+You have to use information found in the article along with your existing knowledge of the topic
+Do not restate the question in your response.
+You must answer this question correctly in only 1 sentence of less than 20 words.
+The response must be factually correct
You have to cleverly add escape characters if something could break the JSON from being processed through code. You have to strictly use the provided schema.

Please output your response in this exact JSON format without any additional text outside JSON:
{json_structure}".into(),
      distractors: "You are a psychometrician turned high school teacher. Your task is building assessments for AP level learning assessments.
The assessment is to test whether students read this <article>{article}</article>
The <question>{question}</question> and the <correct>{correct}</correct> are already written.
A distractor is a believable lie that a teacher might tell to determine whether a student read the article before the exam.
Now you must devise exactly three plausible distractors to the question that will trick students who came to class but did not read the article well.
+Even though a response is incorrect, it must address all parts of the question.
You must first identify the task verb used in the question. Review Blooms <blooms>{blooms}</blooms> to ensure that you understand the task verbs and do what the question is asking.
+You have to use information found in the article along with your existing knowledge about the topic
+Distractors must be very similar to the correct response. Review the <criteria>{criteria}</criteria>
+Do not restate the question in your response.
+You must write the distractors for this question in only 1 sentence of less than 20 words each.
+You must write all 3 distractors.
You have to cleverly add escape characters if something could break the JSON from being processed through code. You have to strictly use the provided schema.

Please output your response in this exact JSON format without any additional text outside JSON:
{json_structure}".into(),
      explanations: "You are a psychometrician turned high school teacher. Your task is writing feedback for the students in your class.
The assessment is to test whether students read this <article>{article}</article>
+See the <question>{question}</question> and guidelines for feedback <criteria>{criteria}</criteria>
+One student wrote a <correct>{correct}</correct> using the information from the article, follow the criteria to explain in 1-2 sentences why this information is correct to solidify their learning
+Three students wrote incorrect responses <distractors>{distractors}</distractors>. Using the information from the article and your own knowledge of the topic, follow the criteria to explain in 1-2 sentences why this information is wrong to strengthen their understanding
+Rather than referring to the article, start each explanation with \"This answer is correct/incorrect. You previously learned\" followed by the correct information that would help answer the question
+If the information is not directly in the article, explain how the student could apply critical thinking to arrive at the correct response.
+DO NOT REFER TO THE ARTICLE OR THE READING MATERIAL directly. You have to use that along with your own knowledge to write high quality explanations.
You have already been provided with the correct and the incorrect responses; write the explanations based on that information.
You have to cleverly add escape characters if something could break the JSON from being processed through code.
Please output your response in this exact JSON format without any additional text outside JSON:
{json_structure}".into(),
    }
  }
}

impl GeneratorConfig {
  pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
    let mut cfg = toml::from_str::<GeneratorConfig>(s)?;
    cfg.pipeline.question_workers = cfg.pipeline.question_workers.max(1);
    cfg.pipeline.max_attempts = cfg.pipeline.max_attempts.max(1);
    Ok(cfg)
  }
}

/// Load `GeneratorConfig` from AGENT_CONFIG_PATH. Any IO/parse error is logged and defaults are used.
pub fn load_generator_config_from_env() -> GeneratorConfig {
  let Ok(path) = std::env::var("AGENT_CONFIG_PATH") else {
    info!(target: "mcq_bank_backend", "AGENT_CONFIG_PATH not set; using built-in criteria and prompts");
    return GeneratorConfig::default();
  };
  match std::fs::read_to_string(&path) {
    Ok(s) => match GeneratorConfig::from_toml_str(&s) {
      Ok(cfg) => {
        info!(target: "mcq_bank_backend", %path, "Loaded generator config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "mcq_bank_backend", %path, error = %e, "Failed to parse TOML config; using defaults");
        GeneratorConfig::default()
      }
    },
    Err(e) => {
      error!(target: "mcq_bank_backend", %path, error = %e, "Failed to read TOML config file; using defaults");
      GeneratorConfig::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_toml_keeps_remaining_defaults() {
    let cfg = GeneratorConfig::from_toml_str(
      r#"
[criteria]
absolutes = "never, always"

[pipeline]
max_attempts = 3
"#,
    )
    .expect("config");
    assert_eq!(cfg.criteria.absolutes, "never, always");
    assert_eq!(cfg.pipeline.max_attempts, 3);
    assert_eq!(cfg.pipeline.question_workers, 9);
    assert_eq!(cfg.prompts.question_set, Prompts::default().question_set);
  }

  #[test]
  fn zero_workers_and_attempts_are_clamped() {
    let cfg = GeneratorConfig::from_toml_str("[pipeline]\nquestion_workers = 0\nmax_attempts = 0\n").expect("config");
    assert_eq!(cfg.pipeline.question_workers, 1);
    assert_eq!(cfg.pipeline.max_attempts, 1);
  }

  #[test]
  fn distractor_criteria_embed_absolutes() {
    let criteria = Criteria::default();
    let text = criteria.distractor_with_absolutes();
    assert!(text.contains("does not use all, absolute, always"));
    assert!(!text.contains("{absolutes}"));
  }

  #[test]
  fn taxonomy_follows_tier() {
    let criteria = Criteria::default();
    assert!(criteria.taxonomy(Difficulty::Easy).contains("Define:"));
    assert!(criteria.taxonomy(Difficulty::Moderate).contains("Justify:"));
    assert!(criteria.taxonomy(Difficulty::Difficult).contains("Critique:"));
  }
}
