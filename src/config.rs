//! Runtime settings (env vars) and prompt templates (defaults, optionally
//! overridden from a TOML file at PROMPTS_CONFIG_PATH).

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Invalid value for {name}: {reason}")]
  Invalid { name: &'static str, reason: String },
}

#[derive(Clone, Debug)]
pub struct Settings {
  pub host: String,
  pub port: u16,
  pub content_dir: PathBuf,
  pub content_role: String,
  pub ollama_base_url: String,
  pub llm_model: String,
  pub max_retries: u32,
  pub request_timeout_secs: u64,
  pub max_questions: u32,
  pub max_long_descriptive: u32,
  pub prompts_path: Option<PathBuf>,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      host: "0.0.0.0".into(),
      port: 8000,
      content_dir: PathBuf::from("./content"),
      content_role: "Teacher".into(),
      ollama_base_url: "http://localhost:11434".into(),
      llm_model: "llama3.2-vision".into(),
      max_retries: 3,
      request_timeout_secs: 300,
      max_questions: 25,
      max_long_descriptive: 10,
      prompts_path: None,
    }
  }
}

impl Settings {
  pub fn from_env() -> Result<Self, ConfigError> {
    let d = Settings::default();
    Ok(Self {
      host: std::env::var("HOST").unwrap_or(d.host),
      port: env_parse("PORT", d.port)?,
      content_dir: std::env::var("CONTENT_DIR").map(PathBuf::from).unwrap_or(d.content_dir),
      content_role: std::env::var("CONTENT_ROLE").unwrap_or(d.content_role),
      ollama_base_url: std::env::var("OLLAMA_BASE_URL").unwrap_or(d.ollama_base_url),
      llm_model: std::env::var("LLM_MODEL").unwrap_or(d.llm_model),
      max_retries: env_parse("MAX_RETRIES", d.max_retries)?,
      request_timeout_secs: env_parse("REQUEST_TIMEOUT", d.request_timeout_secs)?,
      max_questions: env_parse("MAX_QUESTIONS", d.max_questions)?,
      max_long_descriptive: env_parse("MAX_LONG_DESCRIPTIVE", d.max_long_descriptive)?,
      prompts_path: std::env::var("PROMPTS_CONFIG_PATH").ok().map(PathBuf::from),
    })
  }
}

fn env_parse<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
  T: std::str::FromStr,
  T::Err: std::fmt::Display,
{
  match std::env::var(name) {
    Ok(raw) => raw
      .trim()
      .parse()
      .map_err(|e: T::Err| ConfigError::Invalid { name, reason: e.to_string() }),
    Err(_) => Ok(default),
  }
}

/// Prompt templates. `{placeholders}` are filled with `util::fill_template`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub image_context: String,
  pub question_system_template: String,
  pub question_user_template: String,
  pub evaluation_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      image_context: "Extract the key points from this image to understand its context.".into(),
      question_system_template: "You are an expert in creating {question_type} questions at {difficulty} level. Generate EXACTLY {count} questions in proper JSON format.".into(),
      question_user_template: QUESTION_USER_TEMPLATE.into(),
      evaluation_template: EVALUATION_TEMPLATE.into(),
    }
  }
}

const QUESTION_USER_TEMPLATE: &str = r#"Generate EXACTLY {count} NEW {question_type} questions for {syllabus} {standard} {subject} at {difficulty} level.

Chapter: {chapter}
{scope}

CRITICAL REQUIREMENTS:
1. Generate EXACTLY {count} questions - no more, no less
2. Each question must include all required fields
3. All content must be in {language}
4. All questions must be at {difficulty} difficulty level
5. Questions must be based on the provided context

{shape}

Return ONLY a JSON array of questions without prefixes or decorators.

Context:
{context}"#;

const EVALUATION_TEMPLATE: &str = r#"You are an AI assistant tasked with comparing student answers with key answers and provide a precise evaluation score (0-100) indicating how well the actual answer matches the expected answer semantically. Use the examples below as guidance.

Example 1 (10% similarity):
Key answer: "The Big Bang Theory explains that the universe began as a singularity, which then rapidly expanded, leading to the formation of matter, galaxies, and eventually stars and planets."
Student answer: "The Earth is part of the Milky Way galaxy, which contains billions of stars and planets."
Result: 10% semantically similar.

Example 2 (30% similarity):
Key answer: "According to the Big Bang Theory, the universe expanded from an extremely hot and dense state approximately 13.8 billion years ago, giving rise to galaxies, stars, and planets."
Student answer: "Stars and planets formed from clouds of gas and dust, with gravity playing a key role in their creation and development over billions of years."
Result: 30% semantically similar.

Example 3 (50% similarity):
Key answer: "The Big Bang Theory explains the origin of the universe as a rapid expansion from a very hot, dense singularity that gave rise to galaxies, stars, and planets, forming the universe as we know it."
Student answer: "The universe began with a massive expansion from a singularity, and over time, galaxies, stars, and planets formed, shaping the cosmos."
Result: 50% semantically similar.

Example 4 (70% similarity):
Key answer: "The Big Bang Theory proposes that the universe began as a singular point that expanded rapidly, resulting in the cooling and formation of matter, which later formed stars and galaxies."
Student answer: "The Big Bang was a rapid expansion of a singular point, leading to the cooling of the universe and the creation of matter, stars, and galaxies."
Result: 70% semantically similar.

Example 5 (90% similarity):
Key answer: "The Big Bang Theory states that the universe began as an extremely hot and dense singularity that expanded, cooling over time and allowing matter to form stars, galaxies, and the large-scale structure we see today."
Student answer: "According to the Big Bang Theory, the universe started from a very hot, dense singularity, expanding and cooling over time, leading to the formation of stars, galaxies, and the universe's structure."
Result: 90% semantically similar.

Now, evaluate the following:
Key answer: "{expected_answer}"
Student answer: "{student_answer}"

What is the percentage of semantic similarity between the key answer and the student answer? Please provide reasoning and the percentage similarity score.

Return the result in the following JSON format without prefixing with the word 'json':
{"reasoning": "...", "score": ...}"#;

/// Load prompts from `path` if given. Any IO/parse error falls back to defaults.
pub fn load_prompts(path: Option<&PathBuf>) -> Prompts {
  let Some(path) = path else {
    return Prompts::default();
  };
  match std::fs::read_to_string(path) {
    Ok(s) => match toml::from_str::<Prompts>(&s) {
      Ok(p) => {
        info!(target: "qpgen_backend", path = %path.display(), "Loaded prompt templates (TOML)");
        p
      }
      Err(e) => {
        error!(target: "qpgen_backend", path = %path.display(), error = %e, "Failed to parse TOML prompts; using defaults");
        Prompts::default()
      }
    },
    Err(e) => {
      error!(target: "qpgen_backend", path = %path.display(), error = %e, "Failed to read TOML prompts; using defaults");
      Prompts::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_toml_keeps_other_defaults() {
    let p: Prompts = toml::from_str(r#"image_context = "Summarize the page.""#).unwrap();
    assert_eq!(p.image_context, "Summarize the page.");
    assert_eq!(p.evaluation_template, Prompts::default().evaluation_template);
  }

  #[test]
  fn missing_prompt_file_falls_back_to_defaults() {
    let p = load_prompts(Some(&PathBuf::from("/definitely/not/here.toml")));
    assert_eq!(p.image_context, Prompts::default().image_context);
  }

  #[test]
  fn defaults_match_documented_limits() {
    let s = Settings::default();
    assert_eq!(s.max_long_descriptive, 10);
    assert_eq!(s.max_questions, 25);
    assert_eq!(s.llm_model, "llama3.2-vision");
  }
}
