//! Answer scoring: one low-temperature model call per (expected, student) pair.
//!
//! A pair never fails the batch. Unparseable replies, out-of-range scores and model
//! errors each degrade to a zero score with an "Error: ..." justification.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::domain::{AnswerPair, EvaluationResult};
use crate::ollama::{ChatMessage, ChatModel, ChatOptions};
use crate::protocol::{EvaluationMetadata, EvaluationResponse};
use crate::util::{extract_json_payload, fill_template, trunc_for_log};

const EVAL_OPTIONS: ChatOptions = ChatOptions { temperature: 0.2, top_p: Some(0.1) };

#[derive(Clone)]
pub struct Evaluator {
  model: Arc<dyn ChatModel>,
  prompts: Prompts,
}

impl Evaluator {
  pub fn new(model: Arc<dyn ChatModel>, prompts: Prompts) -> Self {
    Self { model, prompts }
  }

  /// Score every pair in order and summarize the batch.
  #[instrument(level = "info", target = "evaluation", skip_all, fields(pairs = pairs.len()))]
  pub async fn evaluate(&self, pairs: &[AnswerPair]) -> EvaluationResponse {
    let mut results = Vec::with_capacity(pairs.len());
    for (i, pair) in pairs.iter().enumerate() {
      results.push(self.evaluate_pair(pair, i + 1).await);
    }

    let metadata = summarize(&results);
    info!(
      target: "evaluation",
      total = metadata.total_pairs,
      successful = metadata.successful_evaluations,
      average = metadata.average_score,
      "Answer evaluation finished"
    );
    EvaluationResponse { results, metadata }
  }

  #[instrument(level = "debug", target = "evaluation", skip(self, pair), fields(student_len = pair.student_answer.len()))]
  async fn evaluate_pair(&self, pair: &AnswerPair, index: usize) -> EvaluationResult {
    let prompt = fill_template(
      &self.prompts.evaluation_template,
      &[("expected_answer", pair.expected_answer.trim()), ("student_answer", pair.student_answer.trim())],
    );
    match self.model.chat(&[ChatMessage::user(prompt)], EVAL_OPTIONS).await {
      Ok(text) => parse_evaluation(&text, index),
      Err(e) => {
        error!(target: "evaluation", pair = index, error = %e, "Model call failed for answer pair");
        EvaluationResult::failed(format!("Error: Failed to evaluate answer pair {}", index))
      }
    }
  }
}

/// Turn a `{"reasoning": ..., "score": ...}` reply into a result.
pub fn parse_evaluation(text: &str, index: usize) -> EvaluationResult {
  let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(extract_json_payload(text)) else {
    error!(target: "evaluation", pair = index, response = %trunc_for_log(text, 200), "Failed to parse evaluation response");
    return EvaluationResult::failed("Error: Failed to parse evaluation response");
  };

  let score = match obj.get("score") {
    None | Some(Value::Null) => Ok(0.0),
    Some(Value::Number(n)) => n.as_f64().ok_or_else(|| format!("could not convert {} to a number", n)),
    Some(Value::String(s)) => s
      .trim()
      .trim_end_matches('%')
      .parse::<f64>()
      .map_err(|_| format!("could not convert \"{}\" to a number", s)),
    Some(other) => Err(format!("could not convert {} to a number", other)),
  };
  let score = match score {
    Ok(s) if (0.0..=100.0).contains(&s) => s,
    Ok(_) => {
      error!(target: "evaluation", pair = index, "Score out of range");
      return EvaluationResult::failed("Error: Invalid score - Score must be between 0 and 100");
    }
    Err(reason) => {
      error!(target: "evaluation", pair = index, %reason, "Score is not a number");
      return EvaluationResult::failed(format!("Error: Invalid score - {}", reason));
    }
  };

  let justification = obj
    .get("reasoning")
    .and_then(Value::as_str)
    .map(str::to_string)
    .unwrap_or_else(|| "No reasoning provided".to_string());
  EvaluationResult { score, justification }
}

fn summarize(results: &[EvaluationResult]) -> EvaluationMetadata {
  let average_score = if results.is_empty() {
    0.0
  } else {
    results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64
  };
  EvaluationMetadata {
    total_pairs: results.len(),
    successful_evaluations: results.iter().filter(|r| r.score > 0.0).count(),
    average_score,
    timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
  }
}
