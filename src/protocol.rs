//! Public request/response structs for the HTTP endpoints (serde ready).
//! Paper and question shapes live in `domain`; this holds the envelope types.

use serde::{Deserialize, Serialize};

use crate::domain::{AnswerPair, EvaluationResult};

#[derive(Debug, Deserialize)]
pub struct EvaluationRequest {
  pub number_of_pairs: usize,
  pub answer_pairs: Vec<AnswerPair>,
}

#[derive(Debug, Serialize)]
pub struct EvaluationResponse {
  pub results: Vec<EvaluationResult>,
  pub metadata: EvaluationMetadata,
}

#[derive(Debug, Serialize)]
pub struct EvaluationMetadata {
  pub total_pairs: usize,
  /// Pairs scored above zero.
  pub successful_evaluations: usize,
  pub average_score: f64,
  /// RFC 3339.
  pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct HealthOut {
  pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct ServiceHealthOut {
  pub status: &'static str,
  pub service: &'static str,
}
