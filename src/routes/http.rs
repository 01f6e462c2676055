//! HTTP endpoint handlers. Thin wrappers that forward to `logic` and let
//! `ServiceError` render failures.

use std::sync::Arc;
use axum::{extract::State, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::domain::{QuestionPaper, QuestionRequest};
use crate::error::ServiceError;
use crate::logic::{evaluate_answers, generate_paper};
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info")]
pub async fn http_generation_health() -> impl IntoResponse {
  Json(ServiceHealthOut { status: "healthy", service: "question-generator" })
}

#[instrument(level = "info", skip(state, body), fields(request_id = %body.request_id))]
pub async fn http_post_generate_questions(
  State(state): State<Arc<AppState>>,
  Json(body): Json<QuestionRequest>,
) -> Result<Json<QuestionPaper>, ServiceError> {
  let paper = generate_paper(&state, &body).await?;
  info!(target: "generation", request_id = %body.request_id, questions = paper.questions.len(), "HTTP question paper served");
  Ok(Json(paper))
}

#[instrument(level = "info", skip(state, body), fields(pairs = body.answer_pairs.len()))]
pub async fn http_post_evaluate_answers(
  State(state): State<Arc<AppState>>,
  Json(body): Json<EvaluationRequest>,
) -> Result<Json<EvaluationResponse>, ServiceError> {
  let out = evaluate_answers(&state, &body).await?;
  info!(target: "evaluation", pairs = out.metadata.total_pairs, average = out.metadata.average_score, "HTTP evaluation served");
  Ok(Json(out))
}
