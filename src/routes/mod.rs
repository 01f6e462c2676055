//! Router assembly: HTTP endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
  routing::{get, post},
  Router,
};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - question generation and evaluation under `/api/v1/...`
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
  Router::new()
    .route("/api/v1/health", get(http::http_health))
    .route("/api/v1/qp-generation/health", get(http::http_generation_health))
    .route("/api/v1/qp-generation/generate-questions", post(http::http_post_generate_questions))
    .route("/api/v1/evaluation/evaluate-answers", post(http::http_post_evaluate_answers))
    .with_state(state)
    .layer(
      CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any),
    )
    .layer(
      TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

#[cfg(test)]
mod tests {
  use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Request, StatusCode},
  };
  use serde_json::{json, Value};
  use tempfile::{tempdir, TempDir};
  use tower::ServiceExt;

  use super::*;
  use crate::config::{Prompts, Settings};
  use crate::testing::{write_file, ScriptedModel};

  fn app(content: &TempDir, model: ScriptedModel) -> Router {
    let settings = Settings { content_dir: content.path().to_path_buf(), ..Settings::default() };
    build_router(Arc::new(AppState::new(settings, Prompts::default(), Arc::new(model))))
  }

  async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
      .header(CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap()
  }

  #[tokio::test]
  async fn health_endpoints_answer() {
    let content = tempdir().unwrap();
    let (status, body) = send(app(&content, ScriptedModel::new(vec![])), Request::get("/api/v1/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));

    let req = Request::get("/api/v1/qp-generation/health").body(Body::empty()).unwrap();
    let (_, body) = send(app(&content, ScriptedModel::new(vec![])), req).await;
    assert_eq!(body, json!({"status": "healthy", "service": "question-generator"}));
  }

  #[tokio::test]
  async fn bad_distribution_is_a_400_with_details() {
    let content = tempdir().unwrap();
    let req = post_json(
      "/api/v1/qp-generation/generate-questions",
      json!({
        "standard": "11th", "subject": "Biology", "chapter": "The Living World",
        "question_distribution": {"multiple_choice": 3, "multiple_select": 0, "short_descriptive": 0, "long_descriptive": 11},
        "difficulty_distribution": {"easy": 1, "medium": 1, "hard": 1}
      }),
    );
    let (status, body) = send(app(&content, ScriptedModel::new(vec![])), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation Error");
    let details: Vec<String> = serde_json::from_value(body["details"].clone()).unwrap();
    assert!(details.iter().any(|d| d.starts_with("long_descriptive:")));
    assert!(details.iter().any(|d| d.starts_with("difficulty_distribution:")));
  }

  #[tokio::test]
  async fn oversized_counts_are_a_400_not_a_panic() {
    let content = tempdir().unwrap();
    let req = post_json(
      "/api/v1/qp-generation/generate-questions",
      json!({
        "standard": "11th", "subject": "Biology", "chapter": "The Living World",
        "question_distribution": {"multiple_choice": u32::MAX, "multiple_select": 26, "short_descriptive": 0, "long_descriptive": 0},
        "difficulty_distribution": {"easy": u32::MAX, "medium": 26, "hard": 0}
      }),
    );
    let (status, body) = send(app(&content, ScriptedModel::new(vec![])), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"], json!(["question_distribution: expected at most 25, got 4294967321"]));
  }

  #[tokio::test]
  async fn evaluation_endpoint_scores_pairs() {
    let content = tempdir().unwrap();
    let model = ScriptedModel::replying(&[r#"{"reasoning": "Same idea.", "score": 90}"#]);
    let req = post_json(
      "/api/v1/evaluation/evaluate-answers",
      json!({
        "number_of_pairs": 1,
        "answer_pairs": [{"expected_answer": "Cells divide.", "student_answer": "Cells split in two."}]
      }),
    );
    let (status, body) = send(app(&content, model), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["score"], 90.0);
    assert_eq!(body["metadata"]["successful_evaluations"], 1);
  }

  #[tokio::test]
  async fn model_outage_maps_to_503() {
    let content = tempdir().unwrap();
    write_file(content.path(), "English/Teacher/NCERT/11th/Biology/The Living World/p1.png", b"png");
    let model = ScriptedModel::new(vec![
      Ok("Organisms grow.".into()),
      Err(crate::ollama::ModelError::Status { status: 502, message: "bad gateway".into() }),
    ]);
    let req = post_json(
      "/api/v1/qp-generation/generate-questions",
      json!({
        "standard": "11th", "subject": "Biology", "chapter": "The Living World",
        "question_distribution": {"multiple_choice": 1, "multiple_select": 0, "short_descriptive": 0, "long_descriptive": 0},
        "difficulty_distribution": {"easy": 1, "medium": 0, "hard": 0}
      }),
    );
    let (status, body) = send(app(&content, model), req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "LLM Service Error");
  }
}
