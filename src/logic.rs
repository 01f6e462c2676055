//! Service flows behind the HTTP handlers.
//!
//! Generation: validate request → locate chapter images → extract context → generate.
//! Evaluation: validate request → score each pair.

use tracing::{info, instrument, warn};

use crate::domain::{QuestionPaper, QuestionRequest};
use crate::error::{Result, ServiceError, Violation};
use crate::images::{chapter_context, chapter_dir, get_images, IMAGE_EXTENSIONS};
use crate::protocol::{EvaluationRequest, EvaluationResponse};
use crate::state::AppState;
use crate::validator::{validate_evaluation_request, validate_request};

#[instrument(
  level = "info",
  target = "generation",
  skip_all,
  fields(request_id = %request.request_id, standard = %request.standard, subject = %request.subject, chapter = %request.chapter)
)]
pub async fn generate_paper(state: &AppState, request: &QuestionRequest) -> Result<QuestionPaper> {
  validate_request(request, state.limits())?;

  let dir = chapter_dir(&state.settings.content_dir, &state.settings.content_role, request);
  if !tokio::fs::metadata(&dir).await.map(|m| m.is_dir()).unwrap_or(false) {
    warn!(target: "generation", dir = %dir.display(), "Chapter directory not found");
    return Err(ServiceError::RequestShape {
      violations: vec![Violation::request("chapter", "an existing chapter directory", dir.display().to_string())],
    });
  }
  let images = get_images(&dir, &IMAGE_EXTENSIONS).await;
  if images.is_empty() {
    return Err(ServiceError::RequestShape {
      violations: vec![Violation::request("chapter", "at least one page image", format!("none in {}", dir.display()))],
    });
  }

  let context = chapter_context(state.model.as_ref(), &state.prompts.image_context, &images).await?;
  let paper = state.generator.generate_questions(request, &context).await?;
  info!(target: "generation", questions = paper.questions.len(), pages = context.pages, "Paper ready");
  Ok(paper)
}

#[instrument(level = "info", target = "evaluation", skip_all, fields(pairs = req.number_of_pairs))]
pub async fn evaluate_answers(state: &AppState, req: &EvaluationRequest) -> Result<EvaluationResponse> {
  validate_evaluation_request(req.number_of_pairs, &req.answer_pairs)?;
  Ok(state.evaluator.evaluate(&req.answer_pairs).await)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use serde_json::json;
  use tempfile::{tempdir, TempDir};

  use super::*;
  use crate::config::{Prompts, Settings};
  use crate::domain::AnswerPair;
  use crate::testing::{write_file, ScriptedModel};

  fn state_with(content: &TempDir, model: Arc<ScriptedModel>) -> AppState {
    let settings = Settings { content_dir: content.path().to_path_buf(), ..Settings::default() };
    AppState::new(settings, Prompts::default(), model)
  }

  fn request() -> QuestionRequest {
    serde_json::from_value(json!({
      "request_id": "req-9",
      "standard": "11th",
      "subject": "Biology",
      "chapter": "The Living World",
      "question_distribution": {"multiple_choice": 1, "multiple_select": 0, "short_descriptive": 0, "long_descriptive": 0},
      "difficulty_distribution": {"easy": 0, "medium": 1, "hard": 0}
    }))
    .unwrap()
  }

  #[tokio::test]
  async fn full_flow_reads_pages_then_generates() {
    let content = tempdir().unwrap();
    write_file(content.path(), "English/Teacher/NCERT/11th/Biology/The Living World/page1.png", b"png");
    let mcq = json!([{
      "type": "Multiple Choice",
      "question": "Which is a property of living things?",
      "options": ["Growth", "Rusting", "Melting", "Erosion"],
      "correct_answer": "Growth"
    }]);
    let model = Arc::new(ScriptedModel::replying(&["Living things grow.".to_string(), mcq.to_string()]));
    let state = state_with(&content, model.clone());

    let paper = generate_paper(&state, &request()).await.unwrap();
    assert_eq!(paper.questions.len(), 1);
    assert_eq!(paper.metadata.request_id, "req-9");
    assert_eq!(paper.metadata.total_pages, 1);
    let calls = model.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1][1].content.contains("Living things grow."));
  }

  #[tokio::test]
  async fn missing_chapter_is_rejected_before_any_model_call() {
    let content = tempdir().unwrap();
    let model = Arc::new(ScriptedModel::new(vec![]));
    let state = state_with(&content, model.clone());

    let err = generate_paper(&state, &request()).await.unwrap_err();
    assert!(matches!(err, ServiceError::RequestShape { .. }));
    assert!(model.calls().is_empty());
  }

  #[tokio::test]
  async fn chapter_outside_the_content_root_is_never_read() {
    let root = tempdir().unwrap();
    write_file(root.path(), "private/page.png", b"png");
    let content = root.path().join("content");
    let model = Arc::new(ScriptedModel::replying(&["leaked"]));
    let settings = Settings { content_dir: content.clone(), ..Settings::default() };
    let state = AppState::new(settings, Prompts::default(), model.clone());

    let outside = root.path().join("private");
    for chapter in ["../../../../../../private".to_string(), outside.display().to_string()] {
      let mut req = request();
      req.chapter = chapter;
      let err = generate_paper(&state, &req).await.unwrap_err();
      assert!(matches!(err, ServiceError::RequestShape { .. }));
      assert_eq!(err.violations()[0].field, "chapter");
    }
    assert!(model.calls().is_empty());
  }

  #[tokio::test]
  async fn chapter_without_images_is_rejected() {
    let content = tempdir().unwrap();
    write_file(content.path(), "English/Teacher/NCERT/11th/Biology/The Living World/notes.txt", b"text");
    let model = Arc::new(ScriptedModel::new(vec![]));
    let state = state_with(&content, model.clone());

    let err = generate_paper(&state, &request()).await.unwrap_err();
    assert!(err.details()[0].contains("at least one page image"));
  }

  #[tokio::test]
  async fn mismatched_pair_count_is_a_request_error() {
    let content = tempdir().unwrap();
    let model = Arc::new(ScriptedModel::new(vec![]));
    let state = state_with(&content, model.clone());
    let req = EvaluationRequest {
      number_of_pairs: 2,
      answer_pairs: vec![AnswerPair { expected_answer: "a".into(), student_answer: "b".into() }],
    };
    let err = evaluate_answers(&state, &req).await.unwrap_err();
    assert!(matches!(err, ServiceError::RequestShape { .. }));
    assert!(model.calls().is_empty());
  }
}
