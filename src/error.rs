//! Service error taxonomy and its HTTP mapping.

use std::fmt;

use axum::{
  http::StatusCode,
  response::{IntoResponse, Json},
};
use serde::Serialize;
use serde_json::json;

use crate::ollama::ModelError;

pub type Result<T> = std::result::Result<T, ServiceError>;

/// One violated constraint. `index` is the 1-based item position when the
/// violation concerns a single generated question or answer pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Violation {
  pub index: Option<usize>,
  pub field: String,
  pub expected: String,
  pub actual: String,
}

impl Violation {
  pub fn request(field: impl Into<String>, expected: impl Into<String>, actual: impl Into<String>) -> Self {
    Self { index: None, field: field.into(), expected: expected.into(), actual: actual.into() }
  }

  pub fn item(
    index: usize,
    field: impl Into<String>,
    expected: impl Into<String>,
    actual: impl Into<String>,
  ) -> Self {
    Self { index: Some(index), field: field.into(), expected: expected.into(), actual: actual.into() }
  }
}

impl fmt::Display for Violation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if let Some(i) = self.index {
      write!(f, "Question {}: ", i)?;
    }
    write!(f, "{}: expected {}, got {}", self.field, self.expected, self.actual)
  }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
  #[error("Request validation failed")]
  RequestShape { violations: Vec<Violation> },

  #[error("Difficulty allocation for {requested} questions summed to {allocated}")]
  AllocationInvariant { requested: u32, allocated: u32 },

  #[error("Generated {actual} questions for {scope}, expected {expected}")]
  GenerationCountMismatch {
    scope: String,
    expected: u32,
    actual: u32,
    breakdown: Vec<Violation>,
  },

  #[error("Question validation failed with {} violation(s)", violations.len())]
  Validation { violations: Vec<Violation> },

  #[error("Model service unavailable: {0}")]
  ModelUnavailable(#[from] ModelError),

  #[error("Image processing failed: {0}")]
  ImageProcessing(String),
}

impl ServiceError {
  pub fn kind(&self) -> &'static str {
    match self {
      ServiceError::RequestShape { .. } => "Validation Error",
      ServiceError::AllocationInvariant { .. } => "Allocation Error",
      ServiceError::GenerationCountMismatch { .. } => "Question Generation Error",
      ServiceError::Validation { .. } => "Question Validation Error",
      ServiceError::ModelUnavailable(_) => "LLM Service Error",
      ServiceError::ImageProcessing(_) => "Image Processing Error",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ServiceError::RequestShape { .. } => StatusCode::BAD_REQUEST,
      ServiceError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// Structured records behind the error, if any.
  pub fn violations(&self) -> &[Violation] {
    match self {
      ServiceError::RequestShape { violations } | ServiceError::Validation { violations } => violations,
      ServiceError::GenerationCountMismatch { breakdown, .. } => breakdown,
      _ => &[],
    }
  }

  pub fn details(&self) -> Vec<String> {
    self.violations().iter().map(ToString::to_string).collect()
  }
}

impl IntoResponse for ServiceError {
  fn into_response(self) -> axum::response::Response {
    let body = Json(json!({
      "error": self.kind(),
      "message": self.to_string(),
      "details": self.details(),
    }));
    (self.status(), body).into_response()
  }
}
