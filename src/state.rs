//! Application state shared by handlers: settings, prompts, and the model client
//! with the two services built on it.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::{Prompts, Settings};
use crate::evaluation::Evaluator;
use crate::generator::QuestionGenerator;
use crate::ollama::ChatModel;
use crate::validator::RequestLimits;

#[derive(Clone)]
pub struct AppState {
  pub settings: Settings,
  pub prompts: Prompts,
  pub model: Arc<dyn ChatModel>,
  pub generator: QuestionGenerator,
  pub evaluator: Evaluator,
}

impl AppState {
  #[instrument(level = "info", skip_all)]
  pub fn new(settings: Settings, prompts: Prompts, model: Arc<dyn ChatModel>) -> Self {
    info!(
      target: "qpgen_backend",
      model = %model.model_name(),
      content_dir = %settings.content_dir.display(),
      "Application state ready"
    );
    Self {
      generator: QuestionGenerator::new(model.clone(), prompts.clone()),
      evaluator: Evaluator::new(model.clone(), prompts.clone()),
      settings,
      prompts,
      model,
    }
  }

  pub fn limits(&self) -> RequestLimits {
    RequestLimits {
      max_questions: self.settings.max_questions,
      max_long_descriptive: self.settings.max_long_descriptive,
    }
  }
}
