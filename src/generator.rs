//! Question generation: one model call per non-zero quota cell, strict per-cell
//! counts, running difficulty totals, then batch validation.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::allocator::QuotaTable;
use crate::config::Prompts;
use crate::domain::{
  ChapterContext, DifficultyCounts, DifficultyLevel, PaperMetadata, QuestionPaper, QuestionRequest, QuestionType,
  OPTION_COUNT, SELECT_ANSWER_COUNT,
};
use crate::error::{Result, ServiceError, Violation};
use crate::ollama::{ChatMessage, ChatModel, ChatOptions};
use crate::util::{extract_json_payload, fill_template, trunc_for_log};
use crate::validator::validate_questions;

#[derive(Clone, Copy, Debug)]
pub struct GenerationConfig {
  pub temperature: f32,
}

impl Default for GenerationConfig {
  fn default() -> Self {
    Self { temperature: 0.7 }
  }
}

#[derive(Clone)]
pub struct QuestionGenerator {
  model: Arc<dyn ChatModel>,
  prompts: Prompts,
  config: GenerationConfig,
}

impl QuestionGenerator {
  pub fn new(model: Arc<dyn ChatModel>, prompts: Prompts) -> Self {
    Self { model, prompts, config: GenerationConfig::default() }
  }

  /// Build the full paper for `request` from extracted chapter context.
  ///
  /// Any cell returning a different number of questions than its quota fails the
  /// whole request; nothing partial is returned.
  #[instrument(
    level = "info",
    target = "generation",
    skip_all,
    fields(request_id = %request.request_id, total = request.question_distribution.total(), context_len = context.text.len())
  )]
  pub async fn generate_questions(&self, request: &QuestionRequest, context: &ChapterContext) -> Result<QuestionPaper> {
    let start = Instant::now();
    let table = QuotaTable::build(&request.question_distribution, &request.difficulty_distribution)?;

    let mut items: Vec<Value> = Vec::with_capacity(table.total() as usize);
    let mut running = DifficultyCounts::default();
    for (qt, level, count) in table.cells() {
      let cell = self.generate_cell(request, context, qt, level, count).await?;
      running.add(level, cell.len() as u32);
      items.extend(cell);
    }

    check_running_totals(&table, &running, request.question_distribution.total())?;

    let questions = validate_questions(&items, &request.question_distribution)?;
    let mut realized = DifficultyCounts::default();
    for q in &questions {
      realized.add(q.difficulty(), 1);
    }

    info!(
      target: "generation",
      questions = questions.len(),
      elapsed = ?start.elapsed(),
      "Question paper generated"
    );

    Ok(QuestionPaper {
      title: request.title(),
      metadata: PaperMetadata {
        request_id: request.request_id.clone(),
        standard: request.standard.clone(),
        subject: request.subject.clone(),
        chapter: request.chapter.clone(),
        language: request.language.clone(),
        syllabus: request.syllabus.clone(),
        topic: request.topic.clone(),
        total_pages: context.pages,
        question_count: questions.len(),
        distribution: request.question_distribution,
        difficulty_distribution: request.difficulty_distribution,
        realized_difficulty_distribution: realized,
        quota: table.to_out(),
      },
      questions,
      timestamp: Utc::now(),
    })
  }

  /// One model call for one (type, difficulty) cell. Returns exactly `count` items
  /// of the requested type, each stamped with the cell's difficulty.
  #[instrument(level = "info", target = "generation", skip(self, request, context), fields(question_type = %qt, difficulty = %level))]
  async fn generate_cell(
    &self,
    request: &QuestionRequest,
    context: &ChapterContext,
    qt: QuestionType,
    level: DifficultyLevel,
    count: u32,
  ) -> Result<Vec<Value>> {
    let messages = self.cell_messages(request, context, qt, level, count);
    let options = ChatOptions { temperature: self.config.temperature, top_p: None };
    let text = self.model.chat(&messages, options).await?;

    let parsed = match parse_question_items(&text) {
      Some(items) => items,
      None => {
        warn!(target: "generation", response = %trunc_for_log(&text, 200), "Model output is not JSON; counting zero questions");
        Vec::new()
      }
    };
    let parsed_len = parsed.len();

    let mut items: Vec<Value> = parsed
      .into_iter()
      .filter(|item| item.get("type").and_then(Value::as_str) == Some(qt.label()))
      .collect();
    if items.len() != parsed_len {
      debug!(target: "generation", parsed = parsed_len, kept = items.len(), "Dropped items of other types");
    }

    let actual = items.len() as u32;
    if actual != count {
      let scope = format!("{}/{}", qt, level);
      warn!(target: "generation", %scope, expected = count, actual, "Cell count mismatch");
      return Err(ServiceError::GenerationCountMismatch {
        breakdown: vec![Violation::request(format!("{} count", scope), count.to_string(), actual.to_string())],
        scope,
        expected: count,
        actual,
      });
    }

    let relabeled = stamp_difficulty(&mut items, level);
    if relabeled > 0 {
      warn!(target: "generation", relabeled, expected = %level, "Model labelled items with another difficulty");
    }
    Ok(items)
  }

  fn cell_messages(
    &self,
    request: &QuestionRequest,
    context: &ChapterContext,
    qt: QuestionType,
    level: DifficultyLevel,
    count: u32,
  ) -> Vec<ChatMessage> {
    let count_s = count.to_string();
    let scope = match request.topic.as_deref().map(str::trim) {
      Some(topic) if !topic.is_empty() => format!("Topic: {}", topic),
      _ => "Cover the key concepts of the whole chapter.".to_string(),
    };
    let shape = shape_requirements(qt, level);

    let system = fill_template(
      &self.prompts.question_system_template,
      &[("question_type", qt.label()), ("difficulty", level.label()), ("count", &count_s)],
    );
    // context last so braces inside chapter text are never treated as placeholders
    let user = fill_template(
      &self.prompts.question_user_template,
      &[
        ("count", &count_s),
        ("question_type", qt.label()),
        ("syllabus", &request.syllabus),
        ("standard", &request.standard),
        ("subject", &request.subject),
        ("difficulty", level.label()),
        ("chapter", &request.chapter),
        ("scope", &scope),
        ("language", &request.language),
        ("shape", &shape),
        ("context", &context.text),
      ],
    );
    vec![ChatMessage::system(system), ChatMessage::user(user)]
  }
}

/// Set every item's `difficulty` to the cell's level. Returns how many items carried
/// a different (or unreadable) label.
fn stamp_difficulty(items: &mut [Value], level: DifficultyLevel) -> usize {
  let mut relabeled = 0;
  for item in items.iter_mut() {
    let Some(obj) = item.as_object_mut() else { continue };
    let labelled = obj.get("difficulty").and_then(Value::as_str).and_then(DifficultyLevel::from_label);
    if labelled != Some(level) {
      relabeled += 1;
    }
    obj.insert("difficulty".into(), Value::String(level.label().into()));
  }
  relabeled
}

/// Compare per-difficulty totals gathered across cells with the quota table, and the
/// grand total with the requested total.
fn check_running_totals(table: &QuotaTable, running: &DifficultyCounts, requested_total: u32) -> Result<()> {
  let expected = table.column_totals();
  let mut breakdown = Vec::new();
  for level in DifficultyLevel::ALL {
    if running.get(level) != expected.get(level) {
      breakdown.push(Violation::request(
        format!("{} total", level),
        expected.get(level).to_string(),
        running.get(level).to_string(),
      ));
    }
  }
  if running.total() != requested_total {
    breakdown.push(Violation::request("total", requested_total.to_string(), running.total().to_string()));
  }

  if breakdown.is_empty() {
    return Ok(());
  }
  Err(ServiceError::GenerationCountMismatch {
    scope: "the request".into(),
    expected: requested_total,
    actual: running.total(),
    breakdown,
  })
}

/// Output format block for one question type.
pub fn shape_requirements(qt: QuestionType, level: DifficultyLevel) -> String {
  let mut out = format!(
    "Each question must be a JSON object with these fields:\n- \"type\": \"{}\"\n- \"difficulty\": \"{}\"\n- \"question\": the question text\n",
    qt.label(),
    level.label()
  );
  match qt {
    QuestionType::MultipleChoice => out.push_str(&format!(
      "- \"options\": exactly {} distinct options\n- \"correct_answer\": the single correct option, copied exactly from \"options\"",
      OPTION_COUNT
    )),
    QuestionType::MultipleSelect => out.push_str(&format!(
      "- \"options\": exactly {} distinct options\n- \"correct_answers\": exactly {} correct options, each copied exactly from \"options\"",
      OPTION_COUNT, SELECT_ANSWER_COUNT
    )),
    QuestionType::ShortDescriptive | QuestionType::LongDescriptive => {
      let (lo, hi) = qt.keyword_range().map(|r| (*r.start(), *r.end())).unwrap_or((0, 0));
      let length = if qt == QuestionType::ShortDescriptive { "a brief model answer" } else { "a detailed model answer" };
      out.push_str(&format!(
        "- \"answer\": {}\n- \"keywords\": between {} and {} key terms a correct answer should mention",
        length, lo, hi
      ));
    }
  }
  out
}

/// Parse model text into question items. Accepts a JSON array or an object wrapping
/// the array under `"questions"`; any other object yields no items. `None` when the
/// text is not JSON at all.
pub fn parse_question_items(text: &str) -> Option<Vec<Value>> {
  match serde_json::from_str::<Value>(extract_json_payload(text)).ok()? {
    Value::Array(items) => Some(items),
    Value::Object(mut obj) => match obj.remove("questions") {
      Some(Value::Array(items)) => Some(items),
      _ => Some(Vec::new()),
    },
    _ => Some(Vec::new()),
  }
}
