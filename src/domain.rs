//! Domain models: question types, difficulty levels, requested counts, generated
//! questions, and the answer-evaluation records.

use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Options every choice/select question must carry.
pub const OPTION_COUNT: usize = 4;
/// Correct answers a multiple-select question must carry.
pub const SELECT_ANSWER_COUNT: usize = 2;

/// Question shapes, in generation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QuestionType {
  #[serde(rename = "Multiple Choice")]
  MultipleChoice,
  #[serde(rename = "Multiple Select")]
  MultipleSelect,
  #[serde(rename = "Short Descriptive Answer")]
  ShortDescriptive,
  #[serde(rename = "Long Descriptive Answer")]
  LongDescriptive,
}

impl QuestionType {
  pub const ALL: [QuestionType; 4] = [
    QuestionType::MultipleChoice,
    QuestionType::MultipleSelect,
    QuestionType::ShortDescriptive,
    QuestionType::LongDescriptive,
  ];

  /// Wire label, also the `type` field the model is asked to emit.
  pub fn label(self) -> &'static str {
    match self {
      QuestionType::MultipleChoice => "Multiple Choice",
      QuestionType::MultipleSelect => "Multiple Select",
      QuestionType::ShortDescriptive => "Short Descriptive Answer",
      QuestionType::LongDescriptive => "Long Descriptive Answer",
    }
  }

  pub fn from_label(label: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|t| t.label() == label)
  }

  /// Allowed keyword counts for descriptive types.
  pub fn keyword_range(self) -> Option<RangeInclusive<usize>> {
    match self {
      QuestionType::ShortDescriptive => Some(3..=5),
      QuestionType::LongDescriptive => Some(5..=7),
      _ => None,
    }
  }
}

impl std::fmt::Display for QuestionType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.label())
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DifficultyLevel {
  Easy,
  Medium,
  Hard,
}

impl DifficultyLevel {
  pub const ALL: [DifficultyLevel; 3] = [DifficultyLevel::Easy, DifficultyLevel::Medium, DifficultyLevel::Hard];

  pub fn label(self) -> &'static str {
    match self {
      DifficultyLevel::Easy => "Easy",
      DifficultyLevel::Medium => "Medium",
      DifficultyLevel::Hard => "Hard",
    }
  }

  pub fn from_label(label: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|d| d.label().eq_ignore_ascii_case(label.trim()))
  }

  fn index(self) -> usize {
    match self {
      DifficultyLevel::Easy => 0,
      DifficultyLevel::Medium => 1,
      DifficultyLevel::Hard => 2,
    }
  }
}

impl std::fmt::Display for DifficultyLevel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.label())
  }
}

/// Requested number of questions per type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionTypeCounts {
  pub multiple_choice: u32,
  pub multiple_select: u32,
  pub short_descriptive: u32,
  pub long_descriptive: u32,
}

impl QuestionTypeCounts {
  pub fn get(&self, question_type: QuestionType) -> u32 {
    match question_type {
      QuestionType::MultipleChoice => self.multiple_choice,
      QuestionType::MultipleSelect => self.multiple_select,
      QuestionType::ShortDescriptive => self.short_descriptive,
      QuestionType::LongDescriptive => self.long_descriptive,
    }
  }

  pub fn get_mut(&mut self, question_type: QuestionType) -> &mut u32 {
    match question_type {
      QuestionType::MultipleChoice => &mut self.multiple_choice,
      QuestionType::MultipleSelect => &mut self.multiple_select,
      QuestionType::ShortDescriptive => &mut self.short_descriptive,
      QuestionType::LongDescriptive => &mut self.long_descriptive,
    }
  }

  /// Sum without overflow; client-supplied counts may be arbitrarily large.
  pub fn wide_total(&self) -> u64 {
    QuestionType::ALL.into_iter().map(|t| u64::from(self.get(t))).sum()
  }

  /// Saturates at `u32::MAX`.
  pub fn total(&self) -> u32 {
    u32::try_from(self.wide_total()).unwrap_or(u32::MAX)
  }
}

/// Number of questions per difficulty. Used both for the request and for
/// per-type allocations and running totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyCounts {
  pub easy: u32,
  pub medium: u32,
  pub hard: u32,
}

impl DifficultyCounts {
  pub fn from_array(values: [u32; 3]) -> Self {
    Self { easy: values[0], medium: values[1], hard: values[2] }
  }

  pub fn to_array(self) -> [u32; 3] {
    [self.easy, self.medium, self.hard]
  }

  pub fn get(&self, level: DifficultyLevel) -> u32 {
    self.to_array()[level.index()]
  }

  pub fn add(&mut self, level: DifficultyLevel, n: u32) {
    match level {
      DifficultyLevel::Easy => self.easy += n,
      DifficultyLevel::Medium => self.medium += n,
      DifficultyLevel::Hard => self.hard += n,
    }
  }

  pub fn wide_total(&self) -> u64 {
    self.to_array().into_iter().map(u64::from).sum()
  }

  /// Saturates at `u32::MAX`.
  pub fn total(&self) -> u32 {
    u32::try_from(self.wide_total()).unwrap_or(u32::MAX)
  }
}

/// A validated question. Each variant carries only the fields valid for its shape.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum GeneratedQuestion {
  #[serde(rename = "Multiple Choice")]
  Choice {
    difficulty: DifficultyLevel,
    question: String,
    options: Vec<String>,
    correct_answer: String,
  },
  #[serde(rename = "Multiple Select")]
  Select {
    difficulty: DifficultyLevel,
    question: String,
    options: Vec<String>,
    correct_answers: Vec<String>,
  },
  #[serde(rename = "Short Descriptive Answer")]
  ShortDescriptive {
    difficulty: DifficultyLevel,
    question: String,
    answer: String,
    keywords: Vec<String>,
  },
  #[serde(rename = "Long Descriptive Answer")]
  LongDescriptive {
    difficulty: DifficultyLevel,
    question: String,
    answer: String,
    keywords: Vec<String>,
  },
}

impl GeneratedQuestion {
  pub fn question_type(&self) -> QuestionType {
    match self {
      GeneratedQuestion::Choice { .. } => QuestionType::MultipleChoice,
      GeneratedQuestion::Select { .. } => QuestionType::MultipleSelect,
      GeneratedQuestion::ShortDescriptive { .. } => QuestionType::ShortDescriptive,
      GeneratedQuestion::LongDescriptive { .. } => QuestionType::LongDescriptive,
    }
  }

  pub fn difficulty(&self) -> DifficultyLevel {
    match self {
      GeneratedQuestion::Choice { difficulty, .. }
      | GeneratedQuestion::Select { difficulty, .. }
      | GeneratedQuestion::ShortDescriptive { difficulty, .. }
      | GeneratedQuestion::LongDescriptive { difficulty, .. } => *difficulty,
    }
  }
}

fn default_request_id() -> String {
  Uuid::new_v4().to_string()
}
fn default_language() -> String {
  "English".into()
}
fn default_syllabus() -> String {
  "NCERT".into()
}

/// Question-paper generation request.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct QuestionRequest {
  #[serde(default = "default_request_id")]
  pub request_id: String,
  pub standard: String,
  pub subject: String,
  pub chapter: String,
  #[serde(default = "default_language")]
  pub language: String,
  #[serde(default = "default_syllabus")]
  pub syllabus: String,
  pub question_distribution: QuestionTypeCounts,
  pub difficulty_distribution: DifficultyCounts,
  #[serde(default)]
  pub topic: Option<String>,
}

impl QuestionRequest {
  pub fn title(&self) -> String {
    format!("{} {} Assessment - {}", self.standard, self.subject, self.chapter)
  }
}

/// Text extracted from a chapter's page images.
#[derive(Clone, Debug, Default)]
pub struct ChapterContext {
  pub text: String,
  pub pages: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct QuotaCellOut {
  #[serde(rename = "type")]
  pub question_type: QuestionType,
  pub difficulty: DifficultyLevel,
  pub count: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct PaperMetadata {
  pub request_id: String,
  pub standard: String,
  pub subject: String,
  pub chapter: String,
  pub language: String,
  pub syllabus: String,
  pub topic: Option<String>,
  pub total_pages: usize,
  pub question_count: usize,
  pub distribution: QuestionTypeCounts,
  pub difficulty_distribution: DifficultyCounts,
  pub realized_difficulty_distribution: DifficultyCounts,
  pub quota: Vec<QuotaCellOut>,
}

#[derive(Clone, Debug, Serialize)]
pub struct QuestionPaper {
  pub title: String,
  pub questions: Vec<GeneratedQuestion>,
  pub metadata: PaperMetadata,
  pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AnswerPair {
  pub expected_answer: String,
  pub student_answer: String,
}

/// Score for one answer pair. Failures degrade to score 0 with an "Error: ..." justification.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EvaluationResult {
  pub score: f64,
  pub justification: String,
}

impl EvaluationResult {
  pub fn failed(justification: impl Into<String>) -> Self {
    Self { score: 0.0, justification: justification.into() }
  }
}
