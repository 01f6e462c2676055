//! Request-shape checks and the output validator for generated question batches.
//!
//! Both collect every violation before failing, so callers get the full defect list.

use std::path::{Component, Path};

use serde_json::{Map, Value};
use tracing::{instrument, warn};

use crate::domain::{
  AnswerPair, DifficultyLevel, GeneratedQuestion, QuestionRequest, QuestionType, QuestionTypeCounts, OPTION_COUNT,
  SELECT_ANSWER_COUNT,
};
use crate::error::{Result, ServiceError, Violation};

/// Bounds a generation request must respect.
#[derive(Clone, Copy, Debug)]
pub struct RequestLimits {
  pub max_questions: u32,
  pub max_long_descriptive: u32,
}

/// Check counts and metadata of a generation request. No I/O.
///
/// Totals are summed in `u64` so oversized counts are rejected, never wrapped.
pub fn validate_request(request: &QuestionRequest, limits: RequestLimits) -> Result<()> {
  let mut violations = Vec::new();
  let total = request.question_distribution.wide_total();
  let difficulty_total = request.difficulty_distribution.wide_total();

  if total == 0 {
    violations.push(Violation::request("question_distribution", "at least one question", "0"));
  }
  if difficulty_total != total {
    violations.push(Violation::request(
      "difficulty_distribution",
      format!("total of {}", total),
      difficulty_total.to_string(),
    ));
  }
  let long = request.question_distribution.long_descriptive;
  if long > limits.max_long_descriptive {
    violations.push(Violation::request(
      "long_descriptive",
      format!("at most {}", limits.max_long_descriptive),
      long.to_string(),
    ));
  }
  if total > u64::from(limits.max_questions) {
    violations.push(Violation::request("question_distribution", format!("at most {}", limits.max_questions), total.to_string()));
  }
  for (field, value) in [
    ("standard", &request.standard),
    ("subject", &request.subject),
    ("chapter", &request.chapter),
    ("language", &request.language),
    ("syllabus", &request.syllabus),
  ] {
    if value.trim().is_empty() {
      violations.push(Violation::request(field, "non-empty text", "empty"));
    } else if !is_single_segment(value) {
      violations.push(Violation::request(field, "a single directory name", quoted(value)));
    }
  }

  if violations.is_empty() {
    Ok(())
  } else {
    Err(ServiceError::RequestShape { violations })
  }
}

/// Exactly one normal path component: no separators, no `..`, no root or prefix.
fn is_single_segment(value: &str) -> bool {
  let mut parts = Path::new(value).components();
  matches!((parts.next(), parts.next()), (Some(Component::Normal(_)), None))
}

/// Check an evaluation request: declared pair count must match and answers must not be blank.
pub fn validate_evaluation_request(number_of_pairs: usize, pairs: &[AnswerPair]) -> Result<()> {
  let mut violations = Vec::new();
  if number_of_pairs == 0 {
    violations.push(Violation::request("number_of_pairs", "greater than 0", "0"));
  }
  if number_of_pairs != pairs.len() {
    violations.push(Violation::request("answer_pairs", format!("{} pairs", number_of_pairs), pairs.len().to_string()));
  }
  for (i, pair) in pairs.iter().enumerate() {
    if pair.expected_answer.trim().is_empty() {
      violations.push(Violation::request(format!("answer_pairs[{}].expected_answer", i + 1), "non-empty text", "empty"));
    }
    if pair.student_answer.trim().is_empty() {
      violations.push(Violation::request(format!("answer_pairs[{}].student_answer", i + 1), "non-empty text", "empty"));
    }
  }
  if violations.is_empty() {
    Ok(())
  } else {
    Err(ServiceError::RequestShape { violations })
  }
}

/// Validate a raw generated batch against shape rules and the requested type counts.
///
/// Every item is checked; typed questions are returned only when the whole batch is clean.
#[instrument(level = "info", target = "generation", skip_all, fields(items = items.len(), expected = expected.total()))]
pub fn validate_questions(items: &[Value], expected: &QuestionTypeCounts) -> Result<Vec<GeneratedQuestion>> {
  let mut violations = Vec::new();
  let mut counts = QuestionTypeCounts::default();
  let mut questions = Vec::with_capacity(items.len());

  for (i, item) in items.iter().enumerate() {
    let idx = i + 1;
    let Some(obj) = item.as_object() else {
      violations.push(Violation::item(idx, "format", "JSON object", json_kind(item)));
      continue;
    };
    let type_label = obj.get("type").and_then(Value::as_str).unwrap_or("");
    let Some(qt) = QuestionType::from_label(type_label) else {
      violations.push(Violation::item(idx, "type", "a known question type", quoted(type_label)));
      continue;
    };
    *counts.get_mut(qt) += 1;

    let before = violations.len();
    if let Some(q) = check_item(idx, qt, obj, &mut violations) {
      if violations.len() == before {
        questions.push(q);
      }
    }
  }

  for qt in QuestionType::ALL {
    if counts.get(qt) != expected.get(qt) {
      violations.push(Violation::request(
        format!("{} count", qt),
        expected.get(qt).to_string(),
        counts.get(qt).to_string(),
      ));
    }
  }

  if violations.is_empty() {
    Ok(questions)
  } else {
    warn!(target: "generation", violations = violations.len(), "Generated batch failed validation");
    Err(ServiceError::Validation { violations })
  }
}

fn check_item(idx: usize, qt: QuestionType, obj: &Map<String, Value>, out: &mut Vec<Violation>) -> Option<GeneratedQuestion> {
  let question = non_empty_str(obj, "question");
  if question.is_none() {
    out.push(Violation::item(idx, "question", "non-empty text", "missing"));
  }
  let difficulty = obj.get("difficulty").and_then(Value::as_str).and_then(DifficultyLevel::from_label);
  if difficulty.is_none() {
    out.push(Violation::item(idx, "difficulty", "Easy, Medium or Hard", describe(obj.get("difficulty"))));
  }

  match qt {
    QuestionType::MultipleChoice | QuestionType::MultipleSelect => {
      let options = string_list(obj, "options");
      match &options {
        Some(o) if o.len() == OPTION_COUNT => {}
        Some(o) => out.push(Violation::item(idx, "options", format!("exactly {} options", OPTION_COUNT), o.len().to_string())),
        None => out.push(Violation::item(idx, "options", format!("exactly {} options", OPTION_COUNT), "missing")),
      }
      let opts = options.unwrap_or_default();

      if qt == QuestionType::MultipleChoice {
        let answer = obj.get("correct_answer").and_then(Value::as_str).map(str::to_string);
        match &answer {
          None => out.push(Violation::item(idx, "correct_answer", "one answer", "missing")),
          Some(a) if !opts.contains(a) => out.push(Violation::item(idx, "correct_answer", "one of the options", quoted(a))),
          Some(_) => {}
        }
        Some(GeneratedQuestion::Choice {
          difficulty: difficulty?,
          question: question?,
          options: opts,
          correct_answer: answer?,
        })
      } else {
        let answers = string_list(obj, "correct_answers");
        match &answers {
          None => out.push(Violation::item(idx, "correct_answers", format!("exactly {} answers", SELECT_ANSWER_COUNT), "missing")),
          Some(a) if a.len() != SELECT_ANSWER_COUNT => {
            out.push(Violation::item(idx, "correct_answers", format!("exactly {} answers", SELECT_ANSWER_COUNT), a.len().to_string()))
          }
          Some(a) => {
            for ans in a.iter().filter(|ans| !opts.contains(ans)) {
              out.push(Violation::item(idx, "correct_answers", "members of the options", quoted(ans)));
            }
          }
        }
        Some(GeneratedQuestion::Select {
          difficulty: difficulty?,
          question: question?,
          options: opts,
          correct_answers: answers?,
        })
      }
    }
    QuestionType::ShortDescriptive | QuestionType::LongDescriptive => {
      let answer = non_empty_str(obj, "answer");
      if answer.is_none() {
        out.push(Violation::item(idx, "answer", "non-empty text", "missing"));
      }
      let range = qt.keyword_range().unwrap_or(0..=usize::MAX);
      let keywords = string_list(obj, "keywords");
      match &keywords {
        None => out.push(Violation::item(idx, "keywords", format!("{}-{} keywords", range.start(), range.end()), "missing")),
        Some(k) if !range.contains(&k.len()) => {
          out.push(Violation::item(idx, "keywords", format!("{}-{} keywords", range.start(), range.end()), k.len().to_string()))
        }
        Some(_) => {}
      }
      let (difficulty, question, answer, keywords) = (difficulty?, question?, answer?, keywords?);
      Some(if qt == QuestionType::ShortDescriptive {
        GeneratedQuestion::ShortDescriptive { difficulty, question, answer, keywords }
      } else {
        GeneratedQuestion::LongDescriptive { difficulty, question, answer, keywords }
      })
    }
  }
}

fn non_empty_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
  obj
    .get(key)
    .and_then(Value::as_str)
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_string)
}

/// `Some` only for an array whose elements are all strings.
fn string_list(obj: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
  obj
    .get(key)?
    .as_array()?
    .iter()
    .map(|v| v.as_str().map(str::to_string))
    .collect()
}

fn json_kind(v: &Value) -> &'static str {
  match v {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

fn describe(v: Option<&Value>) -> String {
  match v {
    None => "missing".into(),
    Some(Value::String(s)) => quoted(s),
    Some(other) => json_kind(other).into(),
  }
}

fn quoted(s: &str) -> String {
  format!("\"{}\"", s)
}
