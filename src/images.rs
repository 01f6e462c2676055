//! Chapter page images: directory layout, discovery, base64 encoding, and
//! turning pages into textual context with the vision model.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::domain::{ChapterContext, QuestionRequest};
use crate::error::{Result, ServiceError};
use crate::ollama::{ChatMessage, ChatModel, ChatOptions};

pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// `<content_dir>/<language>/<role>/<syllabus>/<standard>/<subject>/<chapter>`
///
/// Segments come from the request and must already have passed `validate_request`.
pub fn chapter_dir(content_dir: &Path, role: &str, request: &QuestionRequest) -> PathBuf {
  content_dir
    .join(&request.language)
    .join(role)
    .join(&request.syllabus)
    .join(&request.standard)
    .join(&request.subject)
    .join(&request.chapter)
}

/// All files under `base` (recursively) whose extension matches, sorted by path.
/// A missing or unreadable base yields an empty list.
#[instrument(level = "debug", skip_all, fields(base = %base.display()))]
pub async fn get_images(base: &Path, extensions: &[&str]) -> Vec<PathBuf> {
  let mut found = Vec::new();
  let mut pending = vec![base.to_path_buf()];

  while let Some(dir) = pending.pop() {
    let mut entries = match fs::read_dir(&dir).await {
      Ok(e) => e,
      Err(e) => {
        warn!(target: "generation", dir = %dir.display(), error = %e, "Cannot read image directory");
        continue;
      }
    };
    loop {
      let entry = match entries.next_entry().await {
        Ok(Some(entry)) => entry,
        Ok(None) => break,
        Err(e) => {
          warn!(target: "generation", dir = %dir.display(), error = %e, "Failed to list image directory");
          break;
        }
      };
      let path = entry.path();
      match entry.file_type().await {
        Ok(t) if t.is_dir() => pending.push(path),
        Ok(_) if has_extension(&path, extensions) => found.push(path),
        _ => {}
      }
    }
  }

  found.sort();
  info!(target: "generation", base = %base.display(), count = found.len(), "Found chapter images");
  found
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
  path
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| extensions.iter().any(|want| e.eq_ignore_ascii_case(want.trim_start_matches('.'))))
    .unwrap_or(false)
}

/// Base64 file contents, or `None` when the file cannot be read.
pub async fn encode_image(path: &Path) -> Option<String> {
  match fs::read(path).await {
    Ok(data) => Some(BASE64.encode(&data)),
    Err(e) => {
      warn!(target: "generation", path = %path.display(), error = %e, "Failed to read image");
      None
    }
  }
}

/// Describe each page with the vision model and join the descriptions in page order.
/// Unreadable pages and failed model calls are skipped; no text at all is an error.
#[instrument(level = "info", target = "generation", skip(model, prompt, paths), fields(pages = paths.len()))]
pub async fn chapter_context(model: &dyn ChatModel, prompt: &str, paths: &[PathBuf]) -> Result<ChapterContext> {
  let mut parts: Vec<String> = Vec::new();
  for path in paths {
    let Some(image) = encode_image(path).await else { continue };
    let messages = [ChatMessage::user_with_image(prompt, image)];
    match model.chat(&messages, ChatOptions::default()).await {
      Ok(text) if !text.trim().is_empty() => {
        debug!(target: "generation", path = %path.display(), text_len = text.len(), "Extracted page context");
        parts.push(text.trim().to_string());
      }
      Ok(_) => warn!(target: "generation", path = %path.display(), "Model returned no context for page"),
      Err(e) => warn!(target: "generation", path = %path.display(), error = %e, "Page context extraction failed"),
    }
  }

  if parts.is_empty() {
    return Err(ServiceError::ImageProcessing("Failed to extract context from images".into()));
  }
  Ok(ChapterContext { text: parts.join("\n\n"), pages: paths.len() })
}
