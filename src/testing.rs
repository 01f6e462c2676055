//! Test doubles shared by unit tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::ollama::{ChatMessage, ChatModel, ChatOptions, ModelError};

/// Replies with queued results in order and records every call.
/// An exhausted script answers with `EmptyResponse`.
pub struct ScriptedModel {
  replies: Mutex<VecDeque<Result<String, ModelError>>>,
  calls: Mutex<Vec<Vec<ChatMessage>>>,
  options: Mutex<Vec<ChatOptions>>,
}

impl ScriptedModel {
  pub fn new(replies: Vec<Result<String, ModelError>>) -> Self {
    Self {
      replies: Mutex::new(replies.into()),
      calls: Mutex::new(Vec::new()),
      options: Mutex::new(Vec::new()),
    }
  }

  pub fn replying<S: AsRef<str>>(texts: &[S]) -> Self {
    Self::new(texts.iter().map(|t| Ok(t.as_ref().to_string())).collect())
  }

  pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
    self.calls.lock().unwrap().clone()
  }

  pub fn options(&self) -> Vec<ChatOptions> {
    self.options.lock().unwrap().clone()
  }
}

#[async_trait]
impl ChatModel for ScriptedModel {
  async fn chat(&self, messages: &[ChatMessage], options: ChatOptions) -> Result<String, ModelError> {
    self.calls.lock().unwrap().push(messages.to_vec());
    self.options.lock().unwrap().push(options);
    self.replies.lock().unwrap().pop_front().unwrap_or(Err(ModelError::EmptyResponse))
  }

  fn model_name(&self) -> &str {
    "scripted"
  }
}

/// Write `contents` at `rel` under `root`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: &[u8]) -> PathBuf {
  let path = root.join(rel);
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(&path, contents).unwrap();
  path
}
