//! Question paper generation backend
//!
//! - Axum HTTP API: question paper generation from chapter page images, answer evaluation
//! - Ollama chat model (vision) for context extraction, generation and scoring
//!
//! Important env variables:
//!   HOST / PORT          : listen address (default 0.0.0.0:8000)
//!   CONTENT_DIR          : chapter image root (default ./content)
//!   CONTENT_ROLE         : role directory (default Teacher)
//!   OLLAMA_BASE_URL      : default "http://localhost:11434"
//!   LLM_MODEL            : default "llama3.2-vision"
//!   MAX_RETRIES          : model retries (default 3)
//!   REQUEST_TIMEOUT      : model call timeout in seconds (default 300)
//!   MAX_QUESTIONS        : per-request question cap (default 25)
//!   MAX_LONG_DESCRIPTIVE : long descriptive cap (default 10)
//!   PROMPTS_CONFIG_PATH  : TOML prompt overrides
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"

mod allocator;
mod config;
mod domain;
mod error;
mod evaluation;
mod generator;
mod images;
mod logic;
mod ollama;
mod protocol;
mod routes;
mod state;
mod telemetry;
mod util;
mod validator;

#[cfg(test)]
mod testing;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::config::{load_prompts, Settings};
use crate::ollama::Ollama;
use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let settings = Settings::from_env()?;
  let prompts = load_prompts(settings.prompts_path.as_ref());
  let model = Ollama::from_settings(&settings)?;
  info!(target: "qpgen_backend", base_url = %model.base_url, model = %model.model, max_retries = model.max_retries, "Ollama client ready");

  let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
  let state = Arc::new(AppState::new(settings, prompts, Arc::new(model)));
  let app = build_router(state);

  let listener = TcpListener::bind(addr).await?;
  info!(target: "qpgen_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  Ok(())
}

async fn shutdown_signal() {
  if tokio::signal::ctrl_c().await.is_ok() {
    info!(target: "qpgen_backend", "Shutdown signal received");
  }
}
