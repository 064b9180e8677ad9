//! MCQ question-bank backend
//!
//! - Axum HTTP API generating 9-question multiple-choice banks from an article
//! - Pipeline: three difficulty tiers, then answer/distractor/explanation waves, then shuffle
//! - Optional OpenAI integration (via environment variables)
//!
//! Important env variables:
//!   PORT                    : u16 (default 8000)
//!   OPENAI_API_KEY          : enables generation if present
//!   OPENAI_BASE_URL         : default "https://api.openai.com/v1"
//!   OPENAI_MODEL            : default "o3-mini"
//!   OPENAI_REASONING_EFFORT : default "high"; empty disables the field
//!   OPENAI_TIMEOUT_SECS     : per-call timeout, default 300
//!   AGENT_CONFIG_PATH       : path to TOML config (criteria, prompts, pipeline settings)
//!   LOG_LEVEL               : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT              : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod error;
mod schema;
mod generation;
mod openai;
mod stages;
mod scheduler;
mod assembler;
mod pipeline;
mod state;
mod protocol;
mod routes;
#[cfg(test)]
mod testing;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::routes::build_router;
use crate::state::AppState;

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "mcq_bank_backend", error = %e, "Failed to listen for Ctrl-C");
    std::future::pending::<()>().await;
  }
  info!(target: "mcq_bank_backend", "Shutdown signal received");
}

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (generator config, OpenAI client).
  let state = Arc::new(AppState::new());

  let app = build_router(state.clone());

  // Read port from env or default to 8000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "mcq_bank_backend", %addr, generation_enabled = state.generation_enabled(), "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}
