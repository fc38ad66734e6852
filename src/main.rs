//! CareerTrials · career-assessment backend
//!
//! - Axum HTTP API around a Gemini-backed conversational agent
//! - Phase 1: diagnostic questions, one session agent per (session_id, user_id)
//! - Phase 2: the agent's reply is cleaned and validated into typed challenges
//! - Conversation history persisted in SQLite
//!
//! See `config.rs` for the environment variables; LOG_LEVEL and LOG_FORMAT
//! control logging (see `telemetry.rs`).

mod agent;
mod classifier;
mod config;
mod domain;
mod error;
mod extract;
mod gemini;
mod history;
mod logic;
mod protocol;
mod routes;
mod session;
mod state;
mod telemetry;
mod util;
mod validate;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::{load_agent_config_from_env, Config};
use crate::gemini::GeminiClient;
use crate::history::SqliteHistoryStore;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  // A missing .env is fine; real environment variables win either way.
  let _ = dotenvy::dotenv();
  telemetry::init_tracing();

  let cfg = Config::from_env()?;
  let agent_cfg = load_agent_config_from_env().unwrap_or_default();

  let model = GeminiClient::from_config(&cfg)?;
  info!(
    target: "careertrials_backend",
    base_url = %model.base_url,
    model = %model.model,
    project = ?cfg.google_cloud_project,
    location = %cfg.google_cloud_location,
    timeout_secs = cfg.model_timeout_secs,
    "Gemini client ready"
  );
  let store = SqliteHistoryStore::open(&cfg.db_file)?;

  let state = Arc::new(AppState::new(&cfg, agent_cfg, Arc::new(model), Arc::new(store)));
  let app = build_router(state);

  let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "careertrials_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if tokio::signal::ctrl_c().await.is_ok() {
    info!(target: "careertrials_backend", "Shutdown signal received");
  }
}
