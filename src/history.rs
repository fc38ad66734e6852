//! Conversation persistence backend.
//!
//! Every agent restores its earlier turns from here on first use and appends
//! each completed exchange, so a conversation survives process restarts.
//! Evicting an agent from the session cache does not delete its turns.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::session::SessionKey;

#[derive(Debug, Error)]
pub enum HistoryError {
  #[error("storage error: {0}")]
  Storage(String),
  #[error("failed to create database directory: {0}")]
  Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for HistoryError {
  fn from(e: rusqlite::Error) -> Self {
    HistoryError::Storage(e.to_string())
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  User,
  Model,
}

impl Role {
  fn as_str(self) -> &'static str {
    match self {
      Role::User => "user",
      Role::Model => "model",
    }
  }

  fn parse(s: &str) -> Option<Self> {
    match s {
      "user" => Some(Role::User),
      "model" => Some(Role::Model),
      _ => None,
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
  pub role: Role,
  pub content: String,
}

impl Turn {
  pub fn user(content: impl Into<String>) -> Self {
    Self { role: Role::User, content: content.into() }
  }
  pub fn model(content: impl Into<String>) -> Self {
    Self { role: Role::Model, content: content.into() }
  }
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
  /// All turns recorded for `key`, oldest first.
  async fn load(&self, key: &SessionKey) -> Result<Vec<Turn>, HistoryError>;
  async fn append(&self, key: &SessionKey, turns: &[Turn]) -> Result<(), HistoryError>;
  /// Cheap liveness probe for the health endpoint.
  async fn ping(&self) -> bool;
}

/// SQLite-backed store. One connection behind a mutex; calls run on the
/// blocking thread-pool.
pub struct SqliteHistoryStore {
  conn: Arc<Mutex<Connection>>,
}

impl SqliteHistoryStore {
  /// Open (or create) the database file, creating parent directories.
  pub fn open(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    info!(target: "session", path = %path.display(), "Opened conversation store");
    Self::init(conn)
  }

  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self, HistoryError> {
    Self::init(Connection::open_in_memory()?)
  }

  fn init(conn: Connection) -> Result<Self, HistoryError> {
    conn.execute_batch(
      "
      CREATE TABLE IF NOT EXISTS agent_sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
      );
      CREATE INDEX IF NOT EXISTS idx_agent_sessions_key ON agent_sessions(session_id, user_id, id);
      ",
    )?;
    Ok(Self { conn: Arc::new(Mutex::new(conn)) })
  }

  async fn with_conn<F, T>(&self, f: F) -> Result<T, HistoryError>
  where
    F: FnOnce(&mut Connection) -> Result<T, HistoryError> + Send + 'static,
    T: Send + 'static,
  {
    let conn = Arc::clone(&self.conn);
    tokio::task::spawn_blocking(move || {
      let mut conn = conn
        .lock()
        .map_err(|e| HistoryError::Storage(format!("failed to acquire database lock: {e}")))?;
      f(&mut conn)
    })
    .await
    .map_err(|e| HistoryError::Storage(format!("task join error: {e}")))?
  }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
  async fn load(&self, key: &SessionKey) -> Result<Vec<Turn>, HistoryError> {
    let key = key.clone();
    self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT role, content FROM agent_sessions WHERE session_id = ?1 AND user_id = ?2 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![key.session_id, key.user_id], |row| {
          Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut turns = Vec::new();
        for row in rows {
          let (role, content) = row?;
          let role = Role::parse(&role)
            .ok_or_else(|| HistoryError::Storage(format!("unknown role in agent_sessions: {role}")))?;
          turns.push(Turn { role, content });
        }
        Ok(turns)
      })
      .await
  }

  async fn append(&self, key: &SessionKey, turns: &[Turn]) -> Result<(), HistoryError> {
    let key = key.clone();
    let turns = turns.to_vec();
    self
      .with_conn(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO agent_sessions (session_id, user_id, role, content) VALUES (?1, ?2, ?3, ?4)",
          )?;
          for t in &turns {
            stmt.execute(params![key.session_id, key.user_id, t.role.as_str(), t.content])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await
  }

  async fn ping(&self) -> bool {
    self
      .with_conn(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?))
      .await
      .is_ok()
  }
}

/// Process-local store, used by tests and when no database is wanted.
#[derive(Default)]
pub struct MemoryHistoryStore {
  turns: Mutex<HashMap<SessionKey, Vec<Turn>>>,
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
  async fn load(&self, key: &SessionKey) -> Result<Vec<Turn>, HistoryError> {
    let map = self.turns.lock().map_err(|e| HistoryError::Storage(e.to_string()))?;
    Ok(map.get(key).cloned().unwrap_or_default())
  }

  async fn append(&self, key: &SessionKey, turns: &[Turn]) -> Result<(), HistoryError> {
    let mut map = self.turns.lock().map_err(|e| HistoryError::Storage(e.to_string()))?;
    map.entry(key.clone()).or_default().extend_from_slice(turns);
    Ok(())
  }

  async fn ping(&self) -> bool {
    true
  }
}
