//! Session/agent cache: maps a (session_id, user_id) pair to a long-lived
//! agent handle.
//!
//! A key is absent until the first `get_or_create`, then active until `clear`.
//! There is no expiry. Insert-if-absent happens under the write lock, so
//! concurrent first calls for one key build exactly one agent.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::agent::Agent;

/// Composite identity of one conversation. Exact, case-sensitive match.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionKey {
  pub session_id: String,
  pub user_id: String,
}

impl SessionKey {
  pub fn new(session_id: impl Into<String>, user_id: impl Into<String>) -> Self {
    Self { session_id: session_id.into(), user_id: user_id.into() }
  }
}

impl fmt::Display for SessionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.session_id, self.user_id)
  }
}

/// Builds a fresh agent for a key. Must not block or do I/O: it runs while
/// the cache write lock is held.
pub trait AgentFactory: Send + Sync {
  fn create(&self, key: &SessionKey) -> Arc<Agent>;
}

pub struct SessionCache {
  agents: RwLock<HashMap<SessionKey, Arc<Agent>>>,
  factory: Arc<dyn AgentFactory>,
}

impl SessionCache {
  pub fn new(factory: Arc<dyn AgentFactory>) -> Self {
    Self { agents: RwLock::new(HashMap::new()), factory }
  }

  /// Existing handle for `key`, or a new one built by the factory.
  #[instrument(level = "debug", target = "session", skip(self), fields(%key))]
  pub async fn get_or_create(&self, key: &SessionKey) -> Arc<Agent> {
    if let Some(agent) = self.agents.read().await.get(key) {
      return Arc::clone(agent);
    }

    let mut agents = self.agents.write().await;
    let agent = agents.entry(key.clone()).or_insert_with(|| {
      info!(target: "session", session_id = %key.session_id, user_id = %key.user_id, "Creating new agent");
      self.factory.create(key)
    });
    Arc::clone(agent)
  }

  /// Drop the handle for `key`. Absent keys are a no-op. Persisted turns stay.
  #[instrument(level = "debug", target = "session", skip(self), fields(%key))]
  pub async fn clear(&self, key: &SessionKey) {
    if self.agents.write().await.remove(key).is_some() {
      info!(target: "session", %key, "Cleared agent cache");
    } else {
      debug!(target: "session", %key, "Clear requested for inactive session");
    }
  }

  pub async fn exists(&self, key: &SessionKey) -> bool {
    self.agents.read().await.contains_key(key)
  }
}
