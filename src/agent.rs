//! Agent handle: one stateful conversation with the model, bound to a session key.
//!
//! The handle keeps the running transcript in memory, restores earlier turns
//! from the history store on first use, and persists each completed exchange.
//! Turns on one handle are serialized by its mutex.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, instrument};

use crate::gemini::{ChatModel, ModelError};
use crate::history::{HistoryError, HistoryStore, Turn};
use crate::session::{AgentFactory, SessionKey};

#[derive(Debug, Error)]
pub enum AgentError {
  #[error(transparent)]
  Model(#[from] ModelError),
  #[error(transparent)]
  History(#[from] HistoryError),
}

#[derive(Default)]
struct Conversation {
  turns: Vec<Turn>,
  restored: bool,
}

pub struct Agent {
  key: SessionKey,
  system_prompt: String,
  model: Arc<dyn ChatModel>,
  store: Arc<dyn HistoryStore>,
  conversation: Mutex<Conversation>,
}

impl Agent {
  pub fn new(
    key: SessionKey,
    system_prompt: String,
    model: Arc<dyn ChatModel>,
    store: Arc<dyn HistoryStore>,
  ) -> Self {
    Self { key, system_prompt, model, store, conversation: Mutex::new(Conversation::default()) }
  }

  /// Send one user turn and return the model's raw reply.
  ///
  /// A failed model call leaves the transcript as it was before the call.
  #[instrument(level = "info", target = "session", skip(self, message), fields(key = %self.key, message_len = message.len()))]
  pub async fn run(&self, message: &str) -> Result<String, AgentError> {
    let mut conv = self.conversation.lock().await;
    if !conv.restored {
      conv.turns = self.store.load(&self.key).await?;
      conv.restored = true;
      debug!(target: "session", key = %self.key, restored_turns = conv.turns.len(), "Restored conversation history");
    }

    conv.turns.push(Turn::user(message));
    let result = self.model.complete(&self.system_prompt, &conv.turns).await;
    let reply = match result {
      Ok(reply) => reply,
      Err(e) => {
        conv.turns.pop();
        return Err(e.into());
      }
    };
    conv.turns.push(Turn::model(reply.clone()));

    let exchange = &conv.turns[conv.turns.len() - 2..];
    if let Err(e) = self.store.append(&self.key, exchange).await {
      // The in-memory transcript stays authoritative for this process.
      error!(target: "session", key = %self.key, error = %e, "Failed to persist conversation turn");
    }
    Ok(reply)
  }
}

/// Builds model-backed agents sharing one client, one store and one prompt.
pub struct ModelAgentFactory {
  model: Arc<dyn ChatModel>,
  store: Arc<dyn HistoryStore>,
  system_prompt: String,
}

impl ModelAgentFactory {
  pub fn new(model: Arc<dyn ChatModel>, store: Arc<dyn HistoryStore>, system_prompt: String) -> Self {
    Self { model, store, system_prompt }
  }
}

impl AgentFactory for ModelAgentFactory {
  fn create(&self, key: &SessionKey) -> Arc<Agent> {
    Arc::new(Agent::new(key.clone(), self.system_prompt.clone(), self.model.clone(), self.store.clone()))
  }
}

#[cfg(test)]
pub mod test_support {
  //! Deterministic model double shared by unit and HTTP tests.

  use std::collections::VecDeque;
  use std::sync::{Arc, Mutex};

  use async_trait::async_trait;

  use super::Agent;
  use crate::gemini::{ChatModel, ModelError};
  use crate::history::{MemoryHistoryStore, Turn};
  use crate::session::SessionKey;

  /// Replays canned replies in order and records every transcript it was sent.
  /// Once the script runs out it answers with `ModelError::EmptyReply`.
  pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    pub calls: Mutex<Vec<Vec<Turn>>>,
  }

  impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Arc<Self>
    where
      I: IntoIterator<Item = S>,
      S: Into<String>,
    {
      Arc::new(Self {
        replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
        calls: Mutex::new(Vec::new()),
      })
    }

    pub fn failing(message: &str) -> Arc<Self> {
      Arc::new(Self {
        replies: Mutex::new(VecDeque::from([Err(message.to_string())])),
        calls: Mutex::new(Vec::new()),
      })
    }

    pub fn call_count(&self) -> usize {
      self.calls.lock().unwrap().len()
    }

    pub fn last_user_message(&self) -> Option<String> {
      let calls = self.calls.lock().unwrap();
      calls.last().and_then(|t| t.last()).map(|t| t.content.clone())
    }
  }

  #[async_trait]
  impl ChatModel for ScriptedModel {
    fn model_id(&self) -> &str {
      "scripted-model"
    }

    async fn complete(&self, _system: &str, turns: &[Turn]) -> Result<String, ModelError> {
      self.calls.lock().unwrap().push(turns.to_vec());
      match self.replies.lock().unwrap().pop_front() {
        Some(Ok(text)) => Ok(text),
        Some(Err(msg)) => Err(ModelError::Transport(msg)),
        None => Err(ModelError::EmptyReply),
      }
    }
  }

  pub fn agent_for(key: &SessionKey, model: Arc<ScriptedModel>) -> Arc<Agent> {
    Arc::new(Agent::new(
      key.clone(),
      "test system prompt".into(),
      model,
      Arc::new(MemoryHistoryStore::default()),
    ))
  }
}
