//! Application state: session cache, model client, history store, prompts and
//! the response classifier.
//!
//! Everything is constructor-injected so tests can swap the model and the
//! store for deterministic doubles.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::agent::ModelAgentFactory;
use crate::classifier::ResponseClassifier;
use crate::config::{AgentConfig, Config, Prompts};
use crate::gemini::ChatModel;
use crate::history::HistoryStore;
use crate::session::SessionCache;
use crate::util::fill_template;

pub struct AppState {
    pub sessions: SessionCache,
    pub model: Arc<dyn ChatModel>,
    pub store: Arc<dyn HistoryStore>,
    pub prompts: Prompts,
    pub classifier: ResponseClassifier,
}

impl AppState {
    /// Wire the cache to a model-backed agent factory whose system prompt is
    /// rendered once with the configured limits.
    #[instrument(level = "info", skip_all)]
    pub fn new(
        cfg: &Config,
        agent_cfg: AgentConfig,
        model: Arc<dyn ChatModel>,
        store: Arc<dyn HistoryStore>,
    ) -> Self {
        let AgentConfig { prompts, classifier } = agent_cfg;

        let max_questions = cfg.max_questions.to_string();
        let max_challenges = cfg.max_challenges.to_string();
        let system_prompt = fill_template(
            &prompts.system_template,
            &[("max_questions", max_questions.as_str()), ("max_challenges", max_challenges.as_str())],
        );
        let factory = ModelAgentFactory::new(model.clone(), store.clone(), system_prompt);
        let classifier = ResponseClassifier::new(&classifier.internal_phrases, prompts.fallback_reply.clone());

        info!(
            target: "careertrials_backend",
            model = %model.model_id(),
            max_questions = cfg.max_questions,
            max_challenges = cfg.max_challenges,
            "Application state ready"
        );

        Self {
            sessions: SessionCache::new(Arc::new(factory)),
            model,
            store,
            prompts,
            classifier,
        }
    }
}

#[cfg(test)]
impl AppState {
    /// State over a scripted model and an in-memory store, default prompts.
    pub fn for_tests(model: Arc<crate::agent::test_support::ScriptedModel>) -> Arc<Self> {
        let cfg = Config::from_lookup(|k| (k == "GOOGLE_API_KEY").then(|| "test-key".to_string()))
            .expect("test config");
        let store = Arc::new(crate::history::MemoryHistoryStore::default());
        Arc::new(Self::new(&cfg, AgentConfig::default(), model, store))
    }
}
