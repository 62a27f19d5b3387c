//! ConversationRunner: loads a session, handles exactly **one** user turn and
//! persists the updated session back to storage.
//!
//! A session accepts one turn at a time. While a turn is in flight, further
//! turns for the same session are rejected with [`FlowError::SessionBusy`]
//! instead of being queued or interrupting the running one.

use dashmap::DashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    conversation::UserTurn,
    error::{FlowError, Result},
    orchestrator::{Orchestrator, TurnResult},
    schema::{GeoLocation, Language},
    storage::{Session, SessionStorage},
};

/// Marks a session busy until dropped
struct InFlight {
    sessions: Arc<DashSet<String>>,
    id: String,
}

impl InFlight {
    fn acquire(sessions: &Arc<DashSet<String>>, id: &str) -> Result<Self> {
        if !sessions.insert(id.to_string()) {
            return Err(FlowError::SessionBusy(id.to_string()));
        }
        Ok(Self {
            sessions: sessions.clone(),
            id: id.to_string(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.sessions.remove(&self.id);
    }
}

/// High-level helper around the _load → handle → save_ pattern.
#[derive(Clone)]
pub struct ConversationRunner {
    orchestrator: Arc<Orchestrator>,
    storage: Arc<dyn SessionStorage>,
    in_flight: Arc<DashSet<String>>,
}

impl ConversationRunner {
    pub fn new(orchestrator: Arc<Orchestrator>, storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            orchestrator,
            storage,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Create and store a new idle session
    pub async fn start_session(&self, language: Language, location: Option<GeoLocation>) -> Result<Session> {
        let session = Session::new(Uuid::new_v4().to_string(), language, location);
        self.storage.save(session.clone()).await?;
        info!(
            session_id = %session.id,
            language = %language,
            has_location = location.is_some(),
            "Session started"
        );
        Ok(session)
    }

    pub async fn session(&self, session_id: &str) -> Result<Session> {
        self.storage
            .get(session_id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))
    }

    /// Handle **exactly one** user turn for `session_id` and persist the result.
    ///
    /// `language`, when given, switches the session language before the turn
    /// is handled.
    pub async fn run(&self, session_id: &str, turn: UserTurn, language: Option<Language>) -> Result<TurnResult> {
        let _in_flight = InFlight::acquire(&self.in_flight, session_id).inspect_err(|_| {
            warn!(session_id = %session_id, "Turn rejected, session busy");
        })?;

        // 1. Load session
        let mut session = self.session(session_id).await?;
        if let Some(language) = language {
            session.language = language;
        }

        // 2. Handle the turn
        let result = self.orchestrator.handle_turn(&mut session, turn).await?;

        // 3. Persist so the next turn starts where this one left off
        self.storage.save(session).await?;

        Ok(result)
    }

    /// Abandon the current episode
    pub async fn reset(&self, session_id: &str) -> Result<Session> {
        let _in_flight = InFlight::acquire(&self.in_flight, session_id)?;
        let mut session = self.session(session_id).await?;
        session.reset();
        self.storage.save(session.clone()).await?;
        info!(session_id = %session_id, "Session reset");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        conversation::ConversationState, locale::LocaleRegistry, storage::InMemorySessionStorage,
        testing::ScriptedModel,
    };

    fn runner(model: ScriptedModel) -> ConversationRunner {
        let orchestrator = Orchestrator::new(Arc::new(model), Arc::new(LocaleRegistry::builtin().unwrap()));
        ConversationRunner::new(Arc::new(orchestrator), Arc::new(InMemorySessionStorage::new()))
    }

    #[tokio::test]
    async fn state_is_persisted_between_turns() {
        let runner = runner(
            ScriptedModel::new()
                .reply("GreetingClassifier", r#"{"isGreeting": false, "response": ""}"#)
                .reply("SymptomAnalyzer", r#"{"followUpQuestions": ["Since when?", "Any fever?"]}"#),
        );
        let session = runner.start_session(Language::En, None).await.unwrap();

        runner
            .run(&session.id, UserTurn::text("sore throat"), None)
            .await
            .unwrap();
        let stored = runner.session(&session.id).await.unwrap();
        assert_eq!(stored.state, ConversationState::AwaitingFollowUp);

        runner
            .run(&session.id, UserTurn::text("yesterday"), None)
            .await
            .unwrap();
        let stored = runner.session(&session.id).await.unwrap();
        assert_eq!(stored.episode.unwrap().answers().to_vec(), vec!["yesterday".to_string()]);
    }

    #[tokio::test]
    async fn busy_session_rejects_second_turn() {
        let runner = runner(ScriptedModel::new());
        let session = runner.start_session(Language::En, None).await.unwrap();

        let _held = InFlight::acquire(&runner.in_flight, &session.id).unwrap();
        let err = runner
            .run(&session.id, UserTurn::text("headache"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::SessionBusy(_)));
    }

    #[tokio::test]
    async fn busy_flag_is_released_after_a_turn() {
        let runner = runner(ScriptedModel::new());
        let session = runner.start_session(Language::En, None).await.unwrap();

        // precondition failure still releases the flag
        assert!(runner.run(&session.id, UserTurn::text(""), None).await.is_err());
        assert!(!runner.in_flight.contains(&session.id));
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let runner = runner(ScriptedModel::new());
        let err = runner
            .run("missing", UserTurn::text("hi"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn language_switch_applies_to_the_session() {
        let runner = runner(
            ScriptedModel::new()
                .reply("GreetingClassifier", r#"{"isGreeting": true, "response": "नमस्ते!"}"#),
        );
        let session = runner.start_session(Language::En, None).await.unwrap();

        runner
            .run(&session.id, UserTurn::text("नमस्ते"), Some(Language::Hi))
            .await
            .unwrap();
        assert_eq!(runner.session(&session.id).await.unwrap().language, Language::Hi);
    }

    #[tokio::test]
    async fn reset_returns_to_idle() {
        let runner = runner(
            ScriptedModel::new()
                .reply("GreetingClassifier", r#"{"isGreeting": false, "response": ""}"#)
                .reply("SymptomAnalyzer", r#"{"followUpQuestions": ["Since when?"]}"#),
        );
        let session = runner.start_session(Language::En, None).await.unwrap();
        runner
            .run(&session.id, UserTurn::text("back pain"), None)
            .await
            .unwrap();

        let reset = runner.reset(&session.id).await.unwrap();
        assert_eq!(reset.state, ConversationState::Idle);
        assert!(reset.episode.is_none());
    }
}
