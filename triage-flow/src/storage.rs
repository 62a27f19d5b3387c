use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    conversation::{ConversationState, Directive, Episode, Transition},
    error::Result,
    schema::{GeoLocation, Language},
};

/// Per-user conversation state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub language: Language,
    /// Captured once when the session is created
    location: Option<GeoLocation>,
    pub state: ConversationState,
    pub episode: Option<Episode>,
    pub status_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>, language: Language, location: Option<GeoLocation>) -> Self {
        Self {
            id: id.into(),
            language,
            location,
            state: ConversationState::Idle,
            episode: None,
            status_message: None,
            created_at: Utc::now(),
        }
    }

    pub fn location(&self) -> Option<GeoLocation> {
        self.location
    }

    /// Take over the transition's state and episode, handing back its directive
    pub fn apply(&mut self, transition: Transition) -> Directive {
        self.state = transition.state;
        self.episode = transition.episode;
        transition.directive
    }

    /// Drop the current episode and go back to idle
    pub fn reset(&mut self) {
        self.state = ConversationState::Idle;
        self.episode = None;
        self.status_message = Some("Conversation reset".to_string());
    }
}

/// Trait for storing and retrieving sessions
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, session: Session) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Session>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory implementation of SessionStorage; sessions do not survive a restart
#[derive(Default)]
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, Session>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: Session) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SymptomReport;

    #[tokio::test]
    async fn test_storage_round_trip() {
        let storage = InMemorySessionStorage::new();
        let session = Session::new("session1", Language::Hi, None);
        storage.save(session).await.unwrap();

        let retrieved = storage.get("session1").await.unwrap().unwrap();
        assert_eq!(retrieved.language, Language::Hi);
        assert_eq!(retrieved.state, ConversationState::Idle);

        storage.delete("session1").await.unwrap();
        assert!(storage.get("session1").await.unwrap().is_none());
    }

    #[test]
    fn reset_clears_episode() {
        let mut session = Session::new("s", Language::En, None);
        session.state = ConversationState::AwaitingFollowUp;
        session.episode = Some(Episode::new(
            SymptomReport::new(Some("cough".into()), None, Language::En),
            vec!["Since when?".into()],
        ));

        session.reset();
        assert_eq!(session.state, ConversationState::Idle);
        assert!(session.episode.is_none());
    }
}
