use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use triage_flow::{BotReply, ConversationState, EmergencyContact, Language, Session};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub language: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub language: Language,
    pub message: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    #[serde(default)]
    pub content: String,
    pub photo_data_uri: Option<String>,
    /// Switches the session language from this turn on
    pub language: Option<String>,
    /// Only used when the request creates a new session
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub replies: Vec<BotReply>,
    pub state: ConversationState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub language: Language,
    pub state: ConversationState,
    pub pending_questions: usize,
    pub answered_questions: usize,
    pub has_location: bool,
    pub status_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        let (pending, answered) = session
            .episode
            .as_ref()
            .map(|episode| {
                let answered = episode.answers().len();
                (episode.questions().len().saturating_sub(answered), answered)
            })
            .unwrap_or((0, 0));

        Self {
            session_id: session.id.clone(),
            language: session.language,
            state: session.state,
            pending_questions: pending,
            answered_questions: answered,
            has_location: session.location().is_some(),
            status_message: session.status_message.clone(),
            created_at: session.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EmergencyNumbersQuery {
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmergencyNumbersResponse {
    pub language: Language,
    pub title: String,
    pub contacts: Vec<EmergencyContact>,
}
