use thiserror::Error;

/// Errors produced while running a conversation turn
#[derive(Debug, Error)]
pub enum FlowError {
    /// Neither symptom text nor a photo was supplied
    #[error("Please provide a description or a photo of your symptoms.")]
    MissingSymptoms,

    #[error("Message is empty")]
    EmptyMessage,

    /// The hosted model call failed (transport, auth, provider error)
    #[error("Model call failed for {task}: {message}")]
    ModelCall { task: String, message: String },

    /// The model answered, but not in the shape the adapter expects
    #[error("Invalid response from {task}: {message}")]
    InvalidResponse { task: String, message: String },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// A previous turn for this session is still in flight
    #[error("Session is busy: {0}")]
    SessionBusy(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FlowError {
    pub fn model_call(task: impl Into<String>, message: impl ToString) -> Self {
        Self::ModelCall {
            task: task.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid_response(task: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidResponse {
            task: task.into(),
            message: message.to_string(),
        }
    }

    /// Precondition errors are reported before any model call is made
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::MissingSymptoms | Self::EmptyMessage)
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
