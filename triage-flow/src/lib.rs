//! Conversation engine for an LLM-backed symptom triage assistant.
//!
//! A conversation moves through three states: idle, collecting follow-up
//! answers, and asking whether the user has anything to add. Every medical
//! judgement is delegated to the hosted model through fixed prompt
//! templates (see [`adapters`]); this crate sequences those calls.

pub mod adapters;
pub mod conversation;
pub mod error;
pub mod locale;
pub mod model;
pub mod orchestrator;
pub mod providers;
pub mod runner;
pub mod schema;
pub mod storage;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use conversation::{ConversationState, Episode, UserTurn};
pub use error::{FlowError, Result};
pub use locale::{EmergencyContact, LocaleRegistry, Translations, emergency_contacts};
pub use model::{ModelClient, ModelRequest, ModelTier, ResponseFormat};
pub use orchestrator::{BotReply, Orchestrator, TurnResult};
pub use runner::ConversationRunner;
pub use schema::{Condition, GeoLocation, Hospital, Language, Precautions, SymptomReport};
pub use storage::{InMemorySessionStorage, Session, SessionStorage};

#[cfg(feature = "openrouter")]
pub use providers::{OpenRouterConfig, OpenRouterModel};
