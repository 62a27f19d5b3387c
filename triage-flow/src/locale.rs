//! Locale registry: language code → token table.
//!
//! Tables are embedded at compile time and parsed once when the registry is
//! built. Lookups for a language without a table fall back to English.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    error::{FlowError, Result},
    schema::Language,
};

const EN: &str = include_str!("../locales/en.json");
const HI: &str = include_str!("../locales/hi.json");
const OR: &str = include_str!("../locales/or.json");

/// Localized strings used by the conversation core and the service layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Translations {
    pub initial_bot_message: String,
    pub anything_else_prompt: String,
    pub anything_else_placeholder: String,
    pub yes: String,
    pub no: String,
    pub error_message: String,
    pub missing_symptoms: String,
    pub visual_symptoms: String,
    pub emergency_numbers: String,
    pub ambulance: String,
    pub national_emergency: String,
    pub police: String,
    pub fire: String,
}

impl Translations {
    /// Case-insensitive substring match against the localized "yes"
    pub fn is_affirmative(&self, text: &str) -> bool {
        contains_token(text, &self.yes)
    }

    /// Case-insensitive substring match against the localized "no"
    pub fn is_negative(&self, text: &str) -> bool {
        contains_token(text, &self.no)
    }
}

fn contains_token(text: &str, token: &str) -> bool {
    let token = token.trim();
    !token.is_empty() && text.to_lowercase().contains(&token.to_lowercase())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmergencyContact {
    pub label: String,
    pub number: &'static str,
}

/// Emergency numbers shown next to the chat, labelled in the session language
pub fn emergency_contacts(translations: &Translations) -> Vec<EmergencyContact> {
    [
        (&translations.ambulance, "102"),
        (&translations.national_emergency, "112"),
        (&translations.police, "100"),
        (&translations.fire, "101"),
    ]
    .into_iter()
    .map(|(label, number)| EmergencyContact {
        label: label.clone(),
        number,
    })
    .collect()
}

#[derive(Debug, Clone)]
pub struct LocaleRegistry {
    tables: HashMap<Language, Arc<Translations>>,
    fallback: Arc<Translations>,
}

impl LocaleRegistry {
    /// Parse the embedded `en`, `hi` and `or` tables
    pub fn builtin() -> Result<Self> {
        let mut tables = HashMap::new();
        for (language, raw) in [(Language::En, EN), (Language::Hi, HI), (Language::Or, OR)] {
            let table: Translations = serde_json::from_str(raw).map_err(|e| {
                FlowError::Config(format!("invalid locale table for {language}: {e}"))
            })?;
            tables.insert(language, Arc::new(table));
        }
        Self::from_tables(tables)
    }

    /// Build a registry from explicit tables; English must be present.
    pub fn from_tables(tables: HashMap<Language, Arc<Translations>>) -> Result<Self> {
        let fallback = tables
            .get(&Language::En)
            .cloned()
            .ok_or_else(|| FlowError::Config("missing English locale table".to_string()))?;
        Ok(Self { tables, fallback })
    }

    pub fn get(&self, language: Language) -> Arc<Translations> {
        self.tables
            .get(&language)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Resolve a raw language code; unknown codes resolve to English.
    pub fn resolve(&self, code: &str) -> (Language, Arc<Translations>) {
        match code.parse::<Language>() {
            Ok(language) => (language, self.get(language)),
            Err(_) => (Language::En, self.fallback.clone()),
        }
    }
}
