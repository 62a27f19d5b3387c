//! Request and response shapes shared by the adapters, the orchestrator and
//! the service layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Languages the assistant can answer in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Hi,
    Or,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::En, Language::Hi, Language::Or];

    /// Code forwarded into every model prompt
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Hi => "hi",
            Language::Or => "or",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Language::En),
            "hi" => Ok(Language::Hi),
            "or" => Ok(Language::Or),
            other => Err(format!("unsupported language code: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// What the user reported at the start of an episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomReport {
    pub symptoms: Option<String>,
    /// `data:<mimetype>;base64,<payload>`
    pub photo_data_uri: Option<String>,
    pub language: Language,
}

impl SymptomReport {
    /// Blank text counts as absent.
    pub fn new(symptoms: Option<String>, photo_data_uri: Option<String>, language: Language) -> Self {
        Self {
            symptoms: symptoms.filter(|s| !s.trim().is_empty()),
            photo_data_uri: photo_data_uri.filter(|p| !p.trim().is_empty()),
            language,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.symptoms.is_none() && self.photo_data_uri.is_none()
    }

    pub fn has_photo(&self) -> bool {
        self.photo_data_uri.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreetingReply {
    #[serde(rename = "isGreeting")]
    pub is_greeting: bool,
    #[serde(default)]
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpQuestions {
    #[serde(rename = "followUpQuestions", default)]
    pub follow_up_questions: Vec<String>,
}

/// A condition as returned by the refinement prompt, before enrichment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionCandidate {
    #[serde(rename = "conditionName")]
    pub name: String,
    pub description: String,
    #[serde(rename = "isEmergency", default)]
    pub is_emergency: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Precautions {
    pub precautions: String,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    pub name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A candidate after the enrichment phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    pub description: String,
    pub is_emergency: bool,
    pub precautions: Option<Precautions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nearby_hospitals: Option<Vec<Hospital>>,
}

impl From<ConditionCandidate> for Condition {
    fn from(candidate: ConditionCandidate) -> Self {
        Self {
            name: candidate.name,
            description: candidate.description,
            is_emergency: candidate.is_emergency,
            precautions: None,
            nearby_hospitals: None,
        }
    }
}
