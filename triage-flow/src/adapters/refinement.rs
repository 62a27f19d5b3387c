use serde::Deserialize;

use super::{Adapter, json_instruction, parse_json};
use crate::{
    error::Result,
    model::ModelRequest,
    schema::{ConditionCandidate, GeoLocation, Language},
};

const REFINEMENT_PREAMBLE: &str = "You are a caring and empathetic AI medical assistant. A user has provided symptoms and answered some follow-up questions. Your goal is to provide helpful, cautious, and easy-to-understand information.";

// The emergency heuristics below are guidance for the model, not rules
// evaluated in code.
const REFINEMENT_PROMPT: &str = r#"Your response must be in the following language: {language}.

Based on the original symptoms and the answers to the follow-up questions, provide a refined, small list (2-3) of the most likely medical conditions.
- For each condition, provide a simple, one-line description and clearly state if it's an emergency.
- Be cautious. Conditions like COVID-19 or any illness involving significant breathing difficulty should be treated as a potential emergency.
- If the answers strongly suggest an emergency, prioritize that. For example, if a user with a headache mentions the "worst pain of my life," that is a key indicator of an emergency.
- Phrase your response gently. Start with something like "Thank you for sharing that. Based on what you've told me, here are a couple of possibilities..."

Original Symptoms: {symptoms}
{photo}
Follow-up Answers: {answers}"#;

// JSON mode only allows an object at the top level, so the list is wrapped
const REFINEMENT_SHAPE: &str = r#"{ "conditions": [
  { "conditionName": "...", "description": "...", "isEmergency": true/false }
] }"#;

#[derive(Debug, Clone)]
pub struct RefinementInput {
    pub symptoms: String,
    pub photo_data_uri: Option<String>,
    /// Follow-up Q/A transcript, including any additional information
    pub follow_up_answers: String,
    pub language: Language,
    pub location: Option<GeoLocation>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RefinementOutput {
    List(Vec<ConditionCandidate>),
    Wrapped { conditions: Vec<ConditionCandidate> },
}

/// Produces the ranked condition candidates for an episode
pub struct ConditionRefiner;

impl Adapter for ConditionRefiner {
    type Input = RefinementInput;
    type Output = Vec<ConditionCandidate>;

    fn request(&self, input: &RefinementInput) -> Result<ModelRequest> {
        let photo = if input.photo_data_uri.is_some() {
            "Photo: (attached)"
        } else {
            ""
        };
        let prompt = REFINEMENT_PROMPT
            .replace("{language}", input.language.code())
            .replace("{symptoms}", &input.symptoms)
            .replace("{photo}", photo)
            .replace("{answers}", &input.follow_up_answers);

        Ok(ModelRequest::new(
            self.id(),
            REFINEMENT_PREAMBLE,
            prompt + &json_instruction(REFINEMENT_SHAPE),
        )
        .with_media(input.photo_data_uri.clone()))
    }

    fn parse(&self, raw: &str) -> Result<Vec<ConditionCandidate>> {
        let output: RefinementOutput = parse_json(self.id(), raw)?;
        let candidates = match output {
            RefinementOutput::List(list) => list,
            RefinementOutput::Wrapped { conditions } => conditions,
        };
        Ok(candidates
            .into_iter()
            .filter(|c| !c.name.trim().is_empty())
            .collect())
    }
}
