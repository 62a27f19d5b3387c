use super::{Adapter, json_instruction, parse_json};
use crate::{
    error::Result,
    model::ModelRequest,
    schema::{Language, Precautions},
};

const PRECAUTION_PREAMBLE: &str = "You are a helpful AI assistant that provides precautions for a medical condition with a caring and cautious tone.";

const PRECAUTION_PROMPT: &str = r#"Your response must be in the following language: {language}.

Given the following medical condition and symptoms, recommend appropriate precautions.

- Your reasoning should be one sentence and easy to understand.
- Do NOT recommend any specific medication or dosage.
- Frame the recommendation as a helpful suggestion, not a prescription.

Condition: {condition}
Symptoms: {symptoms}"#;

const PRECAUTION_SHAPE: &str = r#"{ "precautions": "key precautions or warnings, or \"N/A\"", "reasoning": "one sentence" }"#;

#[derive(Debug, Clone)]
pub struct PrecautionInput {
    pub condition: String,
    pub symptoms: String,
    pub language: Language,
}

/// Cautious, non-prescriptive precautions for one condition
pub struct PrecautionAdvisor;

impl Adapter for PrecautionAdvisor {
    type Input = PrecautionInput;
    type Output = Precautions;

    fn request(&self, input: &PrecautionInput) -> Result<ModelRequest> {
        let prompt = PRECAUTION_PROMPT
            .replace("{language}", input.language.code())
            .replace("{condition}", &input.condition)
            .replace("{symptoms}", &input.symptoms);
        Ok(ModelRequest::new(
            self.id(),
            PRECAUTION_PREAMBLE,
            prompt + &json_instruction(PRECAUTION_SHAPE),
        ))
    }

    fn parse(&self, raw: &str) -> Result<Precautions> {
        parse_json(self.id(), raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_forbids_medication() {
        let request = PrecautionAdvisor
            .request(&PrecautionInput {
                condition: "Cold".into(),
                symptoms: "runny nose".into(),
                language: Language::En,
            })
            .unwrap();
        assert!(request.prompt.contains("Do NOT recommend any specific medication or dosage."));
        assert!(request.prompt.contains("Condition: Cold"));
    }

    #[test]
    fn parses_precautions() {
        let precautions = PrecautionAdvisor
            .parse(r#"{"precautions":"Rest and hydrate","reasoning":"Helps recovery."}"#)
            .unwrap();
        assert_eq!(precautions.precautions, "Rest and hydrate");
    }
}
