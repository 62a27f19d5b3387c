use serde::Deserialize;
use tracing::warn;

use super::{Adapter, parse_json};
use crate::{
    error::Result,
    model::{ModelRequest, ModelTier, ResponseFormat},
    schema::{Hospital, Language},
};

const HOSPITAL_PREAMBLE: &str = "You are a location assistant. Reply with JSON only.";

#[derive(Debug, Clone)]
pub struct HospitalLookupInput {
    pub latitude: f64,
    pub longitude: f64,
    pub language: Language,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HospitalList {
    List(Vec<Hospital>),
    Wrapped { hospitals: Vec<Hospital> },
}

/// Asks the model for hospitals near a coordinate, standing in for a places API.
///
/// The answer is raw text that should be JSON; anything else yields an
/// empty list instead of an error.
pub struct HospitalLookup;

impl Adapter for HospitalLookup {
    type Input = HospitalLookupInput;
    type Output = Vec<Hospital>;

    fn request(&self, input: &HospitalLookupInput) -> Result<ModelRequest> {
        let prompt = format!(
            "Find 3 real hospitals near latitude {} and longitude {}. Provide their name, full address, and phone number. Your response must be in {}.\n\
             Respond with a JSON array of objects with the fields \"name\", \"address\" and \"phone\".",
            input.latitude,
            input.longitude,
            input.language.code()
        );
        Ok(ModelRequest::new(self.id(), HOSPITAL_PREAMBLE, prompt)
            .with_format(ResponseFormat::Text)
            .with_tier(ModelTier::Search))
    }

    fn parse(&self, raw: &str) -> Result<Vec<Hospital>> {
        match parse_json::<HospitalList>(self.id(), raw) {
            Ok(HospitalList::List(list)) | Ok(HospitalList::Wrapped { hospitals: list }) => Ok(list),
            Err(e) => {
                warn!(task = %self.id(), error = %e, "Could not parse hospital data from model");
                Ok(Vec::new())
            }
        }
    }
}
