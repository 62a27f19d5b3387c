//! Model-call adapters.
//!
//! Each adapter pairs one fixed prompt template with an input type and an
//! output schema, and wraps exactly one call to the hosted model.

pub mod greeting;
pub mod hospitals;
pub mod precautions;
pub mod refinement;
pub mod symptom_analysis;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    error::{FlowError, Result},
    model::{ModelClient, ModelRequest},
};

pub use greeting::{GreetingClassifier, GreetingInput};
pub use hospitals::{HospitalLookup, HospitalLookupInput};
pub use precautions::{PrecautionAdvisor, PrecautionInput};
pub use refinement::{ConditionRefiner, RefinementInput};
pub use symptom_analysis::{AnalysisInput, MAX_FOLLOW_UP_QUESTIONS, SymptomAnalyzer};

/// A single templated model call with typed input and output
pub trait Adapter: Send + Sync {
    type Input: Send + Sync;
    type Output: Send;

    /// Unique identifier, also used as the `task` of the model request
    fn id(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Render the template for this input
    fn request(&self, input: &Self::Input) -> Result<ModelRequest>;

    /// Validate the raw model text
    fn parse(&self, raw: &str) -> Result<Self::Output>;
}

/// Render, call, parse.
pub async fn invoke<A: Adapter>(
    model: &dyn ModelClient,
    adapter: &A,
    input: &A::Input,
) -> Result<A::Output> {
    let request = adapter.request(input)?;
    debug!(task = %adapter.id(), "Invoking adapter");
    let raw = model.complete(request).await?;
    adapter.parse(&raw)
}

/// Drop a surrounding Markdown code fence, if the model added one
pub(crate) fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// From the first `{` or `[` through the last matching closer, if any
pub(crate) fn json_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let closer = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closer)?;
    (end > start).then(|| &text[start..=end])
}

/// Parse the model's JSON, tolerating a code fence or prose around it
pub(crate) fn parse_json<T: DeserializeOwned>(task: &str, raw: &str) -> Result<T> {
    let stripped = strip_code_fence(raw);
    serde_json::from_str(stripped)
        .or_else(|first| match json_span(stripped) {
            Some(span) if span.len() < stripped.len() => serde_json::from_str(span),
            _ => Err(first),
        })
        .map_err(|e| FlowError::invalid_response(task, format!("{e}. Raw response: {raw}")))
}

/// Suffix appended to every template that expects JSON back
pub(crate) fn json_instruction(shape: &str) -> String {
    format!(
        "\nRespond **only** with JSON of the form:\n{shape}\nDo not mix text and JSON in your response."
    )
}
