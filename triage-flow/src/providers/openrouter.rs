//! OpenRouter-backed [`ModelClient`].
//!
//! Text-only prompts go through a `rig` agent. Prompts carrying a photo are
//! sent as a multi-part chat completion (text + `image_url`) because the
//! agent API only takes plain text.

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use rig::{agent::Agent, client::CompletionClient, completion::Prompt, providers::openrouter};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::{
    error::{FlowError, Result},
    model::{ModelClient, ModelRequest, ModelTier, ResponseFormat},
};

const OPENROUTER_CHAT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    pub api_key: String,
    pub chat_model: String,
    pub vision_model: String,
    pub search_model: String,
    pub max_tokens: u32,
}

impl OpenRouterConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            chat_model: "openai/gpt-4o-mini".to_string(),
            vision_model: "openai/gpt-4.1-mini".to_string(),
            search_model: "google/gemini-2.5-pro".to_string(),
            max_tokens: 2000,
        }
    }

    /// Reads `OPENROUTER_API_KEY` plus the optional `TRIAGE_*_MODEL` overrides
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| FlowError::Config("OPENROUTER_API_KEY not set".to_string()))?;

        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("TRIAGE_MODEL") {
            config.chat_model = model;
        }
        if let Ok(model) = std::env::var("TRIAGE_VISION_MODEL") {
            config.vision_model = model;
        }
        if let Ok(model) = std::env::var("TRIAGE_HOSPITAL_MODEL") {
            config.search_model = model;
        }
        Ok(config)
    }
}

pub struct OpenRouterModel {
    config: OpenRouterConfig,
    client: openrouter::Client,
    http: Client,
}

impl OpenRouterModel {
    pub fn new(config: OpenRouterConfig) -> Self {
        let client = openrouter::Client::new(&config.api_key);
        Self {
            config,
            client,
            http: Client::new(),
        }
    }

    fn text_model(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Standard => &self.config.chat_model,
            ModelTier::Search => &self.config.search_model,
        }
    }

    fn agent(&self, model: &str, request: &ModelRequest) -> Agent<openrouter::CompletionModel> {
        let builder = self.client.agent(model).preamble(&request.preamble);
        match response_format(request.format) {
            Some(format) => builder
                .additional_params(json!({ "response_format": format }))
                .build(),
            None => builder.build(),
        }
    }

    async fn prompt_agent(&self, request: &ModelRequest) -> anyhow::Result<String> {
        let model = self.text_model(request.tier);
        debug!(task = %request.task, model = %model, format = ?request.format, "Prompting agent");
        let agent = self.agent(model, request);
        let response = agent.prompt(request.prompt.as_str()).await?;
        Ok(response)
    }

    /// Multi-part completion with the photo attached as an `image_url` part
    async fn call_with_media(&self, request: &ModelRequest, media: &str) -> anyhow::Result<String> {
        let model = &self.config.vision_model;
        debug!(task = %request.task, model = %model, "Calling vision model");

        let payload = media_payload(model, request, media, self.config.max_tokens);

        let response = self
            .http
            .post(OPENROUTER_CHAT_URL)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("LLM API request failed: {}", response.status()));
        }

        let response_json: Value = response.json().await?;
        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("Invalid response format from LLM"))?;

        Ok(content.to_string())
    }
}

/// `response_format` value for the request, if the reply must be a JSON object
fn response_format(format: ResponseFormat) -> Option<Value> {
    match format {
        ResponseFormat::Json => Some(json!({ "type": "json_object" })),
        ResponseFormat::Text => None,
    }
}

/// Chat completion body with the photo as an `image_url` part
fn media_payload(model: &str, request: &ModelRequest, media: &str, max_tokens: u32) -> Value {
    let mut payload = json!({
        "model": model,
        "messages": [
            { "role": "system", "content": request.preamble },
            {
                "role": "user",
                "content": [
                    { "type": "text", "text": request.prompt },
                    { "type": "image_url", "image_url": { "url": media } }
                ]
            }
        ],
        "max_tokens": max_tokens
    });
    if let Some(format) = response_format(request.format) {
        payload["response_format"] = format;
    }
    payload
}

#[async_trait]
impl ModelClient for OpenRouterModel {
    async fn complete(&self, request: ModelRequest) -> Result<String> {
        let outcome = match request.media.as_deref() {
            Some(media) => self.call_with_media(&request, media).await,
            None => self.prompt_agent(&request).await,
        };

        let text = outcome.map_err(|e| FlowError::model_call(&request.task, e))?;
        info!(task = %request.task, chars = text.len(), "Model call completed");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHOTO: &str = "data:image/png;base64,iVBORw0KGgo=";

    #[test]
    fn json_requests_ask_for_a_json_object() {
        let request = ModelRequest::new("SymptomAnalyzer", "preamble", "prompt");
        let payload = media_payload("openai/gpt-4.1-mini", &request, PHOTO, 2000);

        assert_eq!(payload["response_format"]["type"], "json_object");
        assert_eq!(payload["messages"][1]["content"][1]["image_url"]["url"], PHOTO);
        assert_eq!(payload["max_tokens"], 2000);
    }

    #[test]
    fn text_requests_leave_the_format_open() {
        let request =
            ModelRequest::new("HospitalLookup", "preamble", "prompt").with_format(ResponseFormat::Text);
        let payload = media_payload("google/gemini-2.5-pro", &request, PHOTO, 2000);

        assert!(payload.get("response_format").is_none());
        assert!(response_format(ResponseFormat::Text).is_none());
    }
}
