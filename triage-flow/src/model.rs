use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which configured model should serve a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelTier {
    /// Default chat model
    Standard,
    /// Stronger model used as a stand-in for a places search
    Search,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseFormat {
    Text,
    Json,
}

/// One call to the hosted model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// Id of the adapter issuing the call
    pub task: String,
    pub preamble: String,
    pub prompt: String,
    /// Optional image, as a data URI
    pub media: Option<String>,
    pub format: ResponseFormat,
    pub tier: ModelTier,
}

impl ModelRequest {
    pub fn new(task: impl Into<String>, preamble: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            preamble: preamble.into(),
            prompt: prompt.into(),
            media: None,
            format: ResponseFormat::Json,
            tier: ModelTier::Standard,
        }
    }

    pub fn with_media(mut self, media: Option<String>) -> Self {
        self.media = media;
        self
    }

    pub fn with_format(mut self, format: ResponseFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_tier(mut self, tier: ModelTier) -> Self {
        self.tier = tier;
        self
    }
}

/// Opaque request/response boundary to the hosted model.
///
/// Implementations return the raw text of the model's answer; adapters own
/// parsing and validation.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: ModelRequest) -> Result<String>;
}
