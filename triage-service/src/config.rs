use anyhow::{Context, Result};
use triage_flow::{Language, OpenRouterConfig};

/// Service settings, read once at startup
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub default_language: Language,
    pub openrouter: OpenRouterConfig,
}

impl ServiceConfig {
    /// Reads `PORT`, `DEFAULT_LANGUAGE` and the OpenRouter settings.
    ///
    /// Fails when `OPENROUTER_API_KEY` is missing or a value does not parse.
    pub fn from_env() -> Result<Self> {
        let openrouter = OpenRouterConfig::from_env()?;

        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got {raw:?}"))?,
            Err(_) => 3000,
        };

        let default_language = match std::env::var("DEFAULT_LANGUAGE") {
            Ok(raw) => raw.parse::<Language>().map_err(anyhow::Error::msg)?,
            Err(_) => Language::En,
        };

        Ok(Self {
            port,
            default_language,
            openrouter,
        })
    }
}
