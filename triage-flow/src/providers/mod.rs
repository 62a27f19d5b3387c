#[cfg(feature = "openrouter")]
pub mod openrouter;

#[cfg(feature = "openrouter")]
pub use openrouter::{OpenRouterConfig, OpenRouterModel};
