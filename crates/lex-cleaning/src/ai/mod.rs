//! LLM providers for external cleaning recommendations.
//!
//! The [`AIProvider`] trait is always available so callers can plug in their
//! own backend (or a canned one in tests). The HTTP-backed
//! [`OpenRouterProvider`] needs the `ai` feature (on by default):
//!
//! ```toml
//! # Heuristic recommendations only, no HTTP stack
//! lex-cleaning = { version = "0.1", default-features = false }
//! ```

mod provider;
pub use provider::AIProvider;

#[cfg(feature = "ai")]
mod openrouter;

#[cfg(feature = "ai")]
pub use openrouter::{OpenRouterConfig, OpenRouterConfigBuilder, OpenRouterProvider};
