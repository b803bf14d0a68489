//! LLM provider abstraction.
//!
//! [`AIProvider`] is the only seam between the cleaning engine and a language
//! model. The external recommender sends one system message and one prompt,
//! and expects text back; everything else (prompt building, JSON extraction,
//! validation) lives in [`crate::decisions::AiRecommender`].
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_cleaning::ai::OpenRouterProvider;
//! use lex_cleaning::Pipeline;
//! use std::sync::Arc;
//!
//! let provider = Arc::new(OpenRouterProvider::new("your-api-key")?);
//! let pipeline = Pipeline::builder().ai_provider(provider).build()?;
//! ```

use anyhow::Result;

/// A chat-style completion backend.
///
/// Implementations must be `Send + Sync`; the pipeline holds them behind an
/// `Arc` and may be moved across threads. Any error is treated by the
/// pipeline as "recommendation unavailable" and triggers the heuristic
/// fallback.
pub trait AIProvider: Send + Sync {
    /// Send a system message and a user prompt, returning the reply text.
    fn complete(&self, system: &str, prompt: &str) -> Result<String>;

    /// Provider name for logging and the report's recommendation source.
    fn name(&self) -> &str;

    /// Model identifier, when the provider exposes one.
    fn model(&self) -> Option<&str> {
        None
    }
}
