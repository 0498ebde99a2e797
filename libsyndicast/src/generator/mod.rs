//! Content generation
//!
//! The generator turns an article prompt into platform copy. It is treated as
//! an opaque, non-deterministic text service: the pipeline only relies on it
//! returning non-empty text or a failure.

use async_trait::async_trait;

use crate::error::Result;

pub mod mock;
pub mod openai;

/// One text-generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// System prompt describing the writer's persona
    pub system_style: String,
    pub user_prompt: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

/// Text-generation service consumed by the publication pipeline
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Short identifier for log lines
    fn name(&self) -> &str;

    /// Generate text for the request
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` on transport failures, non-success
    /// responses, or responses without text.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}
