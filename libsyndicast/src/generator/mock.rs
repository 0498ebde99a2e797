//! Mock content generator for testing
//!
//! Returns canned text (or a canned failure) and records every request so
//! tests can assert on prompts without network access.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{GenerationError, Result};
use crate::generator::{ContentGenerator, GenerationRequest};

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

/// Mock generator with shared call recording
#[derive(Debug, Clone)]
pub struct MockGenerator {
    reply: Reply,
    delay: Duration,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl MockGenerator {
    /// Always answer with `text`
    pub fn with_text(text: &str) -> Self {
        Self {
            reply: Reply::Text(text.to_string()),
            delay: Duration::ZERO,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always answer with an empty string
    pub fn empty() -> Self {
        Self::with_text("")
    }

    /// Always fail with a generator API error carrying `message`
    pub fn failing(message: &str) -> Self {
        Self {
            reply: Reply::Fail(message.to_string()),
            delay: Duration::ZERO,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sleep before answering
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentGenerator for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match &self.reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Fail(message) => Err(GenerationError::Api {
                status: 500,
                message: message.clone(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            system_style: "s".to_string(),
            user_prompt: "u".to_string(),
            max_output_tokens: 10,
            temperature: 0.5,
        }
    }

    #[tokio::test]
    async fn test_mock_text() {
        let generator = MockGenerator::with_text("Hello");
        assert_eq!(generator.generate(&request()).await.unwrap(), "Hello");
        assert_eq!(generator.call_count(), 1);
        assert_eq!(generator.requests()[0].user_prompt, "u");
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let generator = MockGenerator::failing("quota exceeded");
        let err = generator.generate(&request()).await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_clones_share_recording() {
        let generator = MockGenerator::with_text("x");
        let clone = generator.clone();
        clone.generate(&request()).await.unwrap();
        assert_eq!(generator.call_count(), 1);
    }
}
