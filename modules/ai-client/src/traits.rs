use async_trait::async_trait;

use crate::error::Result;

// =============================================================================
// Completion Request
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: 256,
            temperature: 0.0,
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

// =============================================================================
// TextCompletion Trait
// =============================================================================

/// A provider that turns a prompt into free text.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Short provider name for logs and error context.
    fn provider(&self) -> &'static str;

    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}
