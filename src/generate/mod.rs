pub mod chat;

use async_trait::async_trait;

use crate::config::GeneratorConfig;
use crate::error::Result;

pub use chat::ChatCompletionsGenerator;

/// One prompt for the external text generator
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
    pub temperature: f32,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
}

impl GenerationRequest {
    /// Request for `prompt` using the configured model and sampling settings
    pub fn from_config(prompt: String, config: &GeneratorConfig) -> Self {
        Self {
            prompt,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Text-completion service
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_config_defaults() {
        let request = GenerationRequest::from_config("prompt".to_string(), &GeneratorConfig::default());
        assert_eq!(request.model, "qwen/qwen3-30b-a3b:free");
        assert_eq!(request.max_tokens, 512);
        assert!((request.temperature - 0.7).abs() < f32::EPSILON);
    }
}
