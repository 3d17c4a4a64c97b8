//! OpenAI-backed LLM client.
//!
//! One chat completion per call, no retries and no timeout wrapper: a failed
//! call surfaces immediately and the caller decides what that means for its
//! step.  Works against any OpenAI-compatible endpoint via `openai_api_base`.

use std::sync::Arc;

use anyhow::anyhow;
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
};
use async_trait::async_trait;
use tracing::{info, instrument};

use crate::base::config::Config;
use crate::base::types::Res;

use super::{GenericLlmClient, LlmClient};

// Extra methods on `LlmClient` applied by the openai implementation.

impl LlmClient {
    pub fn openai(config: &Config) -> Self {
        let client = OpenAiLlmClient::new(config);
        Self::new(Arc::new(client))
    }
}

// Specific implementations.

/// OpenAI LLM client implementation.
#[derive(Clone)]
pub struct OpenAiLlmClient {
    client: Client<OpenAIConfig>,
    config: Config,
}

impl OpenAiLlmClient {
    /// Create a new OpenAI LLM client.
    #[instrument(name = "OpenAiLlmClient::new", skip_all)]
    pub fn new(config: &Config) -> Self {
        let mut cfg = OpenAIConfig::new().with_api_key(config.openai_api_key.clone());

        if let Some(base) = &config.openai_api_base {
            cfg = cfg.with_api_base(base.clone());
        }

        Self {
            client: Client::with_config(cfg),
            config: config.clone(),
        }
    }
}

#[async_trait]
impl GenericLlmClient for OpenAiLlmClient {
    #[instrument(name = "OpenAiLlmClient::complete", skip_all)]
    async fn complete(&self, prompt: &str) -> Res<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.openai_model)
            .temperature(self.config.openai_temperature)
            .max_completion_tokens(self.config.openai_max_tokens)
            .messages([ChatCompletionRequestUserMessageArgs::default().content(prompt).build()?.into()])
            .build()?;

        let response = self.client.chat().create(request).await?;

        info!("LLM completion returned {} choices.", response.choices.len());

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("LLM returned an empty completion"))
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::config::ConfigInner;

    fn create_test_config() -> Config {
        Config {
            inner: Arc::new(ConfigInner {
                openai_api_key: std::env::var("OPENAI_API_KEY").unwrap_or_else(|_| "test_key".to_string()),
                openai_model: "gpt-4o-mini".to_string(),
                openai_temperature: 0.0,
                openai_max_tokens: 200u32, // Small for tests
                ..Default::default()
            }),
        }
    }

    #[test]
    fn client_carries_its_config() {
        let config = create_test_config();
        let client = OpenAiLlmClient::new(&config);

        assert_eq!(client.config.openai_model, "gpt-4o-mini");
        assert_eq!(client.config.openai_max_tokens, 200);
    }

    #[test]
    fn client_accepts_a_custom_api_base() {
        let mut config = create_test_config();
        let inner = Arc::make_mut(&mut config.inner);
        inner.openai_api_base = Some("https://api.groq.com/openai/v1".to_string());

        // Construction must not choke on the override.
        let _ = OpenAiLlmClient::new(&config);
    }

    #[tokio::test]
    async fn completion_against_live_api() {
        // Only meaningful with a real key; skip otherwise.
        if std::env::var("OPENAI_API_KEY").is_err() {
            return;
        }

        let config = create_test_config();
        let client = LlmClient::openai(&config);

        let response = client.complete("Reply with the single word: pong").await.unwrap();
        assert!(!response.is_empty(), "Response should not be empty");
    }
}
