//! services/bot/src/adapters/paraphrase_llm.rs
//!
//! This module contains the adapter for the paraphrase LLM. It implements
//! the `ParaphraseService` port from the `core` crate against any
//! OpenAI-compatible chat-completion endpoint.

const SYSTEM_INSTRUCTIONS: &str = r#"You paraphrase social media posts carefully.
Your job is to rewrite the text using different wording while keeping the same meaning.

Rules:
- Keep the original language.
- Do NOT translate anything.
- Maintain emojis, formatting, line breaks, bullet points, and spacing.
- Keep numbers, symbols, and special characters unchanged.
- The paraphrased result should sound natural.
- Do not remove links, usernames, or emojis.
- Reply with the paraphrased text only, no numbering or commentary."#;

const USER_INPUT_TEMPLATE: &str = r#"Post:
{text}

Provide one paraphrased version of about {target} words."#;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use paraphrase_bot_core::domain::ApiCredential;
use paraphrase_bot_core::ports::{ParaphraseService, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ParaphraseService` using an OpenAI-compatible
/// LLM. The credential is supplied per call, so the client is rebuilt for
/// whichever key the rotation currently selects.
#[derive(Clone)]
pub struct OpenAiParaphraseAdapter {
    model: String,
    api_base: Option<String>,
}

impl OpenAiParaphraseAdapter {
    /// Creates a new `OpenAiParaphraseAdapter`.
    pub fn new(model: String, api_base: Option<String>) -> Self {
        Self { model, api_base }
    }

    fn client(&self, credential: &ApiCredential) -> Client<OpenAIConfig> {
        let mut config = OpenAIConfig::new().with_api_key(&credential.key);
        if let Some(base) = &self.api_base {
            config = config.with_api_base(base);
        }
        Client::with_config(config)
    }
}

//=========================================================================================
// `ParaphraseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ParaphraseService for OpenAiParaphraseAdapter {
    async fn paraphrase(
        &self,
        text: &str,
        target_words: u32,
        credential: &ApiCredential,
    ) -> PortResult<String> {
        let user_input = USER_INPUT_TEMPLATE
            .replace("{text}", text)
            .replace("{target}", &target_words.to_string());

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_INSTRUCTIONS)
                    .build()
                    .map_err(|e| PortError::Upstream(e.to_string()))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_input)
                    .build()
                    .map_err(|e| PortError::Upstream(e.to_string()))?
                    .into(),
            ])
            .temperature(0.7)
            .max_tokens(800u32)
            .build()
            .map_err(|e| PortError::Upstream(e.to_string()))?;

        let response = self
            .client(credential)
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Upstream(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(PortError::Upstream("empty completion".to_string()));
        }
        Ok(trimmed.to_string())
    }
}
