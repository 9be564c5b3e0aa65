use crate::config::Config;
use crate::error::LlmError;
use async_openai::{
    config::OpenAIConfig,
    types::{AudioInput, ChatCompletionRequestMessage, CreateChatCompletionRequestArgs, CreateTranscriptionRequestArgs},
    Client,
};
use std::time::Duration;
use tracing::debug;

/// OpenAI-compatible client for chat completions and audio transcription.
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    chat_model: String,
    transcription_model: String,
    timeout: Duration,
}

impl LlmClient {
    pub fn new(config: &Config) -> Self {
        let mut llm_config = OpenAIConfig::new().with_api_base(&config.llm_url);

        if let Some(key) = &config.llm_api_key {
            llm_config = llm_config.with_api_key(key);
        } else {
            llm_config = llm_config.with_api_key("unused");
        }

        Self {
            client: Client::with_config(llm_config),
            chat_model: config.llm_model.clone(),
            transcription_model: config.transcription_model.clone(),
            timeout: Duration::from_secs(config.llm_timeout_secs),
        }
    }

    pub async fn chat(&self, messages: Vec<ChatCompletionRequestMessage>) -> Result<String, LlmError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.chat_model)
            .messages(messages)
            .build()?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| LlmError::Timeout(self.timeout.as_secs()))??;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        debug!("LLM returned {} characters", content.len());
        Ok(content)
    }

    pub async fn transcribe(&self, file_name: &str, audio: Vec<u8>) -> Result<String, LlmError> {
        let request = CreateTranscriptionRequestArgs::default()
            .file(AudioInput::from_vec_u8(file_name.to_string(), audio))
            .model(&self.transcription_model)
            .build()?;

        let response = tokio::time::timeout(self.timeout, self.client.audio().transcribe(request))
            .await
            .map_err(|_| LlmError::Timeout(self.timeout.as_secs()))??;

        Ok(response.text)
    }
}
