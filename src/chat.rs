//! OpenAI-compatible chat-completions provider for AI extraction.

use serde::Deserialize;
use serde_json::json;
use ureq::Agent;

use crate::config::ProviderConfig;
use crate::error::AiError;
use crate::extract::ai::{build_prompt, parse_extraction, AiExtraction, AiExtractor, AiRequest, SYSTEM_PROMPT};
use crate::http::{classify_error, default_agent};

pub struct ChatExtractor {
    name: String,
    model: String,
    base_url: String,
    api_key: String,
    agent: Agent,
}

impl ChatExtractor {
    /// Reads the API key from the environment variable named in `config`.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, AiError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AiError::Network(format!("{} not set", config.api_key_env)))?;
        Ok(Self {
            name: config.name.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            agent: default_agent(),
        })
    }

    fn build_request_body(&self, prompt: &str) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
            "temperature": 0.1,
        })
    }

    fn parse_response(body: &str) -> Result<String, AiError> {
        let response: ChatResponse =
            serde_json::from_str(body).map_err(|e| AiError::InvalidResponse(e.to_string()))?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AiError::InvalidResponse("no choices".into()))?;
        Ok(choice.message.content)
    }
}

impl AiExtractor for ChatExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, request: &AiRequest) -> Result<AiExtraction, AiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request_body(&build_prompt(request));

        let response = self
            .agent
            .post(&url)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(body)
            .map_err(classify_error)?;

        let raw = response
            .into_body()
            .read_to_string()
            .map_err(|e| AiError::Network(format!("{e}")))?;

        let content = Self::parse_response(raw.trim())?;
        parse_extraction(&content)
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}
