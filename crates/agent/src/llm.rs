use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use staffchat_core::config::LlmConfig;
use staffchat_core::ChatTurn;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("model returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model returned no choices")]
    EmptyResponse,
    #[error("model response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Unavailable(String),
}

/// Text-completion seam. Every agent and the router hold their own handle.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[ChatTurn]) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
    model: String,
    temperature: Option<f32>,
}

impl OpenAiClient {
    pub fn new(
        api_key: SecretString,
        base_url: &str,
        model: impl Into<String>,
        temperature: f32,
        timeout_secs: u64,
    ) -> Result<Self, LlmError> {
        let model = model.into();
        let client =
            reqwest::Client::builder().timeout(Duration::from_secs(timeout_secs.max(1))).build()?;
        // o-series reasoning models reject sampling parameters.
        let temperature = (!is_reasoning_model(&model)).then_some(temperature);

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model,
            temperature,
        })
    }

    pub fn from_config(config: &LlmConfig, model: &str) -> Result<Self, LlmError> {
        Self::new(
            config.api_key.clone(),
            &config.base_url,
            model,
            config.temperature,
            config.timeout_secs,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body<'a>(&'a self, messages: &'a [ChatTurn]) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|turn| WireMessage { role: turn.role.as_str(), content: &turn.content })
                .collect(),
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, messages: &[ChatTurn]) -> Result<String, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.request_body(messages))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        parse_completion(&body)
    }
}

fn parse_completion(body: &str) -> Result<String, LlmError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(LlmError::EmptyResponse)
}

fn is_reasoning_model(model: &str) -> bool {
    let model = model.trim().to_ascii_lowercase();
    model.starts_with('o') && model.chars().nth(1).is_some_and(|ch| ch.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use staffchat_core::ChatTurn;

    use super::{is_reasoning_model, parse_completion, LlmError, OpenAiClient};

    fn client(model: &str) -> OpenAiClient {
        OpenAiClient::new("sk-test".to_string().into(), "https://llm.example/v1/", model, 0.1, 5)
            .expect("client should build")
    }

    #[test]
    fn request_body_carries_roles_in_order_and_temperature() {
        let client = client("gpt-4o-mini");
        let messages = vec![ChatTurn::system("classify"), ChatTurn::user("who logged in?")];

        let body = serde_json::to_value(client.request_body(&messages)).expect("serialize");

        assert_eq!(
            body,
            json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "classify"},
                    {"role": "user", "content": "who logged in?"}
                ],
                "temperature": 0.1f32
            })
        );
        assert_eq!(client.endpoint, "https://llm.example/v1/chat/completions");
    }

    #[test]
    fn reasoning_models_omit_temperature() {
        let client = client("o3-mini");
        let body = serde_json::to_value(client.request_body(&[])).expect("serialize");

        assert!(body.get("temperature").is_none());
        assert!(is_reasoning_model("o1"));
        assert!(!is_reasoning_model("omni-large"));
    }

    #[test]
    fn parse_completion_returns_first_choice_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"trend"}}]}"#;
        assert_eq!(parse_completion(body).expect("content"), "trend");
    }

    #[test]
    fn parse_completion_without_choices_is_an_error() {
        assert!(matches!(parse_completion(r#"{"choices":[]}"#), Err(LlmError::EmptyResponse)));
        assert!(matches!(parse_completion("not json"), Err(LlmError::Decode(_))));
    }
}
