//! Completion client for the drafting model.
//!
//! `LlmClient` is the seam tests script against; `HttpLlmClient` is the
//! production implementation speaking the Gemini or Ollama wire format.

use async_trait::async_trait;
use deedcraft_core::config::{LlmConfig, LlmProvider};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;

const GEMINI_DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("llm returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("llm response had unexpected shape: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

pub struct HttpLlmClient {
    http: reqwest::Client,
    provider: LlmProvider,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| GEMINI_DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            http,
            provider: config.provider,
            base_url,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    async fn complete_gemini(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let mut request = self.http.post(&url).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.header("x-goog-api-key", api_key.expose_secret());
        }

        let payload = expect_ok(request.send().await?).await?;
        payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                LlmError::MalformedResponse("missing candidates[0].content.parts[0].text".into())
            })
    }

    async fn complete_ollama(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let payload = expect_ok(self.http.post(&url).json(&body).send().await?).await?;
        payload["response"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LlmError::MalformedResponse("missing response field".into()))
    }
}

async fn expect_ok(response: reqwest::Response) -> Result<Value, LlmError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::UnexpectedStatus { status: status.as_u16(), body });
    }
    Ok(response.json::<Value>().await?)
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        match self.provider {
            LlmProvider::Gemini => self.complete_gemini(prompt).await,
            LlmProvider::Ollama => self.complete_ollama(prompt).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use deedcraft_core::config::{LlmConfig, LlmProvider};

    use super::HttpLlmClient;

    #[test]
    fn base_url_defaults_to_gemini_and_drops_trailing_slash() {
        let config = LlmConfig {
            provider: LlmProvider::Gemini,
            api_key: Some("test-key".to_string().into()),
            base_url: None,
            model: "gemini-2.0-flash".to_string(),
            timeout_secs: 30,
        };
        let client = HttpLlmClient::from_config(&config).expect("client should build");
        assert_eq!(client.base_url, "https://generativelanguage.googleapis.com");

        let config = LlmConfig {
            base_url: Some("http://localhost:11434/".to_string()),
            provider: LlmProvider::Ollama,
            api_key: None,
            model: "llama3.1".to_string(),
            timeout_secs: 30,
        };
        let client = HttpLlmClient::from_config(&config).expect("client should build");
        assert_eq!(client.base_url, "http://localhost:11434");
    }
}
