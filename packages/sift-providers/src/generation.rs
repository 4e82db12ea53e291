use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// Single-prompt text generation capability.
#[async_trait]
pub trait Generator: Send + Sync {
	async fn generate(&self, prompt: &str) -> Result<String>;
}

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiGenerator {
	client: Client,
	cfg: sift_config::GenerationProviderConfig,
}
impl OpenAiGenerator {
	pub fn new(cfg: sift_config::GenerationProviderConfig) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self { client, cfg })
	}
}
#[async_trait]
impl Generator for OpenAiGenerator {
	async fn generate(&self, prompt: &str) -> Result<String> {
		let url = format!("{}{}", self.cfg.api_base, self.cfg.path);
		let body = serde_json::json!({
			"model": self.cfg.model,
			"temperature": self.cfg.temperature,
			"messages": [
				{ "role": "user", "content": prompt }
			],
		});
		let res = self
			.client
			.post(url)
			.headers(crate::auth_headers(&self.cfg.api_key, &self.cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		parse_generation_response(json)
	}
}

fn parse_generation_response(json: Value) -> Result<String> {
	json.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|choices| choices.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|message| message.get("content"))
		.and_then(|content| content.as_str())
		.map(str::to_string)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Generation response is missing choices[0].message.content.".to_string(),
		})
}
