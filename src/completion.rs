//! Text-completion clients.
//!
//! Concrete implementations of the core [`CompletionService`] trait:
//! - **[`DisabledCompletion`]**: returns errors; used when no provider is configured.
//! - **[`WorkersAiCompletion`]**: Cloudflare Workers AI REST API (`/ai/run/{model}`).
//! - **[`OpenAiCompletion`]**: OpenAI-compatible chat completions.
//!
//! # Provider Selection
//!
//! Use [`create_completion`] to instantiate the provider named in the
//! `[completion]` config section:
//!
//! ```rust,no_run
//! # use feedback_pulse::config::CompletionConfig;
//! # use feedback_pulse::completion::create_completion;
//! let config = CompletionConfig::default(); // provider = "disabled"
//! let service = create_completion(&config).unwrap();
//! assert_eq!(service.model_name(), "disabled");
//! ```
//!
//! # Failure Policy
//!
//! Every client is single-shot: a non-success status or a network error is
//! returned to the caller immediately. Retrying is a caller decision.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use feedback_pulse_core::completion::CompletionService;

use crate::config::CompletionConfig;

const WORKERS_AI_BASE_URL: &str = "https://api.cloudflare.com/client/v4";
const WORKERS_AI_DEFAULT_MODEL: &str = "@cf/meta/llama-3.1-8b-instruct";
const WORKERS_AI_KEY_ENV: &str = "CLOUDFLARE_API_TOKEN";

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";

// ============ Disabled ============

/// A completion service that always fails.
///
/// Used when `completion.provider = "disabled"`. Listing and stats keep
/// working; analysis requests fail with an internal error.
pub struct DisabledCompletion;

#[async_trait]
impl CompletionService for DisabledCompletion {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
        bail!("Completion provider is disabled. Set [completion] provider in config.")
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

fn api_key(env_name: &str) -> Result<String> {
    std::env::var(env_name).with_context(|| format!("{} environment variable not set", env_name))
}

/// Send a JSON request and return the response body, failing on non-2xx.
async fn post_json(
    client: &reqwest::Client,
    url: &str,
    token: &str,
    body: &serde_json::Value,
) -> Result<serde_json::Value> {
    let response = client
        .post(url)
        .bearer_auth(token)
        .json(body)
        .send()
        .await
        .with_context(|| format!("completion request to {} failed", url))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("completion API error {}: {}", status, body_text);
    }

    Ok(response.json().await?)
}

// ============ Workers AI ============

/// Cloudflare Workers AI over its REST API.
///
/// Calls `POST {base}/accounts/{account_id}/ai/run/{model}` with a raw
/// `prompt`. The generated text is at `result.response`.
pub struct WorkersAiCompletion {
    client: reqwest::Client,
    url: String,
    model: String,
    token: String,
}

impl WorkersAiCompletion {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let account_id = config
            .account_id
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("completion.account_id required for workers-ai"))?;
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| WORKERS_AI_DEFAULT_MODEL.to_string());
        let base = config.base_url.as_deref().unwrap_or(WORKERS_AI_BASE_URL);
        let token = api_key(config.api_key_env.as_deref().unwrap_or(WORKERS_AI_KEY_ENV))?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            url: format!(
                "{}/accounts/{}/ai/run/{}",
                base.trim_end_matches('/'),
                account_id,
                model
            ),
            model,
            token,
        })
    }
}

fn parse_workers_ai_response(json: &serde_json::Value) -> Result<String> {
    if json.get("success").and_then(|s| s.as_bool()) == Some(false) {
        bail!("Workers AI reported failure: {}", json["errors"]);
    }
    json.pointer("/result/response")
        .and_then(|r| r.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid Workers AI response: missing result.response"))
}

#[async_trait]
impl CompletionService for WorkersAiCompletion {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let body = serde_json::json!({
            "prompt": prompt,
            "max_tokens": max_tokens,
        });
        let json = post_json(&self.client, &self.url, &self.token, &body).await?;
        parse_workers_ai_response(&json)
    }
}

// ============ OpenAI ============

/// OpenAI-compatible chat completions.
///
/// Sends the prompt as a single user message to
/// `POST {base}/v1/chat/completions`. The generated text is at
/// `choices[0].message.content`.
pub struct OpenAiCompletion {
    client: reqwest::Client,
    url: String,
    model: String,
    token: String,
}

impl OpenAiCompletion {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string());
        let base = config.base_url.as_deref().unwrap_or(OPENAI_BASE_URL);
        let token = api_key(config.api_key_env.as_deref().unwrap_or(OPENAI_KEY_ENV))?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            url: format!("{}/v1/chat/completions", base.trim_end_matches('/')),
            model,
            token,
        })
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": max_tokens,
        });
        let json = post_json(&self.client, &self.url, &self.token, &body).await?;
        parse_openai_response(&json)
    }
}

/// Create the [`CompletionService`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledCompletion`] |
/// | `"workers-ai"` | [`WorkersAiCompletion`] |
/// | `"openai"` | [`OpenAiCompletion`] |
pub fn create_completion(config: &CompletionConfig) -> Result<Box<dyn CompletionService>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledCompletion)),
        "workers-ai" => Ok(Box::new(WorkersAiCompletion::new(config)?)),
        "openai" => Ok(Box::new(OpenAiCompletion::new(config)?)),
        other => bail!("Unknown completion provider: {}", other),
    }
}
