use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use feedback_pulse_core::analysis::DEFAULT_MAX_TOKENS;
use feedback_pulse_core::batch::DEFAULT_BATCH_SIZE;
use feedback_pulse_core::filter::{PageLimits, DEFAULT_LIMIT, MAX_LIMIT};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Directory of built frontend assets served for non-API paths.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    #[serde(default = "default_max_limit")]
    pub max_limit: i64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }
}

impl QueryConfig {
    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_limit: self.default_limit,
            max_limit: self.max_limit,
        }
    }
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}
fn default_max_limit() -> i64 {
    MAX_LIMIT
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Override the provider's API base URL (proxies, local gateways).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Cloudflare account that owns the Workers AI binding.
    #[serde(default)]
    pub account_id: Option<String>,
    /// Environment variable holding the bearer token.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            base_url: None,
            account_id: None,
            api_key_env: None,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

impl CompletionConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate query
    if config.query.max_limit < 1 {
        anyhow::bail!("query.max_limit must be >= 1");
    }
    if config.query.default_limit < 1 || config.query.default_limit > config.query.max_limit {
        anyhow::bail!("query.default_limit must be in [1, query.max_limit]");
    }

    // Validate analysis
    if config.analysis.batch_size == 0 {
        anyhow::bail!("analysis.batch_size must be > 0");
    }
    if config.analysis.max_tokens == 0 {
        anyhow::bail!("analysis.max_tokens must be > 0");
    }

    // Validate completion
    match config.completion.provider.as_str() {
        "disabled" | "openai" => {}
        "workers-ai" => {
            if config.completion.account_id.is_none() {
                anyhow::bail!("completion.account_id must be specified when provider is 'workers-ai'");
            }
        }
        other => anyhow::bail!(
            "Unknown completion provider: '{}'. Must be disabled, workers-ai, or openai.",
            other
        ),
    }

    Ok(())
}
