// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use chateval_core::{PricingConfig, PricingTable, RetryPolicy, DEFAULT_PRICING_MODEL};
use chateval_evals::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Chateval configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EvalSettings {
    #[serde(default)]
    pub judge: JudgeConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub cost: CostConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub pipeline: PipelineSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JudgeConfig {
    /// Judge model name (e.g., "gpt-4o")
    #[serde(default = "default_judge_model")]
    pub model: String,

    /// OpenAI-compatible API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key; prefer the OPENAI_API_KEY environment variable
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Weight scores by token log probabilities when available
    #[serde(default = "default_use_logprobs")]
    pub use_logprobs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Total attempts per judge call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CostConfig {
    /// Model whose prices are used for the cost estimate
    #[serde(default = "default_cost_model")]
    pub model: String,

    /// Standalone pricing TOML used in place of the built-in prices
    #[serde(default)]
    pub pricing_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineSection {
    /// Require the transcript to end with a user turn then an assistant turn
    #[serde(default = "default_strict_turn_order")]
    pub strict_turn_order: bool,
}

// Default values
fn default_judge_model() -> String {
    "gpt-4o".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_use_logprobs() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_cost_model() -> String {
    DEFAULT_PRICING_MODEL.to_string()
}

fn default_strict_turn_order() -> bool {
    true
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            model: default_judge_model(),
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            use_logprobs: default_use_logprobs(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            model: default_cost_model(),
            pricing_file: None,
        }
    }
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            strict_turn_order: default_strict_turn_order(),
        }
    }
}

impl EvalSettings {
    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(settings)
    }

    /// Load configuration with priority: env > file > defaults
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut settings = match config_file {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {:?}", path);
                }
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(path)?
            }
            None => Self::default(),
        };

        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Override with environment variables
    ///
    /// Supported environment variables:
    /// - OPENAI_API_KEY: Judge API key
    /// - OPENAI_BASE_URL: Judge API base URL
    /// - CHATEVAL_JUDGE_MODEL: Judge model name
    /// - CHATEVAL_JUDGE_TIMEOUT: Judge request timeout in seconds
    /// - CHATEVAL_COST_MODEL: Model used for the cost estimate
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.judge.api_key = Some(key);
        }

        if let Some(base_url) = lookup("OPENAI_BASE_URL") {
            self.judge.base_url = base_url;
        }

        if let Some(model) = lookup("CHATEVAL_JUDGE_MODEL") {
            self.judge.model = model;
        }

        if let Some(timeout) = lookup("CHATEVAL_JUDGE_TIMEOUT") {
            match timeout.parse() {
                Ok(val) => self.judge.timeout_secs = val,
                Err(_) => tracing::warn!("Ignoring invalid CHATEVAL_JUDGE_TIMEOUT: {}", timeout),
            }
        }

        if let Some(model) = lookup("CHATEVAL_COST_MODEL") {
            self.cost.model = model;
        }
    }

    /// Judge API key, required once a judge is constructed
    pub fn api_key(&self) -> Result<String> {
        self.judge
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .context("No judge API key configured; set OPENAI_API_KEY or [judge].api_key")
    }

    pub fn judge_timeout(&self) -> Duration {
        Duration::from_secs(self.judge.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential()
            .with_max_attempts(self.retry.max_attempts)
            .with_delays(
                Duration::from_millis(self.retry.initial_delay_ms),
                Duration::from_millis(self.retry.max_delay_ms),
            )
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            cost_model: self.cost.model.clone(),
            strict_turn_order: self.pipeline.strict_turn_order,
            retry: self.retry_policy(),
        }
    }

    /// Built-in or file-based prices, then the `[pricing]` overrides on top
    pub fn pricing_table(&self) -> Result<PricingTable> {
        let mut table = match &self.cost.pricing_file {
            Some(path) => PricingTable::from_toml_file(path)
                .with_context(|| format!("Failed to load pricing file {:?}", path))?,
            None => PricingTable::with_builtins(),
        };
        table
            .apply_config(&self.pricing)
            .context("Invalid pricing configuration")?;
        Ok(table)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.judge.model.trim().is_empty() {
            anyhow::bail!("Judge model must not be empty");
        }
        if self.judge.timeout_secs == 0 {
            anyhow::bail!("Judge timeout must be at least 1 second");
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("Retry max_attempts must be at least 1");
        }
        self.pricing_table()?;
        Ok(())
    }
}
