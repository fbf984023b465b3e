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

//! Model pricing table
//!
//! Per-token prices keyed by model name, with a guaranteed default entry:
//! - Builtin prices for the models the estimator knows about
//! - TOML overrides layered on top (custom > builtin)
//! - Unknown model names resolve to the default model, never to an error

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Model used when a requested model has no entry
pub const DEFAULT_PRICING_MODEL: &str = "gpt-3.5-turbo";

/// Per-token prices in USD
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Cost per prompt token in USD
    pub prompt_per_token: f64,
    /// Cost per completion token in USD
    pub completion_per_token: f64,
    /// Where this entry came from
    #[serde(default)]
    pub priority: PricingPriority,
}

impl ModelPricing {
    pub fn per_token(prompt_per_token: f64, completion_per_token: f64) -> Self {
        Self {
            prompt_per_token,
            completion_per_token,
            priority: PricingPriority::Builtin,
        }
    }

    /// Build from prices quoted per 1K tokens
    pub fn per_1k(prompt_per_1k: f64, completion_per_1k: f64) -> Self {
        Self::per_token(prompt_per_1k / 1000.0, completion_per_1k / 1000.0)
    }

    /// Calculate the cost for given token counts
    pub fn calculate_cost(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        (prompt_tokens as f64 * self.prompt_per_token)
            + (completion_tokens as f64 * self.completion_per_token)
    }

    fn validate(&self, model: &str) -> Result<(), PricingError> {
        let valid = |p: f64| p.is_finite() && p >= 0.0;
        if !valid(self.prompt_per_token) || !valid(self.completion_per_token) {
            return Err(PricingError::Invalid(format!(
                "prices for {} must be finite and non-negative",
                model
            )));
        }
        Ok(())
    }
}

/// Priority level for pricing data
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum PricingPriority {
    /// Built into the application (lowest priority)
    #[default]
    Builtin = 0,
    /// User-defined custom pricing (highest priority)
    Custom = 1,
}

/// Custom pricing override as written in configuration (prices per 1K tokens)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingOverride {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

/// `[pricing]` section of a configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Model used for unknown names (defaults to gpt-3.5-turbo)
    #[serde(default)]
    pub default_model: Option<String>,

    #[serde(default)]
    pub models: HashMap<String, PricingOverride>,
}

/// Injectable model-name to price mapping
#[derive(Debug, Clone, PartialEq)]
pub struct PricingTable {
    models: HashMap<String, ModelPricing>,
    default_model: String,
}

impl PricingTable {
    /// Create a table holding only the default model
    pub fn new(default_model: impl Into<String>, default_pricing: ModelPricing) -> Self {
        let default_model = default_model.into();
        let mut models = HashMap::new();
        models.insert(default_model.clone(), default_pricing);
        Self {
            models,
            default_model,
        }
    }

    /// Table with builtin prices (USD per 1K tokens)
    pub fn with_builtins() -> Self {
        let mut table = Self::new(DEFAULT_PRICING_MODEL, ModelPricing::per_1k(0.0015, 0.002));
        table
            .models
            .insert("gpt-4".to_string(), ModelPricing::per_1k(0.03, 0.06));
        table
    }

    /// Builtins with configuration overrides applied
    pub fn from_config(config: &PricingConfig) -> Result<Self, PricingError> {
        let mut table = Self::with_builtins();
        table.apply_config(config)?;
        Ok(table)
    }

    /// Merge custom prices and an optional default model into this table
    pub fn apply_config(&mut self, config: &PricingConfig) -> Result<(), PricingError> {
        for (model, override_data) in &config.models {
            let pricing = ModelPricing {
                priority: PricingPriority::Custom,
                ..ModelPricing::per_1k(override_data.prompt_per_1k, override_data.completion_per_1k)
            };
            self.insert(model.clone(), pricing)?;
        }

        if let Some(default_model) = &config.default_model {
            self.set_default_model(default_model)?;
        }

        Ok(())
    }

    /// Load a standalone pricing TOML file
    ///
    /// ```toml
    /// [models."gpt-4o"]
    /// prompt_per_1k = 0.0025
    /// completion_per_1k = 0.01
    /// ```
    pub fn from_toml_file(path: &Path) -> Result<Self, PricingError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| PricingError::Io(e.to_string()))?;
        let config: PricingConfig =
            toml::from_str(&content).map_err(|e| PricingError::Parse(e.to_string()))?;
        Self::from_config(&config)
    }

    /// Add or replace an entry
    pub fn insert(&mut self, model: String, pricing: ModelPricing) -> Result<(), PricingError> {
        pricing.validate(&model)?;
        if let Some(existing) = self.models.get(&model) {
            if existing.priority > pricing.priority {
                tracing::debug!("Keeping higher-priority pricing for {}", model);
                return Ok(());
            }
        }
        self.models.insert(model, pricing);
        Ok(())
    }

    /// Switch the fallback model. It must already have an entry.
    pub fn set_default_model(&mut self, model: &str) -> Result<(), PricingError> {
        if !self.models.contains_key(model) {
            return Err(PricingError::NotFound(model.to_string()));
        }
        self.default_model = model.to_string();
        Ok(())
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Exact-name lookup without fallback
    pub fn get(&self, model: &str) -> Option<&ModelPricing> {
        self.models.get(model)
    }

    pub fn contains(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }

    /// Pricing for `model`, or the default model's pricing when unknown
    pub fn resolve(&self, model: &str) -> ModelPricing {
        match self.models.get(model) {
            Some(pricing) => *pricing,
            None => {
                tracing::warn!(
                    "No pricing for model {}, using {}",
                    model,
                    self.default_model
                );
                self.default_pricing()
            }
        }
    }

    fn default_pricing(&self) -> ModelPricing {
        // The default entry is inserted on construction and can never be removed.
        self.models
            .get(&self.default_model)
            .copied()
            .unwrap_or_else(|| ModelPricing::per_1k(0.0015, 0.002))
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Errors that can occur while building a pricing table
#[derive(Debug, Clone, thiserror::Error)]
pub enum PricingError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("No pricing for default model: {0}")]
    NotFound(String),

    #[error("Invalid data: {0}")]
    Invalid(String),
}
