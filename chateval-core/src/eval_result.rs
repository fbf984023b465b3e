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

//! Evaluation inputs and results
//!
//! `EvaluationInput` is what a judge sees; `RunOutput` is the single
//! structured result of one evaluation run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Test-case field a judge metric is allowed to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationParam {
    Input,
    ActualOutput,
    Context,
}

impl EvaluationParam {
    /// Label used when presenting the field to a judge model
    pub fn label(&self) -> &'static str {
        match self {
            EvaluationParam::Input => "Input",
            EvaluationParam::ActualOutput => "Actual Output",
            EvaluationParam::Context => "Context",
        }
    }
}

impl fmt::Display for EvaluationParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The (query, answer, context) triple handed to the judge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationInput {
    /// Last user message
    pub input: String,

    /// Last assistant message
    pub actual_output: String,

    /// Chat history plus retrieved text, as a single element
    pub context: Vec<String>,
}

impl EvaluationInput {
    /// Text of a single field. Context entries are joined with blank lines.
    pub fn field(&self, param: EvaluationParam) -> String {
        match param {
            EvaluationParam::Input => self.input.clone(),
            EvaluationParam::ActualOutput => self.actual_output.clone(),
            EvaluationParam::Context => self.context.join("\n\n"),
        }
    }
}

/// Score and justification produced by one judge metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    /// Normalized score in [0, 1]; `None` when the judge produced no score
    pub score: Option<f64>,
    pub reason: String,
}

impl MetricResult {
    pub fn new(score: Option<f64>, reason: impl Into<String>) -> Self {
        Self {
            score,
            reason: reason.into(),
        }
    }
}

/// Word-count based cost approximation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub prompt_tokens_estimate: u64,
    pub completion_tokens_estimate: u64,
    pub estimated_cost_usd: f64,
}

/// Everything one run produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub response_relevance_completeness: MetricResult,
    pub hallucination_factual_accuracy: MetricResult,
    pub cost: CostEstimate,
    pub latency_ms: f64,
}

impl RunOutput {
    /// Assemble the run result. `elapsed` is wall-clock time since the run started.
    pub fn assemble(
        response_relevance_completeness: MetricResult,
        hallucination_factual_accuracy: MetricResult,
        cost: CostEstimate,
        elapsed: Duration,
    ) -> Self {
        Self {
            response_relevance_completeness,
            hallucination_factual_accuracy,
            cost,
            latency_ms: round_to(elapsed.as_secs_f64() * 1000.0, 2),
        }
    }
}

/// Round to `decimals` places, ties to even.
///
/// Ties are detected on the scaled value `value * 10^decimals`, not on the
/// exact binary value of `value`, so a result can differ by one unit in the
/// last place from an exact decimal rounding when the scaling itself rounds
/// onto or off a half.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}
