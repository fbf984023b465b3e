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

//! Evaluation pipeline
//!
//! Loader -> context assembler -> metric invoker (x2) -> cost estimator ->
//! result aggregator. Any failure aborts the run; a judge error is never
//! replaced by a default score.

use crate::context::build_evaluation_input;
use crate::evaluators::CostEstimator;
use crate::judge::{JudgeCriteria, JudgeMetric};
use crate::llm_client::LLMError;
use crate::loader::{load_context_bundle, load_conversation};
use crate::EvalError;
use chateval_core::{
    ContextBundle, Conversation, EvaluationInput, MetricResult, RetryPolicy, RunOutput,
    DEFAULT_PRICING_MODEL,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Configuration for an evaluation run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Model whose prices are used for the cost estimate
    pub cost_model: String,

    /// Require the transcript to end with a user turn followed by an
    /// assistant turn before building the context
    pub strict_turn_order: bool,

    /// Retry policy for each judge invocation
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cost_model: DEFAULT_PRICING_MODEL.to_string(),
            strict_turn_order: true,
            retry: RetryPolicy::exponential(),
        }
    }
}

/// Runs both judge metrics over one conversation turn
pub struct EvaluationPipeline {
    judge: Arc<dyn JudgeMetric>,
    cost_estimator: CostEstimator,
    relevance: JudgeCriteria,
    hallucination: JudgeCriteria,
    config: PipelineConfig,
}

impl EvaluationPipeline {
    pub fn new(judge: Arc<dyn JudgeMetric>, config: PipelineConfig) -> Self {
        Self {
            judge,
            cost_estimator: CostEstimator::default(),
            relevance: JudgeCriteria::relevance_completeness(),
            hallucination: JudgeCriteria::hallucination_factual_accuracy(),
            config,
        }
    }

    /// Use a custom pricing table for the cost estimate
    pub fn with_cost_estimator(mut self, cost_estimator: CostEstimator) -> Self {
        self.cost_estimator = cost_estimator;
        self
    }

    /// Build the judge input without calling any judge
    pub fn prepare(
        &self,
        conversation: &Conversation,
        bundle: &ContextBundle,
    ) -> Result<EvaluationInput, EvalError> {
        build_evaluation_input(conversation, bundle, self.config.strict_turn_order)
    }

    /// Load both documents and evaluate. Latency includes loading.
    pub async fn run_files(
        &self,
        conversation_path: &Path,
        context_path: &Path,
    ) -> Result<RunOutput, EvalError> {
        let started = Instant::now();
        let conversation = load_conversation(conversation_path)?;
        let bundle = load_context_bundle(context_path)?;
        self.run_started_at(&conversation, &bundle, started).await
    }

    pub async fn run(
        &self,
        conversation: &Conversation,
        bundle: &ContextBundle,
    ) -> Result<RunOutput, EvalError> {
        self.run_started_at(conversation, bundle, Instant::now())
            .await
    }

    /// Evaluate, measuring latency from `started`
    pub async fn run_started_at(
        &self,
        conversation: &Conversation,
        bundle: &ContextBundle,
        started: Instant,
    ) -> Result<RunOutput, EvalError> {
        let input = self.prepare(conversation, bundle)?;

        // Both metrics are independent; results stay bound to their metric.
        let (relevance, hallucination) = tokio::try_join!(
            self.invoke(&input, &self.relevance),
            self.invoke(&input, &self.hallucination)
        )?;

        let cost = self
            .cost_estimator
            .estimate_for(&input, &self.config.cost_model);
        tracing::debug!(
            "Estimated {} prompt / {} completion tokens, ${:.6}",
            cost.prompt_tokens_estimate,
            cost.completion_tokens_estimate,
            cost.estimated_cost_usd
        );

        Ok(RunOutput::assemble(
            relevance,
            hallucination,
            cost,
            started.elapsed(),
        ))
    }

    async fn invoke(
        &self,
        input: &EvaluationInput,
        criteria: &JudgeCriteria,
    ) -> Result<MetricResult, EvalError> {
        let result = self
            .config
            .retry
            .run(
                || self.judge.evaluate(input, criteria),
                LLMError::is_retryable,
            )
            .await
            .map_err(|source| EvalError::JudgeEvaluation {
                metric: criteria.name.clone(),
                source,
            })?;

        tracing::info!(
            "{} score: {:?} ({})",
            criteria.name,
            result.score,
            self.judge.id()
        );
        Ok(result)
    }
}
