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

//! Judge metric seam
//!
//! A judge metric scores an [`EvaluationInput`] against natural-language
//! criteria, reading only the fields listed in the criteria's evaluation
//! parameters.

use crate::llm_client::LLMError;
use async_trait::async_trait;
use chateval_core::{EvaluationInput, EvaluationParam, MetricResult};
use serde::{Deserialize, Serialize};

/// What a judge metric is asked to assess
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeCriteria {
    /// Display name, e.g. "Response Relevance & Completeness"
    pub name: String,
    pub criteria: String,
    /// Test-case fields the judge may read
    pub evaluation_params: Vec<EvaluationParam>,
}

impl JudgeCriteria {
    pub fn new(
        name: impl Into<String>,
        criteria: impl Into<String>,
        evaluation_params: Vec<EvaluationParam>,
    ) -> Self {
        Self {
            name: name.into(),
            criteria: criteria.into(),
            evaluation_params,
        }
    }

    /// Does the answer address the query and cover what the context supports?
    pub fn relevance_completeness() -> Self {
        Self::new(
            "Response Relevance & Completeness",
            "Evaluate whether the response directly answers the query and \
             covers all information supported by the given context.",
            vec![
                EvaluationParam::Input,
                EvaluationParam::ActualOutput,
                EvaluationParam::Context,
            ],
        )
    }

    /// Does the answer make claims the context does not support?
    pub fn hallucination_factual_accuracy() -> Self {
        Self::new(
            "Hallucination / Factual Accuracy",
            "Evaluate whether the assistant\u{2019}s response contains any factual claims \
             that are not supported by or are contradicted by the provided context.",
            vec![EvaluationParam::ActualOutput, EvaluationParam::Context],
        )
    }

    /// Comma-separated labels of the evaluation parameters, e.g. "Input, Actual Output, and Context"
    pub fn params_description(&self) -> String {
        let labels: Vec<&str> = self.evaluation_params.iter().map(|p| p.label()).collect();
        match labels.as_slice() {
            [] => String::new(),
            [only] => only.to_string(),
            [first, second] => format!("{} and {}", first, second),
            [rest @ .., last] => format!("{}, and {}", rest.join(", "), last),
        }
    }
}

/// External judge capability: given a test case and criteria, return a
/// score and a reason
#[async_trait]
pub trait JudgeMetric: Send + Sync {
    /// Identifier of the judging method (e.g. "g_eval_v1")
    fn id(&self) -> &str;

    async fn evaluate(
        &self,
        input: &EvaluationInput,
        criteria: &JudgeCriteria,
    ) -> Result<MetricResult, LLMError>;
}
