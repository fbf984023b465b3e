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

//! G-Eval: Criteria-based evaluation with LLM-as-judge
//!
//! Two judge calls per metric:
//! 1. The criteria are expanded into a short list of evaluation steps.
//! 2. The steps and the selected test-case fields are scored on a 0-10
//!    scale with a short reason.
//!
//! When the client returns token logprobs, the final score is the
//! probability-weighted mean over the candidate score tokens:
//! Score = Σ(i=0 to 10) i * P(i) / Σ(i=0 to 10) P(i)
//! and is then normalized to [0, 1].

use crate::judge::{JudgeCriteria, JudgeMetric};
use crate::llm_client::{LLMClient, LLMError, LLMResponse, TokenLogprob};
use async_trait::async_trait;
use chateval_core::{EvaluationInput, MetricResult};
use std::sync::Arc;
use std::time::Instant;

const SCORE_MAX: u8 = 10;

/// G-Eval judge metric over an [`LLMClient`]
pub struct GEval {
    llm_client: Arc<dyn LLMClient>,
    /// Enable probability normalization using token logprobs
    use_logprobs: bool,
    top_logprobs: usize,
    /// Candidate score tokens below this probability are ignored
    min_candidate_probability: f64,
}

impl GEval {
    pub fn new(llm_client: Arc<dyn LLMClient>) -> Self {
        Self {
            llm_client,
            use_logprobs: true,
            top_logprobs: 20,
            min_candidate_probability: 0.01,
        }
    }

    /// Enable or disable probability normalization (enabled by default)
    pub fn with_logprobs(mut self, enabled: bool) -> Self {
        self.use_logprobs = enabled;
        self
    }

    fn steps_prompt(criteria: &JudgeCriteria) -> String {
        format!(
            r#"Given an evaluation criteria which outlines how you should judge the {params}, generate 3-4 concise evaluation steps based on the criteria below. You MUST make it clear how to evaluate {params} in relation to one another.

Evaluation Criteria:
{criteria}

Respond in JSON format:
{{
  "steps": ["step 1", "step 2", ...]
}}
"#,
            params = criteria.params_description(),
            criteria = criteria.criteria
        )
    }

    fn evaluation_prompt(
        input: &EvaluationInput,
        criteria: &JudgeCriteria,
        steps: &[String],
    ) -> String {
        let steps_text = steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {}", i + 1, step))
            .collect::<Vec<_>>()
            .join("\n");

        let test_case = criteria
            .evaluation_params
            .iter()
            .map(|param| format!("{}:\n{}", param.label(), input.field(*param)))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            r#"You are an expert evaluator. Using the evaluation steps below, assess the test case and give a score from 0 to {max}, where {max} means the evaluation steps are fully satisfied and 0 means they are not satisfied at all.

Evaluation Steps:
{steps}

Test Case:
{test_case}

Parameters:
{params}

In the reason, mention specific strengths and weaknesses of the {params} without quoting the score itself.

Respond in JSON format:
{{
  "score": <integer 0-{max}>,
  "reason": "<explanation>"
}}
"#,
            max = SCORE_MAX,
            steps = steps_text,
            test_case = test_case,
            params = criteria.params_description()
        )
    }

    /// Ask the judge to turn the criteria into evaluation steps
    async fn generate_evaluation_steps(
        &self,
        criteria: &JudgeCriteria,
    ) -> Result<Vec<String>, LLMError> {
        let response = self
            .llm_client
            .evaluate(Self::steps_prompt(criteria))
            .await?;
        let json = response.as_json().map_err(|e| {
            LLMError::InvalidResponse(format!("Failed to parse evaluation steps: {}", e))
        })?;

        let steps: Vec<String> = json["steps"]
            .as_array()
            .ok_or_else(|| LLMError::InvalidResponse("Missing steps array".to_string()))?
            .iter()
            .filter_map(|s| s.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if steps.is_empty() {
            return Err(LLMError::InvalidResponse(
                "Judge returned no evaluation steps".to_string(),
            ));
        }
        Ok(steps)
    }

    /// Raw 0-10 score and reason from the judge's JSON answer
    fn parse_verdict(response: &LLMResponse) -> Result<(f64, String), LLMError> {
        let json = response
            .as_json()
            .map_err(|e| LLMError::InvalidResponse(format!("Failed to parse JSON: {}", e)))?;

        let score = json["score"]
            .as_f64()
            .ok_or_else(|| LLMError::InvalidResponse("Missing score".to_string()))?;
        if !(0.0..=SCORE_MAX as f64).contains(&score) {
            return Err(LLMError::InvalidResponse(format!(
                "Score {} outside 0-{}",
                score, SCORE_MAX
            )));
        }

        let reason = json["reason"]
            .as_str()
            .ok_or_else(|| LLMError::InvalidResponse("Missing reason".to_string()))?
            .to_string();

        Ok((score, reason))
    }

    /// Probability-weighted score from the alternatives of the value token
    /// that follows the `"score":` key
    ///
    /// Formula: S = Σ i * P(i) / Σ P(i), with P(i) = exp(logprob of token "i")
    fn probability_weighted_score(&self, logprobs: &[TokenLogprob]) -> Option<f64> {
        let key_end = score_key_end(logprobs)?;
        let score_token = logprobs[key_end..]
            .iter()
            .find(|t| parse_score_token(&t.token).is_some())?;

        let mut weighted_sum = 0.0;
        let mut total_prob = 0.0;
        for alt in &score_token.top_logprobs {
            if let Some(score) = parse_score_token(&alt.token) {
                let prob = alt.logprob.exp();
                if prob < self.min_candidate_probability {
                    continue;
                }
                weighted_sum += score as f64 * prob;
                total_prob += prob;
            }
        }

        if total_prob > 0.0 {
            Some(weighted_sum / total_prob)
        } else {
            None
        }
    }
}

/// Index just past the `score` key and its colon, if the judge emitted one
fn score_key_end(logprobs: &[TokenLogprob]) -> Option<usize> {
    logprobs.iter().enumerate().find_map(|(i, t)| {
        let key = t
            .token
            .trim_matches(|c: char| c == '"' || c == '{' || c == ',' || c.is_whitespace());
        if key != "score" && key != "score\":" {
            return None;
        }
        if key.ends_with(':') {
            return Some(i + 1);
        }
        logprobs
            .get(i + 1)
            .filter(|next| next.token.trim_start_matches('"').trim_start().starts_with(':'))
            .map(|_| i + 2)
    })
}

fn parse_score_token(token: &str) -> Option<u8> {
    token
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|score| *score <= SCORE_MAX)
}

#[async_trait]
impl JudgeMetric for GEval {
    fn id(&self) -> &str {
        "g_eval_v1"
    }

    async fn evaluate(
        &self,
        input: &EvaluationInput,
        criteria: &JudgeCriteria,
    ) -> Result<MetricResult, LLMError> {
        let start = Instant::now();

        let steps = self.generate_evaluation_steps(criteria).await?;
        tracing::debug!("{}: {} evaluation steps", criteria.name, steps.len());

        let prompt = Self::evaluation_prompt(input, criteria, &steps);
        let response = if self.use_logprobs {
            self.llm_client
                .evaluate_with_logprobs(prompt, self.top_logprobs)
                .await?
        } else {
            self.llm_client.evaluate(prompt).await?
        };

        let (raw_score, reason) = Self::parse_verdict(&response)?;
        let weighted = response
            .logprobs
            .as_deref()
            .filter(|_| self.use_logprobs)
            .and_then(|logprobs| self.probability_weighted_score(logprobs));

        let score = weighted.unwrap_or(raw_score) / SCORE_MAX as f64;

        tracing::debug!(
            "{}: raw score {}, probability weighted {:?}, judged by {} in {}ms",
            criteria.name,
            raw_score,
            weighted,
            self.llm_client.model_name(),
            start.elapsed().as_millis()
        );

        Ok(MetricResult::new(Some(score), reason))
    }
}
