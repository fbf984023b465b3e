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

//! Cost estimation for an evaluated turn
//!
//! Token counts are approximated by whitespace-delimited word counts, not
//! by a real tokenizer, and priced from a [`PricingTable`].

use chateval_core::{round_to, CostEstimate, EvaluationInput, PricingTable};

/// Word-count cost estimator over an injectable pricing table
#[derive(Debug, Clone, Default)]
pub struct CostEstimator {
    pricing: PricingTable,
}

impl CostEstimator {
    pub fn new(pricing: PricingTable) -> Self {
        Self { pricing }
    }

    /// Token proxy: number of whitespace-separated words
    pub fn count_tokens(text: &str) -> u64 {
        text.split(is_word_separator)
            .filter(|word| !word.is_empty())
            .count() as u64
    }

    /// Prompt text used for the estimate: the query directly followed by
    /// the context entries joined with single spaces. This is not the
    /// prompt actually sent to the judge.
    pub fn prompt_text(input: &EvaluationInput) -> String {
        format!("{}{}", input.input, input.context.join(" "))
    }

    /// Estimate cost for `model`. Unknown models are priced as the table's
    /// default model. The cost is rounded to 6 decimal places.
    pub fn estimate(&self, prompt_text: &str, completion_text: &str, model: &str) -> CostEstimate {
        let pricing = self.pricing.resolve(model);

        let prompt_tokens = Self::count_tokens(prompt_text);
        let completion_tokens = Self::count_tokens(completion_text);
        let cost = pricing.calculate_cost(prompt_tokens, completion_tokens);

        CostEstimate {
            prompt_tokens_estimate: prompt_tokens,
            completion_tokens_estimate: completion_tokens,
            estimated_cost_usd: round_to(cost, 6),
        }
    }

    /// Estimate for an evaluation input: its prompt text against the answer
    pub fn estimate_for(&self, input: &EvaluationInput, model: &str) -> CostEstimate {
        self.estimate(&Self::prompt_text(input), &input.actual_output, model)
    }
}

/// Unicode whitespace plus the ASCII information separators (U+001C to
/// U+001F), which also delimit words in the counted transcripts.
fn is_word_separator(c: char) -> bool {
    c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chateval_core::ModelPricing;
    use proptest::prelude::*;

    #[test]
    fn test_gpt4_estimate() {
        let estimator = CostEstimator::default();
        let estimate = estimator.estimate("a b c", "d e", "gpt-4");

        assert_eq!(estimate.prompt_tokens_estimate, 3);
        assert_eq!(estimate.completion_tokens_estimate, 2);
        assert!((estimate.estimated_cost_usd - 0.00021).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_model_matches_default() {
        let estimator = CostEstimator::default();
        let unknown = estimator.estimate("some prompt words here", "an answer", "mystery-model");
        let default = estimator.estimate("some prompt words here", "an answer", "gpt-3.5-turbo");

        assert_eq!(unknown, default);
    }

    #[test]
    fn test_rounding_to_six_decimals() {
        let pricing = PricingTable::new("tiny", ModelPricing::per_token(0.000_001_234_5, 0.0));
        let estimator = CostEstimator::new(pricing);

        let estimate = estimator.estimate("word", "", "tiny");
        assert_eq!(estimate.completion_tokens_estimate, 0);
        assert!((estimate.estimated_cost_usd - 0.000001).abs() < 1e-12);
    }

    #[test]
    fn test_whitespace_runs_count_once() {
        assert_eq!(CostEstimator::count_tokens("  a\t\tb \n c  "), 3);
        assert_eq!(CostEstimator::count_tokens(""), 0);
        assert_eq!(CostEstimator::count_tokens("   \n\t"), 0);
    }

    #[test]
    fn test_information_separators_split_words() {
        assert_eq!(CostEstimator::count_tokens("a\u{1f}b\u{1c}c"), 3);
        assert_eq!(CostEstimator::count_tokens("\u{1d}\u{1e}"), 0);
        assert_eq!(CostEstimator::count_tokens("x\u{85}y\u{3000}z"), 3);
    }

    #[test]
    fn test_prompt_text_concatenation() {
        let input = EvaluationInput {
            input: "What is the capital of France?".to_string(),
            actual_output: "Paris".to_string(),
            context: vec!["CHAT HISTORY:\nuser: Hi".to_string()],
        };

        let prompt = CostEstimator::prompt_text(&input);
        assert_eq!(prompt, "What is the capital of France?CHAT HISTORY:\nuser: Hi");
        // "France?CHAT" is a single word
        assert_eq!(CostEstimator::count_tokens(&prompt), 9);
    }

    #[test]
    fn test_injected_pricing() {
        let pricing = PricingTable::new("local", ModelPricing::per_token(0.0, 0.0));
        let estimator = CostEstimator::new(pricing);

        let estimate = estimator.estimate("a b c", "d", "gpt-4");
        assert_eq!(estimate.estimated_cost_usd, 0.0);
        assert_eq!(estimate.prompt_tokens_estimate, 3);
    }

    proptest! {
        #[test]
        fn prop_estimate_is_deterministic(prompt in "\\PC{0,64}", completion in "\\PC{0,32}") {
            let estimator = CostEstimator::default();
            let first = estimator.estimate(&prompt, &completion, "gpt-4");
            let second = estimator.estimate(&prompt, &completion, "gpt-4");
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.prompt_tokens_estimate, prompt.split_whitespace().count() as u64);
        }
    }
}
