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

//! Chateval Core
//!
//! Data structures shared by the evaluation pipeline: conversation
//! transcripts, retrieved context, judge inputs and results, model
//! pricing and retry policy.

pub mod conversation;
pub mod eval_result;
pub mod model_pricing;
pub mod resilience;

pub use conversation::{
    ContextBundle, ContextData, ContextVectorItem, Conversation, ConversationTurn, Role,
};
pub use eval_result::{
    round_to, CostEstimate, EvaluationInput, EvaluationParam, MetricResult, RunOutput,
};
pub use model_pricing::{
    ModelPricing, PricingConfig, PricingError, PricingOverride, PricingPriority, PricingTable,
    DEFAULT_PRICING_MODEL,
};
pub use resilience::RetryPolicy;
