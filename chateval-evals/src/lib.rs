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

//! # Chateval Evaluation Pipeline
//!
//! Scores the last assistant answer of a chat transcript against the
//! retrieved context using two LLM-as-judge metrics, and attaches a
//! word-count cost estimate and the run latency.
//!
//! ## Pipeline
//!
//! - **Loader**: reads the transcript and the context bundle from JSON
//! - **Context assembler**: builds the (query, answer, context) triple
//! - **Metric invoker**: runs the relevance and hallucination judges
//! - **Cost estimator**: word-count token proxy priced from a table
//! - **Result aggregator**: collects everything into a `RunOutput`
//!
//! ## Example
//!
//! ```rust,ignore
//! use chateval_evals::{EvaluationPipeline, PipelineConfig};
//! use chateval_evals::evaluators::GEval;
//! use chateval_evals::llm_client::OpenAIClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Arc::new(OpenAIClient::new(
//!         std::env::var("OPENAI_API_KEY").unwrap(),
//!         "gpt-4o".to_string(),
//!     ));
//!     let pipeline = EvaluationPipeline::new(Arc::new(GEval::new(client)), PipelineConfig::default());
//!     let output = pipeline
//!         .run_files("conversation.json".as_ref(), "context.json".as_ref())
//!         .await
//!         .unwrap();
//!     println!("{}", serde_json::to_string_pretty(&output).unwrap());
//! }
//! ```

use chateval_core::Role;
use std::path::PathBuf;
use thiserror::Error;

pub mod context;
pub mod evaluators;
pub mod judge;
pub mod llm_client;
pub mod loader;
pub mod pipeline;

pub use chateval_core::{
    ContextBundle, Conversation, ConversationTurn, CostEstimate, EvaluationInput,
    EvaluationParam, MetricResult, RunOutput,
};
pub use context::{
    build_context, build_evaluation_input, select_evaluation_turns, validate_evaluation_pair,
};
pub use judge::{JudgeCriteria, JudgeMetric};
pub use llm_client::LLMError;
pub use pipeline::{EvaluationPipeline, PipelineConfig};

/// Errors that abort an evaluation run
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Conversation has no {0} turn")]
    MissingTurn(Role),

    #[error("Unexpected turn order: {0}")]
    UnexpectedTurnOrder(String),

    #[error("Judge evaluation failed for {metric}: {source}")]
    JudgeEvaluation {
        metric: String,
        #[source]
        source: LLMError,
    },
}
