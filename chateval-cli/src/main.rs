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

mod config;

use anyhow::{Context, Result};
use chateval_core::{ContextBundle, Conversation, RunOutput};
use chateval_evals::evaluators::{CostEstimator, GEval};
use chateval_evals::llm_client::OpenAIClient;
use chateval_evals::loader::{load_context_bundle, load_conversation};
use chateval_evals::{
    select_evaluation_turns, validate_evaluation_pair, EvaluationPipeline, JudgeCriteria,
};
use clap::Parser;
use config::EvalSettings;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chateval")]
#[command(about = "Score the last answer of a chat transcript with LLM judges", long_about = None)]
#[command(version)]
struct Cli {
    /// Conversation transcript JSON
    #[arg(long)]
    conversation: PathBuf,

    /// Retrieved context vectors JSON
    #[arg(long)]
    context: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Judge model (overrides config and CHATEVAL_JUDGE_MODEL)
    #[arg(long)]
    judge_model: Option<String>,

    /// Model priced for the cost estimate
    #[arg(long)]
    cost_model: Option<String>,

    /// Also write the result as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the result as JSON instead of the text report
    #[arg(long)]
    json: bool,

    /// Evaluate even if the transcript does not end with a user/assistant pair
    #[arg(long)]
    lenient_turn_order: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let started = Instant::now();
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let settings = resolve_settings(&cli)?;
    let (conversation, bundle) = load_inputs(&cli, &settings)?;

    let api_key = settings.api_key()?;

    tracing::debug!(
        "Judge model {} at {}, cost model {}",
        settings.judge.model,
        settings.judge.base_url,
        settings.cost.model
    );

    let client = OpenAIClient::new(api_key, settings.judge.model.clone())
        .with_base_url(settings.judge.base_url.clone())
        .with_timeout(settings.judge_timeout());
    let judge = GEval::new(Arc::new(client)).with_logprobs(settings.judge.use_logprobs);
    let pipeline = EvaluationPipeline::new(Arc::new(judge), settings.pipeline_config())
        .with_cost_estimator(CostEstimator::new(settings.pricing_table()?));

    let output = pipeline
        .run_started_at(&conversation, &bundle, started)
        .await
        .context("Evaluation failed")?;

    if let Some(path) = &cli.output {
        write_output(path, &output)?;
        tracing::info!("Wrote results to {:?}", path);
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", format_report(&output));
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Configuration file and environment, then command-line flags on top
fn resolve_settings(cli: &Cli) -> Result<EvalSettings> {
    let mut settings =
        EvalSettings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(model) = &cli.judge_model {
        settings.judge.model = model.clone();
    }
    if let Some(model) = &cli.cost_model {
        settings.cost.model = model.clone();
    }
    if cli.lenient_turn_order {
        settings.pipeline.strict_turn_order = false;
    }

    settings.validate()?;
    Ok(settings)
}

/// Load both documents and check the transcript has a turn to evaluate,
/// before any judge is configured
fn load_inputs(cli: &Cli, settings: &EvalSettings) -> Result<(Conversation, ContextBundle)> {
    let conversation =
        load_conversation(&cli.conversation).context("Failed to load conversation")?;
    let bundle = load_context_bundle(&cli.context).context("Failed to load context vectors")?;

    select_evaluation_turns(&conversation).context("Conversation cannot be evaluated")?;
    if settings.pipeline.strict_turn_order {
        validate_evaluation_pair(&conversation).context("Conversation cannot be evaluated")?;
    }

    Ok((conversation, bundle))
}

fn write_output(path: &Path, output: &RunOutput) -> Result<()> {
    let json = serde_json::to_string_pretty(output)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))
}

fn format_report(output: &RunOutput) -> String {
    let mut report = String::new();

    let metrics = [
        (
            JudgeCriteria::relevance_completeness().name,
            &output.response_relevance_completeness,
        ),
        (
            JudgeCriteria::hallucination_factual_accuracy().name,
            &output.hallucination_factual_accuracy,
        ),
    ];

    for (name, result) in metrics {
        let score = result
            .score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "n/a".to_string());
        let _ = writeln!(report, "{} score:  {}", name, score);
        let _ = writeln!(report, "{} reason for given score:  {}", name, result.reason);
    }

    let _ = writeln!(
        report,
        "Estimated cost: ${:.6} ({} prompt / {} completion tokens)",
        output.cost.estimated_cost_usd,
        output.cost.prompt_tokens_estimate,
        output.cost.completion_tokens_estimate
    );
    let _ = writeln!(report, "Latency: {:.2} ms", output.latency_ms);

    report
}
