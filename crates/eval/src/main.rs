//! Runs scenario files against the agent and grades the answers with a
//! judge model.

#[macro_use]
extern crate tracing;

mod compare;
mod judge;
mod report;
mod runner;
mod scenario;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context as _, Result};
use clap::Parser;
use owo_colors::OwoColorize;
use sidekick::{Config, SessionBuilder};
use sidekick_core::ModelClient;
use sidekick_ollama_model::{OllamaConfigBuilder, OllamaProvider};

use judge::Judge;
use scenario::{GroundTruth, load_scenarios};

/// Evaluates the agent against scenario files.
///
/// Models and the project root are configured through the same
/// `SIDEKICK_*` environment variables as the interactive CLI.
#[derive(Parser)]
#[command(name = "sidekick-eval")]
struct Cli {
    /// Directory containing `*.json` scenario files
    #[arg(long, default_value = "evaluations/scenarios")]
    scenarios: PathBuf,
    /// Directory containing `image-N-description.txt` ground truth files
    #[arg(long, default_value = "evaluations/images")]
    images: PathBuf,
    /// Write detailed results as JSON to this file
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to read configuration")?;

    println!("{}", "--- Starting Agent Evaluation ---".blue());
    let start = Instant::now();

    let files = load_scenarios(&cli.scenarios)?;
    let ground_truth = GroundTruth::load(&cli.images)?;

    let mut session = SessionBuilder::from_config(&config)
        .with_context(|| {
            format!("cannot open project root {}", config.root.display())
        })?
        .build()?;
    let judge = Judge::new(ModelClient::new(OllamaProvider::new(
        OllamaConfigBuilder::with_model(&config.model)
            .with_base_url(&config.ollama_url)
            .with_temperature(0.0)
            .build(),
    )));
    info!("loaded {} scenario file(s)", files.len());

    let report =
        runner::run_scenarios(&mut session, &judge, &ground_truth, &files)
            .await;

    println!("{}", "--- Evaluation Summary ---".blue());
    println!("{}", report.summary(start.elapsed()));

    if let Some(output) = &cli.output {
        report.write_json(output)?;
        println!("Results written to {}", output.display());
    }
    Ok(())
}
