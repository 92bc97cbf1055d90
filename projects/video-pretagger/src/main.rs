mod cli;
mod error;
mod pipeline;
mod run_artifacts;
mod run_context;
#[cfg(test)]
mod test_support;
mod video;

use anyhow::Result;
use cli::Args;
use pipeline::orchestrator::run_pipeline;

fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args = Args::parse_args();

    let outcome = run_pipeline(&args.pipeline_config())?;
    if !outcome.report_written || !outcome.ledger_appended {
        tracing::warn!(
            "Pipeline finished with missing outputs (report: {}, ledger: {})",
            outcome.report_written,
            outcome.ledger_appended
        );
    }
    tracing::info!(
        "Pipeline finished after {} stages",
        outcome.metrics.stage_times.len()
    );

    Ok(())
}
