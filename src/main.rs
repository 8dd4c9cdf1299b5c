//! Training entry point. Offline batch operation: load the dataset, fit
//! the pipeline, report held-out metrics, persist the artifact. This is
//! the only binary allowed to terminate the process on failure.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crop_yield_predictor::{dataset, pipeline, schema, DEFAULT_DATA_PATH, DEFAULT_MODEL_PATH};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let csv_path = args.next().unwrap_or_else(|| DEFAULT_DATA_PATH.to_string());
    let model_path = args.next().unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string());

    info!(%csv_path, "loading training dataset");
    let df = dataset::load(&csv_path).context("loading training dataset")?;
    info!(rows = df.height(), columns = df.width(), "dataset loaded");

    let trained = pipeline::train(&df, schema::TARGET).context("fitting pipeline")?;
    info!(
        mse = trained.report.mse,
        r2 = trained.report.r2,
        "training complete"
    );

    trained
        .pipeline
        .save(&model_path)
        .context("persisting model artifact")?;
    info!(%model_path, "model artifact written");
    Ok(())
}
