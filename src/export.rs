use std::sync::Arc;

use color_eyre::{Result, eyre::Context};

use crate::batch::{RunSummary, run_batch};
use crate::config::Config;
use crate::encoder::{Encoder, preflight};
use crate::playlist::read_rows;

/// Export a whole playlist: check the encoder, load the rows, then fan out.
///
/// Only the preflight, reading the export and creating the output directory
/// can fail the run. Per-row problems are reported in the summary.
pub async fn run(config: Arc<Config>, encoder: Arc<dyn Encoder>) -> Result<RunSummary> {
    preflight(encoder.as_ref()).await?;

    let rows = read_rows(&config.row_source)?;
    tracing::info!(
        "Loaded {} rows from {}",
        rows.len(),
        config.row_source.display()
    );

    tokio::fs::create_dir_all(&config.output_directory)
        .await
        .wrap_err_with(|| {
            format!(
                "Failed to create output directory: {}",
                config.output_directory.display()
            )
        })?;

    let summary = run_batch(rows, config, encoder).await;
    tracing::info!("{}", summary);

    Ok(summary)
}
