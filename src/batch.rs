use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::instrument;

use crate::config::Config;
use crate::encoder::Encoder;
use crate::playlist::TrackRow;
use crate::processor::{ItemError, ItemOutcome, process_item};

/// Outcome of every row in a run, in row order.
#[derive(Debug)]
pub struct RunSummary {
    pub outcomes: Vec<ItemOutcome>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn transcoded(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Transcoded { .. }))
    }

    pub fn copied(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Copied { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Failed { .. }))
    }

    fn count(&self, predicate: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(o)).count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Whole milliseconds only
        let elapsed = Duration::from_millis(self.elapsed.as_millis() as u64);
        write!(
            f,
            "Processed {} rows in {}: {} transcoded, {} copied, {} not found, {} failed",
            self.total(),
            humantime::format_duration(elapsed),
            self.transcoded(),
            self.copied(),
            self.skipped(),
            self.failed()
        )
    }
}

/// Process every row with at most `config.workers` items in flight.
///
/// Waits for all rows. A failing or panicking item never stops its siblings.
#[instrument(skip_all, fields(rows = rows.len(), workers = config.workers))]
pub async fn run_batch(
    rows: Vec<TrackRow>,
    config: Arc<Config>,
    encoder: Arc<dyn Encoder>,
) -> RunSummary {
    let started = Instant::now();
    let semaphore = Arc::new(Semaphore::new(config.workers));
    let sources: Vec<PathBuf> = rows
        .iter()
        .map(|row| PathBuf::from(row.file_path.trim()))
        .collect();

    let tasks: Vec<_> = rows
        .into_iter()
        .map(|row| {
            let sem = semaphore.clone();
            let config = config.clone();
            let encoder = encoder.clone();
            tokio::spawn(async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    return ItemOutcome::Failed {
                        source: PathBuf::from(row.file_path.trim()),
                        error: ItemError::Worker {
                            reason: "worker pool closed".to_string(),
                        },
                    };
                };
                process_item(&row, &config, encoder.as_ref()).await
            })
        })
        .collect();

    let outcomes = join_all(tasks)
        .await
        .into_iter()
        .zip(sources)
        .map(|(joined, source)| match joined {
            Ok(outcome) => {
                if let Some(target) = outcome.target() {
                    tracing::debug!("Finished {}", target.display());
                }
                outcome
            }
            Err(e) => {
                tracing::error!("Worker for {} stopped: {}", source.display(), e);
                ItemOutcome::Failed {
                    source,
                    error: ItemError::Worker {
                        reason: e.to_string(),
                    },
                }
            }
        })
        .collect();

    RunSummary {
        outcomes,
        elapsed: started.elapsed(),
    }
}
