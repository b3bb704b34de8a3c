use std::path::{Path, PathBuf};

use filetime::FileTime;
use tracing::instrument;

use crate::config::Config;
use crate::encoder::{Encoder, EncoderError, TranscodeRequest};
use crate::naming::target_file_name;
use crate::paths::resolve_source_path;
use crate::playlist::TrackRow;

#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error(transparent)]
    Encoder(#[from] EncoderError),

    #[error("File system error during {operation} on {path}: {error_message}")]
    FileSystem {
        operation: String,
        path: String,
        error_message: String,
    },

    #[error("Worker stopped before finishing: {reason}")]
    Worker { reason: String },
}

/// What happened to a single row.
#[derive(Debug)]
pub enum ItemOutcome {
    Transcoded { source: PathBuf, target: PathBuf },
    Copied { source: PathBuf, target: PathBuf },
    /// The source file does not exist, or the row names none
    Skipped { source: PathBuf },
    Failed { source: PathBuf, error: ItemError },
}

impl ItemOutcome {
    pub fn target(&self) -> Option<&Path> {
        match self {
            ItemOutcome::Transcoded { target, .. } | ItemOutcome::Copied { target, .. } => {
                Some(target)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedItem {
    pub source: PathBuf,
    pub file_name: String,
    pub target: PathBuf,
}

pub fn resolve_item(row: &TrackRow, source: PathBuf, config: &Config) -> ResolvedItem {
    let file_name = target_file_name(row, &source, &config.transcode);
    let target = config.output_directory.join(&file_name);
    ResolvedItem {
        source,
        file_name,
        target,
    }
}

/// Copy or transcode one row into the output directory.
///
/// Never fails: every problem ends up in the returned outcome and the log.
#[instrument(skip_all, fields(title = %row.title.trim()))]
pub async fn process_item(row: &TrackRow, config: &Config, encoder: &dyn Encoder) -> ItemOutcome {
    if row.file_path.trim().is_empty() {
        tracing::warn!("File not found: row has no source path");
        return ItemOutcome::Skipped {
            source: PathBuf::new(),
        };
    }

    let source = resolve_source_path(&row.file_path, &config.path_substitution);
    if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
        tracing::warn!("File not found: {}", source.display());
        return ItemOutcome::Skipped { source };
    }

    let item = resolve_item(row, source, config);
    tracing::debug!("Target file name: {}", item.file_name);

    let result = if config.transcode.enabled {
        tracing::info!(
            "Converting: {} -> {}",
            item.source.display(),
            item.target.display()
        );
        let request = TranscodeRequest {
            source: item.source.clone(),
            target: item.target.clone(),
            preset: config.transcode.preset,
        };
        encoder
            .transcode(&request)
            .await
            .map_err(ItemError::from)
            .map(|()| ItemOutcome::Transcoded {
                source: item.source.clone(),
                target: item.target.clone(),
            })
    } else {
        tracing::info!(
            "Copying: {} -> {}",
            item.source.display(),
            item.target.display()
        );
        copy_preserving_times(&item.source, &item.target)
            .await
            .map(|()| ItemOutcome::Copied {
                source: item.source.clone(),
                target: item.target.clone(),
            })
    };

    match result {
        Ok(outcome) => outcome,
        Err(error) => {
            tracing::error!("Error processing {}: {}", item.source.display(), error);
            ItemOutcome::Failed {
                source: item.source,
                error,
            }
        }
    }
}

/// Copy file contents, then carry over access and modification times.
/// An existing file at `target` is overwritten.
async fn copy_preserving_times(source: &Path, target: &Path) -> Result<(), ItemError> {
    tokio::fs::copy(source, target)
        .await
        .map_err(|e| ItemError::FileSystem {
            operation: "copy file".to_string(),
            path: format!("{} -> {}", source.display(), target.display()),
            error_message: e.to_string(),
        })?;

    let metadata = tokio::fs::metadata(source)
        .await
        .map_err(|e| ItemError::FileSystem {
            operation: "read metadata".to_string(),
            path: source.display().to_string(),
            error_message: e.to_string(),
        })?;
    let accessed = FileTime::from_last_access_time(&metadata);
    let modified = FileTime::from_last_modification_time(&metadata);

    let stamped = target.to_path_buf();
    tokio::task::spawn_blocking(move || filetime::set_file_times(&stamped, accessed, modified))
        .await
        .map_err(|e| ItemError::Worker {
            reason: e.to_string(),
        })?
        .map_err(|e| ItemError::FileSystem {
            operation: "set file times".to_string(),
            path: target.display().to_string(),
            error_message: e.to_string(),
        })
}
