use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use color_eyre::{Result, eyre::Context};
use tokio::process::Command;

use crate::config::QualityPreset;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeRequest {
    pub source: PathBuf,
    pub target: PathBuf,
    pub preset: QualityPreset,
}

#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    #[error("Encoder `{binary}` not found in PATH: {reason}")]
    NotFound { binary: String, reason: String },

    #[error("Failed to launch encoder `{binary}`: {source}")]
    Launch {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Encoder exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

/// Port over the external audio encoder.
///
/// `FfmpegEncoder` is the production implementation; tests use the generated mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Encoder: Send + Sync {
    /// Query the encoder version. Succeeds only if the binary runs and exits cleanly.
    async fn version(&self) -> Result<String, EncoderError>;

    async fn transcode(&self, request: &TranscodeRequest) -> Result<(), EncoderError>;
}

/// Arguments for `ffmpeg -i <source> -y <quality> <target>`.
pub fn transcode_args(request: &TranscodeRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-i".into(), request.source.clone().into(), "-y".into()];
    args.extend(request.preset.encoder_args().into_iter().map(OsString::from));
    args.push(request.target.clone().into());
    args
}

#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    binary: PathBuf,
}

impl FfmpegEncoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn binary_name(&self) -> String {
        self.binary.display().to_string()
    }
}

#[async_trait::async_trait]
impl Encoder for FfmpegEncoder {
    async fn version(&self) -> Result<String, EncoderError> {
        let resolved = which::which(&self.binary).map_err(|e| EncoderError::NotFound {
            binary: self.binary_name(),
            reason: e.to_string(),
        })?;
        tracing::debug!("Encoder resolved to {}", resolved.display());

        let output = Command::new(&resolved)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| EncoderError::Launch {
                binary: self.binary_name(),
                source,
            })?;

        if !output.status.success() {
            return Err(EncoderError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string())
    }

    async fn transcode(&self, request: &TranscodeRequest) -> Result<(), EncoderError> {
        let output = Command::new(&self.binary)
            .args(transcode_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| EncoderError::Launch {
                binary: self.binary_name(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(EncoderError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// Make sure the encoder can run at all before any row is touched.
pub async fn preflight(encoder: &dyn Encoder) -> Result<String> {
    let version = encoder
        .version()
        .await
        .wrap_err("Encoder is not installed or not working correctly")?;
    tracing::info!("Encoder is installed and working: {}", version);
    Ok(version)
}
