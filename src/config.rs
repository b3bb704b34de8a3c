use std::fmt;
use std::path::{Path, PathBuf};

use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use serde::{Deserialize, Serialize};

const CONFIG_DIR_NAME: &str = "playlist-export";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Upper bound for `workers`; each worker holds one semaphore permit.
pub const MAX_WORKERS: usize = tokio::sync::Semaphore::MAX_PERMITS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pipe-delimited playlist export to read
    pub row_source: PathBuf,
    /// Flat directory receiving the renamed files
    pub output_directory: PathBuf,
    /// Number of items processed in parallel
    pub workers: usize,
    /// Encoder binary, resolved on PATH when not absolute
    pub encoder: PathBuf,
    pub path_substitution: PathSubstitution,
    pub transcode: TranscodeConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSubstitution {
    pub enabled: bool,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    pub enabled: bool,
    pub preset: QualityPreset,
}

/// LAME-style quality presets understood by the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum QualityPreset {
    #[default]
    #[serde(rename = "v0")]
    #[value(name = "v0")]
    V0,
    #[serde(rename = "v2")]
    #[value(name = "v2")]
    V2,
    #[serde(rename = "320")]
    #[value(name = "320")]
    Cbr320,
}

impl QualityPreset {
    pub fn name(self) -> &'static str {
        match self {
            QualityPreset::V0 => "v0",
            QualityPreset::V2 => "v2",
            QualityPreset::Cbr320 => "320",
        }
    }

    /// Label written into the `[codec]` part of transcoded file names.
    pub fn codec_label(self) -> String {
        format!("MP3 {}", self.name().to_uppercase())
    }

    /// Quality arguments passed to ffmpeg's mp3 encoder.
    pub fn encoder_args(self) -> [&'static str; 2] {
        match self {
            QualityPreset::V0 => ["-q:a", "0"],
            QualityPreset::V2 => ["-q:a", "2"],
            QualityPreset::Cbr320 => ["-b:a", "320k"],
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            row_source: PathBuf::from("plex.csv"),
            output_directory: PathBuf::from("./out-new/"),
            workers: 10,
            encoder: PathBuf::from("ffmpeg"),
            path_substitution: PathSubstitution::default(),
            transcode: TranscodeConfig::default(),
        }
    }
}

impl Default for PathSubstitution {
    fn default() -> Self {
        Self {
            enabled: true,
            from: "/music/".to_string(),
            to: "V:/music/".to_string(),
        }
    }
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            preset: QualityPreset::default(),
        }
    }
}

/// Values given on the command line; each one wins over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub row_source: Option<PathBuf>,
    pub output_directory: Option<PathBuf>,
    pub workers: Option<usize>,
    pub encoder: Option<PathBuf>,
    pub preset: Option<QualityPreset>,
    pub no_transcode: bool,
    pub no_path_substitution: bool,
    pub substitute_from: Option<String>,
    pub substitute_to: Option<String>,
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Default config file location
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load the default config file, falling back to built-in defaults when it is absent
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write the default config file unless one already exists
    pub fn create_default() -> Result<PathBuf> {
        let path = Self::config_path().ok_or_else(|| eyre!("No config directory on this platform"))?;
        if path.exists() {
            tracing::info!("Config file already exists at {}", path.display());
            return Ok(path);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents =
            toml::to_string_pretty(&Self::default()).wrap_err("Failed to serialize default config")?;
        std::fs::write(&path, contents)
            .wrap_err_with(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(path)
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(row_source) = overrides.row_source {
            self.row_source = row_source;
        }
        if let Some(output_directory) = overrides.output_directory {
            self.output_directory = output_directory;
        }
        if let Some(workers) = overrides.workers {
            self.workers = workers;
        }
        if let Some(encoder) = overrides.encoder {
            self.encoder = encoder;
        }
        if let Some(preset) = overrides.preset {
            self.transcode.preset = preset;
        }
        if overrides.no_transcode {
            self.transcode.enabled = false;
        }
        if overrides.no_path_substitution {
            self.path_substitution.enabled = false;
        }
        if let Some(from) = overrides.substitute_from {
            self.path_substitution.from = from;
        }
        if let Some(to) = overrides.substitute_to {
            self.path_substitution.to = to;
        }
        self
    }

    /// Expand `~/` in the configured paths and reject unusable values
    pub fn finalize(mut self) -> Result<Self> {
        self.row_source = expand_path(&self.row_source);
        self.output_directory = expand_path(&self.output_directory);
        self.encoder = expand_path(&self.encoder);
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(eyre!("workers must be at least 1"));
        }
        if self.workers > MAX_WORKERS {
            return Err(eyre!("workers must be at most {}", MAX_WORKERS));
        }
        if self.path_substitution.enabled && self.path_substitution.from.is_empty() {
            tracing::warn!("Path substitution is enabled with an empty `from`; paths stay unchanged");
        }
        Ok(())
    }
}

/// Expand ~ to home directory
fn expand_path(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.workers, 10);
        assert_eq!(config.row_source, PathBuf::from("plex.csv"));
        assert!(config.transcode.enabled);
        assert_eq!(config.transcode.preset, QualityPreset::V0);
        assert_eq!(config.path_substitution.from, "/music/");
        assert_eq!(config.path_substitution.to, "V:/music/");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            workers = 4

            [transcode]
            preset = "320"
            "#,
        )
        .unwrap();

        assert_eq!(config.workers, 4);
        assert_eq!(config.transcode.preset, QualityPreset::Cbr320);
        assert!(config.transcode.enabled);
        assert_eq!(config.output_directory, PathBuf::from("./out-new/"));
    }

    #[test]
    fn test_unknown_preset_rejected() {
        let result: Result<Config, _> = toml::from_str(
            r#"
            [transcode]
            preset = "v9"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            row_source = "export.csv"

            [path_substitution]
            enabled = false
            "#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.row_source, PathBuf::from("export.csv"));
        assert!(!config.path_substitution.enabled);
        assert_eq!(config.path_substitution.from, "/music/");
    }

    #[test]
    fn test_from_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::from_file(&dir.path().join("nope.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides_win() {
        let config = Config::default().with_overrides(Overrides {
            workers: Some(2),
            preset: Some(QualityPreset::V2),
            no_transcode: true,
            substitute_to: Some("/mnt/music/".to_string()),
            ..Default::default()
        });

        assert_eq!(config.workers, 2);
        assert_eq!(config.transcode.preset, QualityPreset::V2);
        assert!(!config.transcode.enabled);
        assert_eq!(config.path_substitution.to, "/mnt/music/");
        assert_eq!(config.path_substitution.from, "/music/");
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = Config {
            workers: 0,
            ..Default::default()
        };
        assert!(config.finalize().is_err());
    }

    #[test]
    fn test_workers_above_permit_limit_rejected() {
        let config: Config = toml::from_str(&format!("workers = {}", MAX_WORKERS as u64 + 1)).unwrap();
        let error = config.finalize().unwrap_err();
        assert!(error.to_string().contains("at most"));

        let config = Config {
            workers: MAX_WORKERS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_preset_mapping() {
        assert_eq!(QualityPreset::V0.encoder_args(), ["-q:a", "0"]);
        assert_eq!(QualityPreset::V2.encoder_args(), ["-q:a", "2"]);
        assert_eq!(QualityPreset::Cbr320.encoder_args(), ["-b:a", "320k"]);
        assert_eq!(QualityPreset::V0.codec_label(), "MP3 V0");
        assert_eq!(QualityPreset::Cbr320.codec_label(), "MP3 320");
    }

    #[test]
    fn test_default_round_trips_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
