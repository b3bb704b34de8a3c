mod batch;
mod config;
mod encoder;
mod export;
mod logging;
mod naming;
mod paths;
mod playlist;
mod processor;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args as ClapArgs, Parser, Subcommand};
use color_eyre::{Result, eyre::Context};

use crate::{
    config::{Config, Overrides, QualityPreset},
    encoder::FfmpegEncoder,
    logging::init_tracing,
};

const SERVICE_NAME: &str = "playlist-export";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "PLAYLIST_EXPORT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `playlist_export=debug`
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: String,

    /// Export spans to this OTLP/gRPC endpoint
    #[arg(long, global = true, env = "OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

fn is_positive(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("`{}` is not a positive number", s)),
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy or transcode every track of a playlist export into the output directory
    Run(RunArgs),
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(ClapArgs, Debug)]
struct RunArgs {
    /// Pipe-delimited playlist export
    #[arg(short, long, env = "PLAYLIST_EXPORT_INPUT")]
    input: Option<PathBuf>,

    /// Directory receiving the renamed files
    #[arg(short, long, env = "PLAYLIST_EXPORT_OUTPUT")]
    output: Option<PathBuf>,

    /// Number of files processed in parallel
    #[arg(short, long, value_parser = is_positive)]
    workers: Option<usize>,

    /// Encoder binary
    #[arg(long)]
    encoder: Option<PathBuf>,

    /// MP3 quality preset used when transcoding
    #[arg(short, long, value_enum)]
    preset: Option<QualityPreset>,

    /// Copy files as they are instead of transcoding to MP3
    #[arg(long)]
    no_transcode: bool,

    /// Use the paths from the export unchanged
    #[arg(long)]
    no_path_substitution: bool,

    /// Substring of the exported paths to replace
    #[arg(long)]
    substitute_from: Option<String>,

    /// Replacement for `--substitute-from`
    #[arg(long)]
    substitute_to: Option<String>,
}

impl From<RunArgs> for Overrides {
    fn from(args: RunArgs) -> Self {
        Overrides {
            row_source: args.input,
            output_directory: args.output,
            workers: args.workers,
            encoder: args.encoder,
            preset: args.preset,
            no_transcode: args.no_transcode,
            no_path_substitution: args.no_path_substitution,
            substitute_from: args.substitute_from,
            substitute_to: args.substitute_to,
        }
    }
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let tracer_provider = init_tracing(SERVICE_NAME, args.otlp_endpoint.as_deref(), &args.log_level)?;

    let result = execute(args).await;

    if let Some(provider) = tracer_provider
        && let Err(e) = provider.shutdown()
    {
        tracing::warn!("Failed to flush traces: {}", e);
    }

    result
}

async fn execute(args: Args) -> Result<()> {
    match args.command {
        Commands::Run(run_args) => {
            tracing::debug!("Loading configuration");
            let config = match &args.config {
                Some(path) => Config::from_file(path),
                None => Config::load(),
            }
            .wrap_err("Failed to load playlist-export config")?
            .with_overrides(run_args.into())
            .finalize()?;

            let config = Arc::new(config);
            let encoder = Arc::new(FfmpegEncoder::new(config.encoder.clone()));
            tracing::debug!("Using encoder {}", encoder.binary().display());

            export::run(config, encoder).await?;
        }
        Commands::Config(config_commands) => match config_commands {
            ConfigCommands::CreateDefault => {
                let path = Config::create_default()?;
                println!("{}", path.display());
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_become_overrides() {
        let args = Args::try_parse_from([
            "playlist-export",
            "run",
            "--input",
            "export.csv",
            "--workers",
            "4",
            "--preset",
            "320",
            "--no-transcode",
        ])
        .unwrap();

        let Commands::Run(run_args) = args.command else {
            panic!("expected run command");
        };
        let config = Config::default().with_overrides(run_args.into());

        assert_eq!(config.row_source, PathBuf::from("export.csv"));
        assert_eq!(config.workers, 4);
        assert_eq!(config.transcode.preset, QualityPreset::Cbr320);
        assert!(!config.transcode.enabled);
    }

    #[test]
    fn test_zero_workers_rejected_by_cli() {
        let result = Args::try_parse_from(["playlist-export", "run", "--workers", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
