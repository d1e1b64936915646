#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for deploying static build output to S3.
//!
//! Uses `indicatif-log-bridge` (via [`static_deploy_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and the upload spinner never fight for the terminal.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use static_deploy::DeployOptions;
use static_deploy_cli_utils::IndicatifProgress;
use static_deploy_config::{DeployConfig, Settings};
use static_deploy_upload::S3Store;

#[derive(Parser)]
#[command(name = "static_deploy", about = "Deploy static build output to an S3 bucket")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the project and upload its output directory to the bucket
    #[command(alias = "s3")]
    Deploy {
        #[command(flatten)]
        target: TargetArgs,
        /// Build output directory to upload
        #[arg(short, long)]
        output_path: Option<PathBuf>,
        /// Key prefix for every uploaded object
        #[arg(short, long)]
        prepend_path: Option<String>,
        /// Deploy the existing output directory without building
        #[arg(long)]
        skip_build: bool,
        /// Extra attempts per file after a failed upload
        #[arg(long)]
        max_retries: Option<u32>,
        /// Per-attempt upload timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Check that the bucket exists and report its region
    Check {
        #[command(flatten)]
        target: TargetArgs,
    },
}

/// Options shared by every command: which config, environment and bucket.
#[derive(Args)]
struct TargetArgs {
    /// Config file (default: `deploy.toml` if present)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Environment section of the config file to apply
    #[arg(short, long)]
    environment: Option<String>,
    /// S3 access key
    #[arg(long)]
    aws_key: Option<String>,
    /// S3 secret key
    #[arg(long)]
    aws_secret: Option<String>,
    /// Target bucket
    #[arg(long)]
    aws_bucket: Option<String>,
    /// Bucket region
    #[arg(long)]
    aws_region: Option<String>,
    /// Custom S3-compatible endpoint URL
    #[arg(long)]
    endpoint: Option<String>,
}

impl TargetArgs {
    fn settings(&self) -> Settings {
        Settings {
            bucket: self.aws_bucket.clone(),
            region: self.aws_region.clone(),
            access_key: self.aws_key.clone(),
            secret_key: self.aws_secret.clone(),
            endpoint: self.endpoint.clone(),
            ..Settings::default()
        }
    }

    fn load(&self, overrides: Settings) -> Result<DeployConfig, Box<dyn std::error::Error>> {
        let config = static_deploy_config::load(
            self.config.as_deref(),
            self.environment.as_deref(),
            self.settings().merge(overrides),
        )?;
        log::info!(
            "Using environment {} -> s3://{} ({})",
            config.environment,
            config.bucket,
            config.region
        );
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = static_deploy_cli_utils::init_logger();
    let progress = IndicatifProgress::new(&multi);
    let cli = Cli::parse();

    match cli.command {
        Commands::Deploy {
            target,
            output_path,
            prepend_path,
            skip_build,
            max_retries,
            timeout_secs,
        } => {
            let config = target.load(Settings {
                output_path,
                prepend_path,
                max_retries,
                timeout_secs,
                ..Settings::default()
            })?;

            let start = Instant::now();
            let mut store = S3Store::connect(static_deploy::s3_settings(&config)).await;

            match static_deploy::run(
                &config,
                DeployOptions { skip_build },
                &mut store,
                &progress,
            )
            .await
            {
                Ok(summary) => {
                    log::info!(
                        "Deploy complete: {summary} in {:.1}s",
                        start.elapsed().as_secs_f64()
                    );
                }
                Err(e) => {
                    log::error!("Deploy failed: {e}");
                    return Err(e.into());
                }
            }
        }
        Commands::Check { target } => {
            let config = target.load(Settings::default())?;
            let mut store = S3Store::connect(static_deploy::s3_settings(&config)).await;
            let region = static_deploy::check(&mut store, &progress).await?;
            println!("{} is in {region}", config.bucket);
        }
    }

    Ok(())
}
