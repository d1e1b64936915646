#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Build, hook, and upload sequence for static site deploys.
//!
//! [`run`] executes one deploy end to end:
//!
//! 1. announce the injected environment variables,
//! 2. build (unless skipped): `beforeBuild` hooks, build command,
//!    `afterBuild` hooks,
//! 3. deploy: `beforeDeploy` hooks, bucket validation, directory upload,
//!    `afterDeploy` hooks.
//!
//! Any failure stops the sequence. In particular a failed build means the
//! bucket is never contacted.

pub mod build_step;
pub mod hooks;
pub mod shell;

use static_deploy_config::{DeployConfig, HookPhase};
use static_deploy_upload::{
    ObjectStore, ProgressSink, S3Settings, Tone, UploadError, UploadOptions, UploadSummary,
};

/// Errors that abort a deploy.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The build command exited non-zero.
    #[error("Build failed with error code: {code}")]
    Build {
        /// Exit code of the build command.
        code: i32,
    },

    /// A hook step exited non-zero.
    #[error("{phase} step '{name}' failed with exit code {code}")]
    Hook {
        /// Phase the step belongs to.
        phase: HookPhase,
        /// Step name.
        name: String,
        /// Exit code of the step.
        code: i32,
    },

    /// A build or hook command could not be started.
    #[error("Failed to run '{command}': {source}")]
    Spawn {
        /// Command line.
        command: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Enumeration, bucket validation, or upload failed.
    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// Per-invocation switches that are not part of the config file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeployOptions {
    /// Deploy the existing output directory without building.
    pub skip_build: bool,
}

/// Store connection settings for a resolved config.
#[must_use]
pub fn s3_settings(config: &DeployConfig) -> S3Settings {
    S3Settings {
        bucket: config.bucket.clone(),
        region: config.region.clone(),
        access_key: config.access_key.clone(),
        secret_key: config.secret_key.clone(),
        endpoint: config.endpoint.clone(),
    }
}

/// Upload options for a resolved config.
#[must_use]
pub fn upload_options(config: &DeployConfig) -> UploadOptions {
    UploadOptions {
        prefix: config.prepend_path.clone(),
        max_retries: config.max_retries,
        timeout: config.timeout,
    }
}

/// Runs a full deploy.
///
/// # Errors
///
/// Returns the first [`DeployError`] encountered; nothing after it runs.
pub async fn run<S: ObjectStore + ?Sized>(
    config: &DeployConfig,
    options: DeployOptions,
    store: &mut S,
    progress: &dyn ProgressSink,
) -> Result<UploadSummary, DeployError> {
    let env = config.command_env();
    for (key, value) in &env {
        progress.write_line(
            Tone::Info,
            &format!("Setting environment, {key} to {value}"),
        );
    }

    if options.skip_build {
        log::info!("Skipping build");
    } else {
        build_step::build(config, &env, progress).await?;
    }

    hooks::run_phase(HookPhase::BeforeDeploy, &config.hooks, &env, progress).await?;

    static_deploy_upload::bucket::validate(store, progress).await?;
    let summary = static_deploy_upload::upload_directory(
        &*store,
        progress,
        &config.output_path,
        &upload_options(config),
    )
    .await?;

    progress.write_line(Tone::Success, &format!("Deployed {summary}"));

    hooks::run_phase(HookPhase::AfterDeploy, &config.hooks, &env, progress).await?;

    Ok(summary)
}

/// Validates the bucket without building or uploading anything.
///
/// # Errors
///
/// Returns [`DeployError::Upload`] if the bucket cannot be located.
pub async fn check<S: ObjectStore + ?Sized>(
    store: &mut S,
    progress: &dyn ProgressSink,
) -> Result<String, DeployError> {
    let location = static_deploy_upload::bucket::validate(store, progress).await?;
    Ok(location.region)
}
