//! The build that must succeed before anything is deployed.

use std::collections::BTreeMap;
use std::time::Instant;

use static_deploy_config::{DeployConfig, HookPhase};
use static_deploy_upload::progress::format_elapsed;
use static_deploy_upload::{ProgressSink, Tone};

use crate::{DeployError, hooks, shell};

/// Runs `beforeBuild` hooks, the build command, then `afterBuild` hooks.
///
/// # Errors
///
/// Returns [`DeployError::Build`] if the build command exits non-zero, or
/// any hook/spawn error.
pub async fn build(
    config: &DeployConfig,
    env: &BTreeMap<String, String>,
    progress: &dyn ProgressSink,
) -> Result<(), DeployError> {
    hooks::run_phase(HookPhase::BeforeBuild, &config.hooks, env, progress).await?;

    if let Some(command) = &config.build_command {
        let start = Instant::now();
        progress.start("Building", '.');
        let code = shell::run(command, env).await;
        progress.stop();

        let code = code?;
        if code != 0 {
            progress.write_line(
                Tone::Error,
                &format!("Build failed with error code: {code}"),
            );
            return Err(DeployError::Build { code });
        }

        progress.write_line(
            Tone::Success,
            &format!("Build complete {}", format_elapsed(start.elapsed())),
        );
    } else {
        log::warn!("No build command configured, deploying {} as is", config.output_path.display());
        progress.write_line(Tone::Warning, "No build command configured, skipping build");
    }

    hooks::run_phase(HookPhase::AfterBuild, &config.hooks, env, progress).await
}
