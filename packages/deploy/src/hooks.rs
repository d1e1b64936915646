//! Named hook steps around the build and deploy phases.

use std::collections::BTreeMap;

use static_deploy_config::{HookPhase, Hooks};
use static_deploy_upload::{ProgressSink, Tone};

use crate::{DeployError, shell};

/// Runs every step configured for `phase`, in order.
///
/// # Errors
///
/// Returns [`DeployError::Hook`] for the first step that exits non-zero;
/// the remaining steps are not run.
pub async fn run_phase(
    phase: HookPhase,
    hooks: &Hooks,
    env: &BTreeMap<String, String>,
    progress: &dyn ProgressSink,
) -> Result<(), DeployError> {
    let steps = hooks.steps(phase);
    progress.write_line(Tone::Info, &format!("Running step: {phase}"));

    for step in steps {
        log::info!("[{phase}] {}: {}", step.name, step.run);

        let code = shell::run(&step.run, env).await?;
        if code != 0 {
            progress.write_line(
                Tone::Error,
                &format!("Step {} failed with exit code {code}", step.name),
            );
            return Err(DeployError::Hook {
                phase,
                name: step.name.clone(),
                code,
            });
        }
    }

    Ok(())
}
