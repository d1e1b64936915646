//! Shell command execution for build and hook steps.

use std::collections::BTreeMap;

use crate::DeployError;

/// Exit code reported when a command was killed by a signal.
const SIGNALED_EXIT_CODE: i32 = -1;

/// Runs `command` through `sh -c` with `env` added to the inherited
/// environment. Returns the exit code.
///
/// # Errors
///
/// Returns [`DeployError::Spawn`] if the shell cannot be started.
pub async fn run(command: &str, env: &BTreeMap<String, String>) -> Result<i32, DeployError> {
    log::debug!("sh -c {command:?}");

    let status = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .envs(env)
        .status()
        .await
        .map_err(|e| DeployError::Spawn {
            command: command.to_string(),
            source: e,
        })?;

    Ok(status.code().unwrap_or(SIGNALED_EXIT_CODE))
}
