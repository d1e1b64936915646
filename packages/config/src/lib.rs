#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Deploy configuration.
//!
//! Settings come from a TOML file (`deploy.toml` by default) in three
//! layers, later layers winning:
//!
//! 1. the top-level table,
//! 2. `[environments.<name>]` for the selected environment,
//! 3. overrides supplied by the caller (CLI flags).
//!
//! `process_env` maps merge key by key. A hook list set in a later layer
//! replaces the earlier list for that phase.
//!
//! ```toml
//! environment = "development"
//! bucket = "my-site"
//! region = "us-east-1"
//! prepend_path = "v2"
//! build_command = "npm run build"
//!
//! [process_env]
//! API_HOST = "https://api.example.com"
//!
//! [[hooks.before_deploy]]
//! name = "smoke"
//! run = "./scripts/smoke.sh"
//!
//! [environments.production]
//! bucket = "my-site-prod"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use strum_macros::{AsRefStr, Display};

pub use static_deploy_upload_models::{DEFAULT_MAX_RETRIES, DEFAULT_REGION};

/// Config file read when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "deploy.toml";

/// Environment used when neither the caller nor the file names one.
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Build output directory used when none is configured.
pub const DEFAULT_OUTPUT_PATH: &str = "dist";

/// Keys a settings layer may contain, both at the top level and under
/// `[environments.<name>]`.
const SETTINGS_KEYS: &[&str] = &[
    "bucket",
    "region",
    "access_key",
    "secret_key",
    "endpoint",
    "prepend_path",
    "output_path",
    "build_command",
    "timeout_secs",
    "max_retries",
    "process_env",
    "hooks",
];

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Read {
        /// Config file path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has the wrong shape.
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        /// Config file path.
        path: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// The config file contains a key no layer understands.
    #[error("Unknown key '{key}' in config {path}")]
    UnknownKey {
        /// Config file path.
        path: String,
        /// Dotted path of the offending key.
        key: String,
    },

    /// The requested environment is not defined in the file.
    #[error("Unknown environment '{name}' (defined: {known})")]
    UnknownEnvironment {
        /// Requested environment.
        name: String,
        /// Comma-separated list of defined environments.
        known: String,
    },

    /// A required setting is missing after all layers are applied.
    #[error("Missing required setting: {field}")]
    Missing {
        /// Setting name as written in the config file.
        field: &'static str,
    },
}

/// Points in the deploy where hook steps run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "camelCase")]
pub enum HookPhase {
    /// Before the build command.
    BeforeBuild,
    /// After a successful build.
    AfterBuild,
    /// Before bucket validation and upload.
    BeforeDeploy,
    /// After every file was uploaded.
    AfterDeploy,
}

/// One named hook step: a shell command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookStep {
    /// Label shown while the step runs.
    pub name: String,
    /// Command line passed to `sh -c`.
    pub run: String,
}

/// Hook steps per phase. `None` means "not set in this layer".
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Hooks {
    /// Steps run before the build.
    pub before_build: Option<Vec<HookStep>>,
    /// Steps run after the build.
    pub after_build: Option<Vec<HookStep>>,
    /// Steps run before the upload.
    pub before_deploy: Option<Vec<HookStep>>,
    /// Steps run after the upload.
    pub after_deploy: Option<Vec<HookStep>>,
}

impl Hooks {
    /// Steps configured for `phase`, empty if none.
    #[must_use]
    pub fn steps(&self, phase: HookPhase) -> &[HookStep] {
        let steps = match phase {
            HookPhase::BeforeBuild => &self.before_build,
            HookPhase::AfterBuild => &self.after_build,
            HookPhase::BeforeDeploy => &self.before_deploy,
            HookPhase::AfterDeploy => &self.after_deploy,
        };
        steps.as_deref().unwrap_or_default()
    }

    #[must_use]
    fn merge(self, over: Self) -> Self {
        Self {
            before_build: over.before_build.or(self.before_build),
            after_build: over.after_build.or(self.after_build),
            before_deploy: over.before_deploy.or(self.before_deploy),
            after_deploy: over.after_deploy.or(self.after_deploy),
        }
    }
}

/// One layer of settings. Every field is optional so layers can be merged.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Target bucket.
    pub bucket: Option<String>,
    /// Configured bucket region.
    pub region: Option<String>,
    /// S3 access key.
    pub access_key: Option<String>,
    /// S3 secret key.
    pub secret_key: Option<String>,
    /// Custom S3-compatible endpoint.
    pub endpoint: Option<String>,
    /// Key prefix for every uploaded object.
    pub prepend_path: Option<String>,
    /// Directory to deploy.
    pub output_path: Option<PathBuf>,
    /// Shell command that produces `output_path`.
    pub build_command: Option<String>,
    /// Per-attempt upload timeout, in seconds.
    pub timeout_secs: Option<u64>,
    /// Extra attempts per file after a failure.
    pub max_retries: Option<u32>,
    /// Variables injected into the build and hook environment.
    pub process_env: BTreeMap<String, String>,
    /// Hook steps.
    pub hooks: Hooks,
}

impl Settings {
    /// Applies `over` on top of `self`.
    #[must_use]
    pub fn merge(self, over: Self) -> Self {
        let mut process_env = self.process_env;
        process_env.extend(over.process_env);

        Self {
            bucket: over.bucket.or(self.bucket),
            region: over.region.or(self.region),
            access_key: over.access_key.or(self.access_key),
            secret_key: over.secret_key.or(self.secret_key),
            endpoint: over.endpoint.or(self.endpoint),
            prepend_path: over.prepend_path.or(self.prepend_path),
            output_path: over.output_path.or(self.output_path),
            build_command: over.build_command.or(self.build_command),
            timeout_secs: over.timeout_secs.or(self.timeout_secs),
            max_retries: over.max_retries.or(self.max_retries),
            process_env,
            hooks: self.hooks.merge(over.hooks),
        }
    }
}

/// The config file as written on disk.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct ConfigFile {
    /// Environment selected when the caller does not pick one.
    #[serde(default)]
    pub environment: Option<String>,
    /// Top-level settings.
    #[serde(flatten)]
    pub base: Settings,
    /// Named environment overrides.
    #[serde(default)]
    pub environments: BTreeMap<String, Settings>,
}

/// Fully resolved deploy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployConfig {
    /// Selected environment name.
    pub environment: String,
    /// Target bucket.
    pub bucket: String,
    /// Configured bucket region.
    pub region: String,
    /// S3 access key.
    pub access_key: Option<String>,
    /// S3 secret key.
    pub secret_key: Option<String>,
    /// Custom S3-compatible endpoint.
    pub endpoint: Option<String>,
    /// Key prefix for every uploaded object, possibly empty.
    pub prepend_path: String,
    /// Directory to deploy.
    pub output_path: PathBuf,
    /// Shell command that produces `output_path`.
    pub build_command: Option<String>,
    /// Per-attempt upload timeout.
    pub timeout: Option<Duration>,
    /// Extra attempts per file after a failure.
    pub max_retries: u32,
    /// Variables injected into the build and hook environment.
    pub process_env: BTreeMap<String, String>,
    /// Hook steps.
    pub hooks: Hooks,
}

impl DeployConfig {
    /// Environment handed to the build command and hook steps:
    /// `process_env` plus `DEPLOY_ENVIRONMENT` and `DEPLOY_OUTPUT_PATH`.
    #[must_use]
    pub fn command_env(&self) -> BTreeMap<String, String> {
        let mut env = self.process_env.clone();
        env.insert("DEPLOY_ENVIRONMENT".to_string(), self.environment.clone());
        env.insert(
            "DEPLOY_OUTPUT_PATH".to_string(),
            self.output_path.display().to_string(),
        );
        env
    }
}

/// Loads and resolves configuration.
///
/// With `path = None`, [`DEFAULT_CONFIG_PATH`] is read if it exists and
/// ignored otherwise. An explicit path must exist.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read or parsed, the
/// environment is unknown, or no bucket is configured.
pub fn load(
    path: Option<&Path>,
    environment: Option<&str>,
    overrides: Settings,
) -> Result<DeployConfig, ConfigError> {
    let file = match path {
        Some(path) => read(path)?,
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                read(default)?
            } else {
                log::debug!("No {DEFAULT_CONFIG_PATH} found, using CLI settings only");
                ConfigFile::default()
            }
        }
    };

    resolve(file, environment, overrides)
}

/// Reads and parses a config file.
///
/// # Errors
///
/// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
pub fn read(path: &Path) -> Result<ConfigFile, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        source: e,
    })?;
    log::debug!("Loaded config from {}", path.display());
    parse(&text, path)
}

/// Parses config text. `origin` is only used in error messages.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the text is not a valid config, and
/// [`ConfigError::UnknownKey`] if it contains a misspelled or unsupported
/// key.
pub fn parse(text: &str, origin: &Path) -> Result<ConfigFile, ConfigError> {
    let parse_error = |source| ConfigError::Parse {
        path: origin.display().to_string(),
        source,
    };

    let table: toml::Table = toml::from_str(text).map_err(parse_error)?;
    if let Some(key) = unknown_key(&table) {
        return Err(ConfigError::UnknownKey {
            path: origin.display().to_string(),
            key,
        });
    }

    toml::from_str(text).map_err(parse_error)
}

/// First key, as a dotted path, that is neither a settings key nor one of
/// the file-level keys. Hook tables reject unknown keys during
/// deserialization.
fn unknown_key(table: &toml::Table) -> Option<String> {
    let is_setting = |key: &str| SETTINGS_KEYS.contains(&key);

    for (key, value) in table {
        match key.as_str() {
            "environment" => {}
            "environments" => {
                let Some(environments) = value.as_table() else {
                    continue;
                };
                for (name, layer) in environments {
                    let Some(layer) = layer.as_table() else {
                        continue;
                    };
                    if let Some(bad) = layer.keys().find(|k| !is_setting(k.as_str())) {
                        return Some(format!("environments.{name}.{bad}"));
                    }
                }
            }
            other if is_setting(other) => {}
            other => return Some(other.to_string()),
        }
    }

    None
}

/// Applies the environment layer and caller overrides, then fills defaults.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownEnvironment`] if an explicitly selected
/// environment is not defined (only when the file defines any), and
/// [`ConfigError::Missing`] if no bucket is set.
pub fn resolve(
    file: ConfigFile,
    environment: Option<&str>,
    overrides: Settings,
) -> Result<DeployConfig, ConfigError> {
    let ConfigFile {
        environment: file_environment,
        base,
        mut environments,
    } = file;

    let requested = environment
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .or(file_environment);
    let name = requested
        .clone()
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

    let env_layer = match environments.remove(&name) {
        Some(layer) => layer,
        None if requested.is_some() && !environments.is_empty() => {
            return Err(ConfigError::UnknownEnvironment {
                name,
                known: environments.into_keys().collect::<Vec<_>>().join(", "),
            });
        }
        None => Settings::default(),
    };

    let settings = base.merge(env_layer).merge(overrides);

    Ok(DeployConfig {
        environment: name,
        bucket: settings
            .bucket
            .filter(|b| !b.is_empty())
            .ok_or(ConfigError::Missing { field: "bucket" })?,
        region: settings
            .region
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        access_key: settings.access_key,
        secret_key: settings.secret_key,
        endpoint: settings.endpoint,
        prepend_path: settings.prepend_path.unwrap_or_default(),
        output_path: settings
            .output_path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH)),
        build_command: settings.build_command.filter(|c| !c.trim().is_empty()),
        timeout: settings
            .timeout_secs
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs),
        max_retries: settings.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
        process_env: settings.process_env,
        hooks: settings.hooks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
environment = "staging"
bucket = "site"
region = "us-west-2"
prepend_path = "v2"
build_command = "npm run build"
timeout_secs = 30

[process_env]
API_HOST = "https://api.example.com"
FEATURE = "off"

[[hooks.before_deploy]]
name = "smoke"
run = "true"

[environments.staging]
bucket = "site-staging"

[environments.production]
bucket = "site-prod"
max_retries = 5

[environments.production.process_env]
FEATURE = "on"

[[environments.production.hooks.before_deploy]]
name = "announce"
run = "echo deploying"
"#;

    fn sample() -> ConfigFile {
        parse(SAMPLE, Path::new("deploy.toml")).unwrap()
    }

    #[test]
    fn defaults_to_the_file_environment() {
        let config = resolve(sample(), None, Settings::default()).unwrap();

        assert_eq!(config.environment, "staging");
        assert_eq!(config.bucket, "site-staging");
        assert_eq!(config.region, "us-west-2");
        assert_eq!(config.prepend_path, "v2");
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.hooks.steps(HookPhase::BeforeDeploy)[0].name, "smoke");
        assert!(config.hooks.steps(HookPhase::AfterDeploy).is_empty());
    }

    #[test]
    fn environment_layer_overrides_base() {
        let config = resolve(sample(), Some("production"), Settings::default()).unwrap();

        assert_eq!(config.bucket, "site-prod");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.process_env["FEATURE"], "on");
        assert_eq!(config.process_env["API_HOST"], "https://api.example.com");
        let steps = config.hooks.steps(HookPhase::BeforeDeploy);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].name, "announce");
    }

    #[test]
    fn overrides_win_over_every_layer() {
        let overrides = Settings {
            bucket: Some("cli-bucket".to_string()),
            prepend_path: Some(String::new()),
            ..Settings::default()
        };
        let config = resolve(sample(), Some("production"), overrides).unwrap();

        assert_eq!(config.bucket, "cli-bucket");
        assert_eq!(config.prepend_path, "");
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let err = resolve(sample(), Some("qa"), Settings::default()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownEnvironment { ref name, .. } if name == "qa"));
    }

    #[test]
    fn bucket_is_required() {
        let err = resolve(ConfigFile::default(), None, Settings::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { field: "bucket" }));
    }

    #[test]
    fn cli_only_config_gets_defaults() {
        let overrides = Settings {
            bucket: Some("site".to_string()),
            ..Settings::default()
        };
        let config = resolve(ConfigFile::default(), None, overrides).unwrap();

        assert_eq!(config.environment, DEFAULT_ENVIRONMENT);
        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.output_path, PathBuf::from(DEFAULT_OUTPUT_PATH));
        assert_eq!(config.timeout, None);
        assert_eq!(config.build_command, None);
    }

    #[test]
    fn command_env_adds_deploy_variables() {
        let config = resolve(sample(), Some("production"), Settings::default()).unwrap();
        let env = config.command_env();

        assert_eq!(env["DEPLOY_ENVIRONMENT"], "production");
        assert_eq!(env["DEPLOY_OUTPUT_PATH"], "dist");
        assert_eq!(env["FEATURE"], "on");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load(
            Some(&tmp.path().join("missing.toml")),
            None,
            Settings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn loads_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("deploy.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = load(Some(&path), Some("production"), Settings::default()).unwrap();
        assert_eq!(config.bucket, "site-prod");
    }

    #[test]
    fn misspelled_top_level_key_is_rejected() {
        let err = parse("bucket = \"site\"\nprepend_pth = \"v2\"", Path::new("deploy.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey { ref key, .. } if key == "prepend_pth"));
    }

    #[test]
    fn misspelled_environment_key_is_rejected() {
        let text = "bucket = \"site\"\n\n[environments.production]\nmax_retry = 5\n";
        let err = parse(text, Path::new("deploy.toml")).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownKey { ref key, .. } if key == "environments.production.max_retry"
        ));
    }

    #[test]
    fn unknown_hook_phase_is_rejected() {
        let text = "bucket = \"site\"\n\n[[hooks.before_depoy]]\nname = \"x\"\nrun = \"true\"\n";
        let err = parse(text, Path::new("deploy.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let err = parse("bucket = [", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
