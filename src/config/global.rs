//! Tool configuration.
//!
//! Loaded from ./awstools.yml or ~/.config/awstools/awstools.yml

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::expand_tilde;
use crate::autoscale::{DEFAULT_MAX_POLLS, DEFAULT_POLL_INTERVAL, MigrationConfig, PollLimit};
use crate::provider::AwsSdkConfig;

/// Global configuration for awstools.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Multi-document YAML file declaring the applications.
    pub settings: PathBuf,

    /// Directory holding the CloudFormation templates.
    pub templatedir: PathBuf,

    /// How to reach AWS.
    pub aws: AwsConfig,

    /// Capacity migration settings.
    pub migration: MigrationSettings,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            settings: PathBuf::from("~/.config/awstools/applications.yml"),
            templatedir: PathBuf::from("~/.config/awstools/templates"),
            aws: AwsConfig::default(),
            migration: MigrationSettings::default(),
        }
    }
}

impl GlobalConfig {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. awstools.yml in current directory
    /// 3. ~/.config/awstools/awstools.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_config = PathBuf::from("awstools.yml");
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => {
                    log::info!("Loaded config from awstools.yml");
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load awstools.yml: {}", e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("awstools").join("awstools.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", user_config.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.migration.poll_interval_secs == 0 {
            eyre::bail!("migration.poll-interval-secs must be > 0");
        }
        if self.migration.max_polls == 0 {
            eyre::bail!("migration.max-polls must be > 0");
        }
        if self.aws.region.as_deref().is_some_and(|r| r.trim().is_empty()) {
            eyre::bail!("aws.region must not be empty when set");
        }
        if self.aws.profile.as_deref().is_some_and(|p| p.trim().is_empty()) {
            eyre::bail!("aws.profile must not be empty when set");
        }
        Ok(())
    }

    /// Settings file, with `~` expanded.
    pub fn settings_path(&self) -> PathBuf {
        expand_tilde(&self.settings)
    }

    /// Template directory, with `~` expanded.
    pub fn template_dir(&self) -> PathBuf {
        expand_tilde(&self.templatedir)
    }
}

/// AWS SDK settings. Unset fields fall back to the SDK's environment and
/// shared config resolution.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AwsConfig {
    pub region: Option<String>,

    pub profile: Option<String>,
}

impl AwsConfig {
    pub fn to_sdk_config(&self) -> AwsSdkConfig {
        AwsSdkConfig {
            region: self.region.clone(),
            profile: self.profile.clone(),
        }
    }
}

/// Capacity migration settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MigrationSettings {
    /// Seconds between two polls of the group.
    #[serde(rename = "poll-interval-secs")]
    pub poll_interval_secs: u64,

    /// Polls before giving up; capacity stays doubled when reached.
    #[serde(rename = "max-polls")]
    pub max_polls: u32,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            max_polls: DEFAULT_MAX_POLLS,
        }
    }
}

impl MigrationSettings {
    /// Controller settings; `unbounded` removes the poll cap.
    pub fn to_migration_config(&self, unbounded: bool) -> MigrationConfig {
        MigrationConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            poll_limit: if unbounded {
                PollLimit::Unbounded
            } else {
                PollLimit::MaxPolls(self.max_polls)
            },
        }
    }
}
