// ABOUTME: Configuration types and parsing for tranche.yml.
// ABOUTME: Handles YAML parsing, environment overrides, and validation.

mod deserialize;
mod env;
mod health;
mod init;
mod rollout;
mod target;

pub use env::{
    ENV_AUTO_ROLLBACK, ENV_BATCH_DELAY, ENV_HEALTH_ATTEMPTS, ENV_HEALTH_BACKOFF,
    ENV_HEALTH_TIMEOUT, ENV_HEALTH_URL,
};
pub use health::{HealthConfig, RollbackHealthConfig};
pub use init::init_config;
pub use rollout::{DeployConfig, RolloutConfig};
pub use target::TargetConfig;

use deserialize::{deserialize_deployment_name, deserialize_targets_option};

use crate::deploy::RolloutSettings;
use crate::error::{Error, Result};
use crate::health::{ProbePolicy, validate_endpoint};
use crate::inventory::{EndpointTemplate, FileInventory, InventoryProvider, StaticInventory, Target};
use crate::types::{DeploymentName, TargetId, Version};
use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "tranche.yml";
pub const CONFIG_FILENAME_ALT: &str = "tranche.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".tranche/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_deployment_name")]
    pub deployment: DeploymentName,

    /// Version assumed for targets that do not state their own.
    #[serde(default)]
    pub current_version: Option<Version>,

    #[serde(default, deserialize_with = "deserialize_targets_option")]
    pub targets: Option<NonEmpty<TargetConfig>>,

    #[serde(default)]
    pub inventory_file: Option<PathBuf>,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub rollback_health: Option<RollbackHealthConfig>,

    #[serde(default)]
    pub rollout: RolloutConfig,

    pub deploy: DeployConfig,

    #[serde(default)]
    pub audit_log: Option<PathBuf>,

    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".tranche/state")
}

impl Config {
    /// Parse and validate without consulting the environment.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file, apply `TRANCHE_*` overrides, then validate.
    ///
    /// A relative `inventory_file` is resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        config.apply_env_overrides()?;

        if let (Some(file), Some(base)) = (&config.inventory_file, path.parent())
            && file.is_relative()
        {
            config.inventory_file = Some(base.join(file));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!("loading configuration from {}", path.display());
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(url) = env::var(ENV_HEALTH_URL) {
            self.health.url = url;
        }
        if let Some(timeout) = env::duration(ENV_HEALTH_TIMEOUT)? {
            self.health.timeout = timeout;
        }
        if let Some(attempts) = env::attempts(ENV_HEALTH_ATTEMPTS)? {
            self.health.attempts = attempts;
        }
        if let Some(backoff) = env::duration(ENV_HEALTH_BACKOFF)? {
            self.health.backoff = backoff;
        }
        if let Some(delay) = env::duration(ENV_BATCH_DELAY)? {
            self.rollout.batch_delay = delay;
        }
        if let Some(auto) = env::flag(ENV_AUTO_ROLLBACK)? {
            self.rollout.auto_rollback = auto;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        match (&self.targets, &self.inventory_file) {
            (Some(_), Some(_)) => {
                return Err(Error::InvalidConfig(
                    "targets and inventory_file are mutually exclusive".to_string(),
                ));
            }
            (None, None) => {
                return Err(Error::InvalidConfig(
                    "either targets or inventory_file is required".to_string(),
                ));
            }
            _ => {}
        }

        if self.deploy.command.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "deploy.command cannot be empty".to_string(),
            ));
        }

        validate_health_url("health.url", &self.health.url)?;

        if let Some(targets) = &self.targets {
            for target in targets.iter() {
                TargetId::parse(&target.id).map_err(|e| {
                    Error::InvalidConfig(format!("invalid target '{}': {e}", target.id))
                })?;
                if target.version.is_none() && self.current_version.is_none() {
                    return Err(Error::InvalidConfig(format!(
                        "target {} has no version and current_version is not set",
                        target.id
                    )));
                }
                if let Some(url) = &target.health_url {
                    validate_endpoint(url).map_err(|e| {
                        Error::InvalidConfig(format!("health_url of {}: {e}", target.id))
                    })?;
                }
            }
        }

        Ok(())
    }

    /// Build the inventory provider this config describes.
    pub fn inventory(&self) -> Result<Box<dyn InventoryProvider>> {
        let template = EndpointTemplate::new(self.health.url.clone());

        if let Some(path) = &self.inventory_file {
            return Ok(Box::new(FileInventory::new(
                path.clone(),
                template,
                self.current_version.clone(),
            )));
        }

        let Some(entries) = &self.targets else {
            return Err(Error::InvalidConfig(
                "either targets or inventory_file is required".to_string(),
            ));
        };

        let targets = entries
            .iter()
            .map(|entry| {
                let version = entry
                    .version
                    .clone()
                    .or_else(|| self.current_version.clone())
                    .ok_or_else(|| {
                        Error::InvalidConfig(format!("target {} has no version", entry.id))
                    })?;
                let target = Target::new(entry.id.clone(), version, String::new());
                let endpoint = entry
                    .health_url
                    .clone()
                    .unwrap_or_else(|| template.render(&target.id));
                Ok(Target {
                    health_endpoint: endpoint,
                    ..target
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Box::new(StaticInventory::new(targets)))
    }

    pub fn probe_policy(&self) -> ProbePolicy {
        self.health.policy()
    }

    /// Falls back to the forward policy when `rollback_health` is absent.
    pub fn rollback_probe_policy(&self) -> ProbePolicy {
        self.rollback_health
            .as_ref()
            .map(|r| r.policy(&self.health))
            .unwrap_or_else(|| self.health.policy())
    }

    pub fn rollout_settings(&self) -> RolloutSettings {
        RolloutSettings {
            probe: self.probe_policy(),
            rollback_probe: self.rollback_probe_policy(),
            batch_delay: self.rollout.batch_delay,
            auto_rollback: self.rollout.auto_rollback,
        }
    }

    /// Check a deployment name given on the command line against this config.
    pub fn ensure_deployment(&self, name: &str) -> Result<()> {
        if name == self.deployment.as_str() {
            Ok(())
        } else {
            Err(Error::UnknownDeployment {
                expected: self.deployment.to_string(),
                got: name.to_string(),
            })
        }
    }
}

fn validate_health_url(field: &str, url: &str) -> Result<()> {
    if url.starts_with("http://") {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "{field} must be an http:// URL, got {url}"
        )))
    }
}
