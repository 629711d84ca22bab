// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates tranche.yml template files.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::DeploymentName;

use super::CONFIG_FILENAME;

const DEFAULT_DEPLOYMENT: &str = "my-app";

pub fn init_config(dir: &Path, deployment: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let deployment = DeploymentName::new(deployment.unwrap_or(DEFAULT_DEPLOYMENT))
        .map_err(|e| Error::InvalidConfig(e.to_string()))?;

    let yaml = generate_template_yaml(&deployment);
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(deployment: &DeploymentName) -> String {
    format!(
        r#"deployment: {deployment}
current_version: v1.0.0
targets:
  - {deployment}-1
  - {deployment}-2
  - {deployment}-3
# Or read targets from a file, one "id [version] [health-url]" per line:
# inventory_file: targets.txt
health:
  url: "http://{{target}}/health"
  timeout: 5s
  attempts: 5
  backoff: 2s
# Probe settings after a revert (defaults to the health section)
# rollback_health:
#   attempts: 10
rollout:
  batch_delay: 10s
  auto_rollback: true
deploy:
  command: "echo deploying {{version}} to {{target}}"
  # revert_command: "echo reverting {{target}} to {{version}}"
  timeout: 5m
# audit_log: .tranche/audit.jsonl
# state_dir: .tranche/state
"#
    )
}
