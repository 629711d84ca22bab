// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles deployment names and target lists.

use nonempty::NonEmpty;
use serde::Deserialize;

use super::TargetConfig;
use crate::types::DeploymentName;

pub fn deserialize_deployment_name<'de, D>(deserializer: D) -> Result<DeploymentName, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    DeploymentName::new(&s).map_err(serde::de::Error::custom)
}

pub fn deserialize_targets_option<'de, D>(
    deserializer: D,
) -> Result<Option<NonEmpty<TargetConfig>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<Vec<TargetEntry>> = Option::deserialize(deserializer)?;
    match opt {
        None => Ok(None),
        Some(values) => {
            let targets = values
                .into_iter()
                .map(|entry| entry.into_target_config())
                .collect::<Result<Vec<_>, _>>()
                .map_err(serde::de::Error::custom)?;

            let nonempty = NonEmpty::from_vec(targets)
                .ok_or_else(|| serde::de::Error::custom("at least one target is required"))?;
            Ok(Some(nonempty))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TargetEntry {
    Simple(String),
    Detailed(TargetConfig),
}

impl TargetEntry {
    fn into_target_config(self) -> Result<TargetConfig, String> {
        match self {
            TargetEntry::Simple(s) => TargetConfig::parse(&s),
            TargetEntry::Detailed(c) => Ok(c),
        }
    }
}
