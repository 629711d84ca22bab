// ABOUTME: Inline target configuration.
// ABOUTME: Parses formats like "web-1", "web-1@v1.4.2", or a detailed map.

use serde::Deserialize;

use crate::types::{TargetId, Version};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TargetConfig {
    pub id: String,
    #[serde(default)]
    pub version: Option<Version>,
    #[serde(default)]
    pub health_url: Option<String>,
}

impl TargetConfig {
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("target cannot be empty".to_string());
        }

        // Parse format: id[@version]
        let (id, version) = match s.split_once('@') {
            Some((id, version)) => {
                let version = Version::new(version)
                    .map_err(|e| format!("invalid version for target {id}: {e}"))?;
                (id, Some(version))
            }
            None => (s, None),
        };

        TargetId::parse(id).map_err(|e| format!("invalid target '{id}': {e}"))?;

        Ok(TargetConfig {
            id: id.to_string(),
            version,
            health_url: None,
        })
    }
}
