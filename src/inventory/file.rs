// ABOUTME: Inventory read from a plain-text file, one target per line.
// ABOUTME: Lines look like "<id> [<version>] [<health-url>]"; '#' starts a comment.

use async_trait::async_trait;
use snafu::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};

use super::error::{
    InvalidEndpointSnafu, InvalidTargetIdSnafu, InvalidVersionSnafu, ParseSnafu, ReadSnafu,
};
use super::{EndpointTemplate, InventoryError, InventoryProvider, Target, validate_targets};
use crate::health::validate_endpoint;
use crate::types::{TargetId, Version};

/// Targets listed in an external file, re-read on every `list_targets` call.
#[derive(Debug, Clone)]
pub struct FileInventory {
    path: PathBuf,
    endpoint: EndpointTemplate,
    default_version: Option<Version>,
}

impl FileInventory {
    pub fn new(
        path: impl Into<PathBuf>,
        endpoint: EndpointTemplate,
        default_version: Option<Version>,
    ) -> Self {
        Self {
            path: path.into(),
            endpoint,
            default_version,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse inventory file content.
    pub fn parse(&self, content: &str) -> Result<Vec<Target>, InventoryError> {
        let mut targets = Vec::new();

        for (index, raw) in content.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }

            let mut fields = line.split_whitespace();
            let id = fields.next().context(ParseSnafu {
                path: self.path.clone(),
                line: line_no,
                message: "missing target id",
            })?;

            let mut version = None;
            let mut health_url = None;
            for field in fields {
                if field.contains("://") {
                    if health_url.replace(field).is_some() {
                        return ParseSnafu {
                            path: self.path.clone(),
                            line: line_no,
                            message: "more than one health URL",
                        }
                        .fail();
                    }
                } else if version.is_none() {
                    version = Some(Version::new(field).context(InvalidVersionSnafu {
                        path: self.path.clone(),
                        line: line_no,
                    })?);
                } else {
                    return ParseSnafu {
                        path: self.path.clone(),
                        line: line_no,
                        message: format!("unexpected field '{field}'"),
                    }
                    .fail();
                }
            }

            let version = version
                .or_else(|| self.default_version.clone())
                .context(ParseSnafu {
                    path: self.path.clone(),
                    line: line_no,
                    message: format!("no version for target '{id}' and no current_version set"),
                })?;

            let target_id = TargetId::parse(id).context(InvalidTargetIdSnafu {
                path: self.path.clone(),
                line: line_no,
            })?;
            let health_endpoint = health_url
                .map(str::to_string)
                .unwrap_or_else(|| self.endpoint.render(&target_id));
            validate_endpoint(&health_endpoint).context(InvalidEndpointSnafu {
                path: self.path.clone(),
                line: line_no,
            })?;

            targets.push(Target {
                id: target_id,
                version,
                health_endpoint,
            });
        }

        Ok(targets)
    }
}

#[async_trait]
impl InventoryProvider for FileInventory {
    async fn list_targets(&self) -> Result<Vec<Target>, InventoryError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .context(ReadSnafu {
                path: self.path.clone(),
            })?;

        let targets = self.parse(&content)?;
        validate_targets(&self.path.display().to_string(), &targets)?;
        Ok(targets)
    }
}
