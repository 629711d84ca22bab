// ABOUTME: Environment variable overrides applied on top of the config file.
// ABOUTME: Parses TRANCHE_* variables into durations, counts, and booleans.

use std::num::NonZeroU32;
use std::time::Duration;

use crate::error::{Error, Result};

pub const ENV_HEALTH_URL: &str = "TRANCHE_HEALTH_URL";
pub const ENV_HEALTH_TIMEOUT: &str = "TRANCHE_HEALTH_TIMEOUT";
pub const ENV_HEALTH_ATTEMPTS: &str = "TRANCHE_HEALTH_ATTEMPTS";
pub const ENV_HEALTH_BACKOFF: &str = "TRANCHE_HEALTH_BACKOFF";
pub const ENV_BATCH_DELAY: &str = "TRANCHE_BATCH_DELAY";
pub const ENV_AUTO_ROLLBACK: &str = "TRANCHE_AUTO_ROLLBACK";

/// Read a variable, treating unset and blank the same.
pub fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn duration(name: &str) -> Result<Option<Duration>> {
    var(name)
        .map(|v| {
            humantime::parse_duration(&v)
                .map_err(|e| Error::InvalidConfig(format!("{name}={v}: {e}")))
        })
        .transpose()
}

pub fn attempts(name: &str) -> Result<Option<NonZeroU32>> {
    var(name)
        .map(|v| {
            v.parse::<NonZeroU32>().map_err(|_| {
                Error::InvalidConfig(format!("{name}={v}: expected a positive integer"))
            })
        })
        .transpose()
}

pub fn flag(name: &str) -> Result<Option<bool>> {
    var(name)
        .map(|v| match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::InvalidConfig(format!(
                "{name}={v}: expected true or false"
            ))),
        })
        .transpose()
}
