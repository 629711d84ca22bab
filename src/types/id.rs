// ABOUTME: Phantom-typed identifiers for compile-time type safety.
// ABOUTME: Prevents accidental swapping of target and rollout IDs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use thiserror::Error;

const MAX_TARGET_ID_LEN: usize = 253;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetIdError {
    #[error("target id cannot be empty")]
    Empty,

    #[error("target id exceeds maximum length of {MAX_TARGET_ID_LEN} characters")]
    TooLong,

    #[error("target id cannot start with '{0}'")]
    InvalidStart(char),

    #[error("invalid character in target id: '{0}'")]
    InvalidChar(char),
}

/// Marker types for phantom type parameters.
/// Using empty enums prevents instantiation and requires no trait bounds.
pub enum TargetMarker {}
pub enum RolloutMarker {}

/// A type-safe identifier that prevents accidental mixing of different ID types.
///
/// A `TargetId` names one deployable instance, a `RolloutId` names one run of the
/// coordinator. Both are strings underneath, but can't be passed for each other.
#[must_use = "IDs reference resources and should not be ignored"]
pub struct Id<T> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_inner(self) -> String {
        self.value
    }
}

// Manual trait implementations that don't require T to implement the trait.
// T is only used as a phantom type marker.

impl<T> std::fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Id").field(&self.value).finish()
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> std::fmt::Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::new(value))
    }
}

pub type TargetId = Id<TargetMarker>;
pub type RolloutId = Id<RolloutMarker>;

impl Id<TargetMarker> {
    /// Validate a target id read from configuration or an inventory.
    ///
    /// Ids are substituted into deploy commands unquoted, so only hostname
    /// characters plus `_` are accepted.
    pub fn parse(value: &str) -> Result<Self, TargetIdError> {
        if value.is_empty() {
            return Err(TargetIdError::Empty);
        }

        if value.len() > MAX_TARGET_ID_LEN {
            return Err(TargetIdError::TooLong);
        }

        if let Some(first) = value.chars().next()
            && (first == '.' || first == '-')
        {
            return Err(TargetIdError::InvalidStart(first));
        }

        for c in value.chars() {
            if !c.is_ascii_alphanumeric() && c != '.' && c != '-' && c != '_' {
                return Err(TargetIdError::InvalidChar(c));
            }
        }

        Ok(Self::new(value))
    }
}
