//! Runtime configuration for the body system.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for a [`crate::engine::BodySystem`].
///
/// Every field has a default, so a partial JSON document is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Name of the container parts are stored in on their slot owner
    pub container_id: String,
    /// Maximum random offset applied to a part dropped into free space
    pub drop_offset: f32,
    /// Required leg count for bodies spawned without an explicit one
    pub default_required_legs: u32,
    /// Seed for the drop-offset RNG; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            container_id: "body_part".to_string(),
            drop_offset: 0.25,
            default_required_legs: 2,
            seed: None,
        }
    }
}

impl BodyConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.container_id.is_empty() {
            return Err(ConfigError::Invalid {
                field: "container_id",
                reason: "must not be empty".into(),
            });
        }
        if !self.drop_offset.is_finite() || self.drop_offset < 0.0 {
            return Err(ConfigError::Invalid {
                field: "drop_offset",
                reason: format!("{} is not a non-negative distance", self.drop_offset),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = BodyConfig::from_json(r#"{ "seed": 7 }"#).unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.container_id, "body_part");
        assert_eq!(config.default_required_legs, 2);
    }

    #[test]
    fn test_rejects_negative_offset() {
        let result = BodyConfig::from_json(r#"{ "drop_offset": -1.0 }"#);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "drop_offset",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            BodyConfig::from_json("{ nope"),
            Err(ConfigError::Json(_))
        ));
    }
}
