use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{FulltextError, Result};

/// Settings for the asynchronous index update applier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Maximum number of index operations running at the same time
    pub max_inflight_operations: usize,

    /// Operations running longer than this are logged as slow
    #[serde(with = "optional_millis")]
    pub log_slow_operations: Option<Duration>,
}

impl UpdaterConfig {
    pub fn new() -> Self {
        Self {
            max_inflight_operations: 16,
            log_slow_operations: Some(Duration::from_secs(5)),
        }
    }

    /// Set the bound on concurrently running index operations
    pub fn max_inflight_operations(mut self, max: usize) -> Self {
        self.max_inflight_operations = max;
        self
    }

    /// Set the slow-operation logging threshold
    pub fn log_slow_operations(mut self, threshold: Duration) -> Self {
        self.log_slow_operations = Some(threshold);
        self
    }

    /// Never log operations as slow
    pub fn without_slow_operation_log(mut self) -> Self {
        self.log_slow_operations = None;
        self
    }

    /// Parse from JSON
    ///
    /// Missing fields fall back to defaults; durations are milliseconds.
    ///
    /// ```
    /// # use fulltext_sync::UpdaterConfig;
    /// let config = UpdaterConfig::from_json(r#"{"max_inflight_operations": 4}"#).unwrap();
    /// assert_eq!(config.max_inflight_operations, 4);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| FulltextError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_inflight_operations == 0 {
            return Err(FulltextError::Configuration(
                "max_inflight_operations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self::new()
    }
}

mod optional_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = UpdaterConfig::new()
            .max_inflight_operations(2)
            .log_slow_operations(Duration::from_millis(250));

        assert_eq!(config.max_inflight_operations, 2);
        assert_eq!(config.log_slow_operations, Some(Duration::from_millis(250)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_json() {
        let config =
            UpdaterConfig::from_json(r#"{"max_inflight_operations": 3, "log_slow_operations": 100}"#)
                .unwrap();
        assert_eq!(config.max_inflight_operations, 3);
        assert_eq!(config.log_slow_operations, Some(Duration::from_millis(100)));

        let config = UpdaterConfig::from_json(r#"{"log_slow_operations": null}"#).unwrap();
        assert_eq!(config.max_inflight_operations, 16);
        assert_eq!(config.log_slow_operations, None);
    }

    #[test]
    fn test_config_rejects_zero_inflight() {
        let err = UpdaterConfig::from_json(r#"{"max_inflight_operations": 0}"#).unwrap_err();
        assert!(matches!(err, FulltextError::Configuration(_)));
        assert!(UpdaterConfig::from_json("not json").is_err());
    }
}
