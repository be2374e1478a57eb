//! Storage configuration types.

use serde::Deserialize;

/// Storage type discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Memory,
    Dynamo,
}

/// Storage configuration (discriminated union).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage type discriminator.
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// DynamoDB-specific configuration.
    pub dynamo: DynamoConfig,
}

/// DynamoDB-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DynamoConfig {
    /// Table holding raw per-fragment records.
    pub raw_table_name: String,
    /// Table holding aggregate buckets.
    pub aggregate_table_name: String,
    /// Endpoint override, e.g. `http://localhost:8000` for DynamoDB Local.
    pub endpoint_url: Option<String>,
}

impl Default for DynamoConfig {
    fn default() -> Self {
        Self {
            raw_table_name: "video-density-raw".to_string(),
            aggregate_table_name: "video-density".to_string(),
            endpoint_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_default() {
        let storage = StorageConfig::default();
        assert_eq!(storage.storage_type, StorageType::Memory);
        assert_eq!(storage.dynamo.raw_table_name, "video-density-raw");
        assert_eq!(storage.dynamo.aggregate_table_name, "video-density");
        assert!(storage.dynamo.endpoint_url.is_none());
    }
}
