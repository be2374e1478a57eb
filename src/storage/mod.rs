//! Storage port and its implementations.
//!
//! Everything above this module talks to a sorted key-value store through
//! [`ItemStore`]: items are addressed by a string partition and an integer
//! sort key, and range reads come back in ascending sort order, one page at
//! a time.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{StorageConfig, StorageType};

pub mod mock;

#[cfg(feature = "dynamo")]
pub mod dynamo;

pub use mock::MockItemStore;

#[cfg(feature = "dynamo")]
pub use dynamo::DynamoItemStore;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Conditional write rejected: {0}")]
    ConditionFailed(ItemKey),

    #[error("Missing attribute '{attribute}' on item {key}")]
    MissingAttribute { key: ItemKey, attribute: String },

    #[error("Attribute '{attribute}' on item {key} has an unexpected type or value")]
    InvalidAttribute { key: ItemKey, attribute: String },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Primary key of a stored item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemKey {
    pub partition: String,
    pub sort: i64,
}

impl ItemKey {
    pub fn new(partition: impl Into<String>, sort: i64) -> Self {
        Self {
            partition: partition.into(),
            sort,
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition, self.sort)
    }
}

/// A non-key attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Number(i64),
    String(String),
}

/// A stored item: its key plus named attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub key: ItemKey,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Item {
    pub fn new(key: ItemKey) -> Self {
        Self {
            key,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_number(mut self, name: &str, value: i64) -> Self {
        self.attributes
            .insert(name.to_string(), AttributeValue::Number(value));
        self
    }

    pub fn with_string(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes
            .insert(name.to_string(), AttributeValue::String(value.into()));
        self
    }

    pub fn number(&self, name: &str) -> Result<i64> {
        match self.attributes.get(name) {
            Some(AttributeValue::Number(n)) => Ok(*n),
            Some(_) => Err(self.invalid(name)),
            None => Err(StorageError::MissingAttribute {
                key: self.key.clone(),
                attribute: name.to_string(),
            }),
        }
    }

    /// Read a numeric attribute that must not be negative.
    pub fn unsigned(&self, name: &str) -> Result<u64> {
        u64::try_from(self.number(name)?).map_err(|_| self.invalid(name))
    }

    pub fn string(&self, name: &str) -> Result<&str> {
        match self.attributes.get(name) {
            Some(AttributeValue::String(s)) => Ok(s),
            Some(_) => Err(self.invalid(name)),
            None => Err(StorageError::MissingAttribute {
                key: self.key.clone(),
                attribute: name.to_string(),
            }),
        }
    }

    /// Error for an attribute that exists but cannot be interpreted.
    pub fn invalid(&self, name: &str) -> StorageError {
        StorageError::InvalidAttribute {
            key: self.key.clone(),
            attribute: name.to_string(),
        }
    }
}

/// Guard for [`ItemStore::conditional_put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutCondition {
    /// Write only if no item exists for the key, or the stored item's
    /// `attribute` differs from `value`.
    AbsentOrNotEqual {
        attribute: String,
        value: AttributeValue,
    },
}

impl PutCondition {
    /// Evaluate the condition against the currently stored item.
    pub fn holds(&self, existing: Option<&Item>) -> bool {
        match self {
            PutCondition::AbsentOrNotEqual { attribute, value } => match existing {
                None => true,
                Some(item) => item.attributes.get(attribute) != Some(value),
            },
        }
    }
}

/// Ascending range read within one partition.
///
/// Both bounds are inclusive. A strict upper bound `x` is written as
/// `upper = x - 1`; sort keys are integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    pub partition: String,
    pub lower: i64,
    pub upper: i64,
    /// Resume strictly after this key (the previous page's last-evaluated key).
    pub start_after: Option<ItemKey>,
    /// Maximum number of items to return.
    pub limit: Option<usize>,
}

impl RangeQuery {
    pub fn new(partition: impl Into<String>, lower: i64, upper: i64) -> Self {
        Self {
            partition: partition.into(),
            lower,
            upper,
            start_after: None,
            limit: None,
        }
    }

    pub fn start_after(mut self, key: Option<ItemKey>) -> Self {
        self.start_after = key;
        self
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Smallest sort key this query may still return.
    pub fn effective_lower(&self) -> i64 {
        match &self.start_after {
            Some(key) => self.lower.max(key.sort.saturating_add(1)),
            None => self.lower,
        }
    }
}

/// One page of a range read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPage {
    pub items: Vec<Item>,
    /// Set when the store may hold further matches; pass it back as
    /// `start_after` to continue.
    pub last_evaluated: Option<ItemKey>,
}

/// Interface to a sorted key-value store.
///
/// Implementations:
/// - `MockItemStore`: In-memory store for tests and local runs
/// - `DynamoItemStore`: DynamoDB table with `pk` (S) / `sk` (N) keys
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Point lookup.
    async fn get(&self, key: &ItemKey) -> Result<Option<Item>>;

    /// Unconditional upsert.
    async fn put(&self, item: Item) -> Result<()>;

    /// Upsert guarded by `condition`.
    ///
    /// Returns `StorageError::ConditionFailed` when the condition does not
    /// hold; the stored item is left untouched.
    async fn conditional_put(&self, item: Item, condition: PutCondition) -> Result<()>;

    /// Read one page of items in `[query.lower, query.upper]`.
    async fn query_range(&self, query: RangeQuery) -> Result<QueryPage>;
}

/// The two keyspaces of the engine.
#[derive(Clone)]
pub struct Stores {
    /// Per-fragment density facts.
    pub raw: Arc<dyn ItemStore>,
    /// Rollup buckets.
    pub aggregate: Arc<dyn ItemStore>,
}

/// Initialize storage based on configuration.
pub async fn init_storage(
    config: &StorageConfig,
) -> std::result::Result<Stores, Box<dyn std::error::Error>> {
    match config.storage_type {
        StorageType::Memory => {
            info!("Storage: in-memory");
            Ok(Stores {
                raw: Arc::new(MockItemStore::new()),
                aggregate: Arc::new(MockItemStore::new()),
            })
        }
        #[cfg(feature = "dynamo")]
        StorageType::Dynamo => {
            let endpoint = config.dynamo.endpoint_url.as_deref();
            info!(
                raw_table = %config.dynamo.raw_table_name,
                aggregate_table = %config.dynamo.aggregate_table_name,
                "Storage: dynamo"
            );
            let raw = DynamoItemStore::new(&config.dynamo.raw_table_name, endpoint).await?;
            let aggregate =
                DynamoItemStore::new(&config.dynamo.aggregate_table_name, endpoint).await?;
            Ok(Stores {
                raw: Arc::new(raw),
                aggregate: Arc::new(aggregate),
            })
        }
        #[cfg(not(feature = "dynamo"))]
        StorageType::Dynamo => {
            tracing::error!("DynamoDB storage requested but 'dynamo' feature is not enabled");
            Err("DynamoDB feature not enabled".into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_attribute_accessors() {
        let item = Item::new(ItemKey::new("p", 1))
            .with_number("n", 42)
            .with_number("neg", -1)
            .with_string("s", "CLOUD");

        assert_eq!(item.number("n").unwrap(), 42);
        assert_eq!(item.unsigned("n").unwrap(), 42);
        assert_eq!(item.string("s").unwrap(), "CLOUD");
        assert!(matches!(
            item.number("missing"),
            Err(StorageError::MissingAttribute { .. })
        ));
        assert!(matches!(
            item.number("s"),
            Err(StorageError::InvalidAttribute { .. })
        ));
        assert!(matches!(
            item.unsigned("neg"),
            Err(StorageError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn test_absent_or_not_equal_condition() {
        let condition = PutCondition::AbsentOrNotEqual {
            attribute: "location".to_string(),
            value: AttributeValue::String("CLOUD".to_string()),
        };
        let device = Item::new(ItemKey::new("p", 1)).with_string("location", "DEVICE");
        let cloud = Item::new(ItemKey::new("p", 1)).with_string("location", "CLOUD");
        let bare = Item::new(ItemKey::new("p", 1));

        assert!(condition.holds(None));
        assert!(condition.holds(Some(&device)));
        assert!(condition.holds(Some(&bare)));
        assert!(!condition.holds(Some(&cloud)));
    }

    #[test]
    fn test_effective_lower_respects_start_after() {
        let query = RangeQuery::new("p", 10, 100);
        assert_eq!(query.effective_lower(), 10);

        let query = query.start_after(Some(ItemKey::new("p", 50)));
        assert_eq!(query.effective_lower(), 51);

        let query = RangeQuery::new("p", 10, 100).start_after(Some(ItemKey::new("p", 3)));
        assert_eq!(query.effective_lower(), 10);
    }
}
