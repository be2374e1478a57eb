//! DynamoDB ItemStore implementation.
//!
//! Table schema:
//! - `pk`: partition key (String)
//! - `sk`: sort key (Number)
//! - every other attribute is stored as `S` or `N` by its `AttributeValue`
//!
//! Table creation and the TTL setting are managed outside this crate.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue as DynamoValue;
use aws_sdk_dynamodb::Client;
use tracing::{debug, info};

use crate::storage::{
    AttributeValue, Item, ItemKey, ItemStore, PutCondition, QueryPage, RangeQuery, Result,
    StorageError,
};

const PARTITION_ATTR: &str = "pk";
const SORT_ATTR: &str = "sk";

/// DynamoDB implementation of ItemStore.
pub struct DynamoItemStore {
    client: Client,
    table_name: String,
}

impl DynamoItemStore {
    /// Create a new DynamoDB item store.
    ///
    /// # Arguments
    /// * `table_name` - Table holding the items
    /// * `endpoint_url` - Override endpoint (e.g., DynamoDB Local)
    pub async fn new(table_name: impl Into<String>, endpoint_url: Option<&str>) -> Result<Self> {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

        let client = if let Some(endpoint) = endpoint_url {
            let dynamo_config = aws_sdk_dynamodb::config::Builder::from(&config)
                .endpoint_url(endpoint)
                .build();
            Client::from_conf(dynamo_config)
        } else {
            Client::new(&config)
        };

        let table_name = table_name.into();
        info!(table = %table_name, "Connected to DynamoDB");

        Ok(Self { client, table_name })
    }

    fn key_attrs(key: &ItemKey) -> HashMap<String, DynamoValue> {
        let mut attrs = HashMap::new();
        attrs.insert(
            PARTITION_ATTR.to_string(),
            DynamoValue::S(key.partition.clone()),
        );
        attrs.insert(SORT_ATTR.to_string(), DynamoValue::N(key.sort.to_string()));
        attrs
    }

    fn to_dynamo(item: Item) -> HashMap<String, DynamoValue> {
        let mut attrs = Self::key_attrs(&item.key);
        for (name, value) in item.attributes {
            attrs.insert(name, Self::value_to_dynamo(value));
        }
        attrs
    }

    fn value_to_dynamo(value: AttributeValue) -> DynamoValue {
        match value {
            AttributeValue::Number(n) => DynamoValue::N(n.to_string()),
            AttributeValue::String(s) => DynamoValue::S(s),
        }
    }

    fn key_from_dynamo(attrs: &HashMap<String, DynamoValue>) -> Result<ItemKey> {
        let partition = match attrs.get(PARTITION_ATTR) {
            Some(DynamoValue::S(s)) => s.clone(),
            _ => {
                return Err(StorageError::Backend(format!(
                    "item without string '{}'",
                    PARTITION_ATTR
                )))
            }
        };
        let sort = match attrs.get(SORT_ATTR) {
            Some(DynamoValue::N(n)) => n.parse::<i64>().map_err(|e| {
                StorageError::Backend(format!("unparsable sort key '{}': {}", n, e))
            })?,
            _ => {
                return Err(StorageError::Backend(format!(
                    "item in '{}' without numeric '{}'",
                    partition, SORT_ATTR
                )))
            }
        };
        Ok(ItemKey::new(partition, sort))
    }

    fn from_dynamo(attrs: HashMap<String, DynamoValue>) -> Result<Item> {
        let mut item = Item::new(Self::key_from_dynamo(&attrs)?);
        for (name, value) in attrs {
            if name == PARTITION_ATTR || name == SORT_ATTR {
                continue;
            }
            let value = match value {
                DynamoValue::S(s) => AttributeValue::String(s),
                DynamoValue::N(n) => AttributeValue::Number(
                    n.parse::<i64>().map_err(|_| item.invalid(&name))?,
                ),
                _ => return Err(item.invalid(&name)),
            };
            item.attributes.insert(name, value);
        }
        Ok(item)
    }
}

#[async_trait]
impl ItemStore for DynamoItemStore {
    async fn get(&self, key: &ItemKey) -> Result<Option<Item>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key_attrs(key)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("DynamoDB get_item failed: {}", e)))?;

        match result.item {
            Some(attrs) => {
                debug!(key = %key, "Retrieved item from DynamoDB");
                Ok(Some(Self::from_dynamo(attrs)?))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, item: Item) -> Result<()> {
        let key = item.key.clone();

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(Self::to_dynamo(item)))
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("DynamoDB put_item failed: {}", e)))?;

        debug!(key = %key, "Stored item in DynamoDB");
        Ok(())
    }

    async fn conditional_put(&self, item: Item, condition: PutCondition) -> Result<()> {
        let key = item.key.clone();
        let PutCondition::AbsentOrNotEqual { attribute, value } = condition;

        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(Self::to_dynamo(item)))
            .condition_expression(format!(
                "attribute_not_exists({}) OR #attr <> :val",
                PARTITION_ATTR
            ))
            .expression_attribute_names("#attr", attribute)
            .expression_attribute_values(":val", Self::value_to_dynamo(value))
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!(key = %key, "Stored item in DynamoDB (conditional)");
                Ok(())
            }
            Err(e)
                if e.as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false) =>
            {
                Err(StorageError::ConditionFailed(key))
            }
            Err(e) => Err(StorageError::Backend(format!(
                "DynamoDB conditional put_item failed: {}",
                e
            ))),
        }
    }

    async fn query_range(&self, query: RangeQuery) -> Result<QueryPage> {
        if query.effective_lower() > query.upper {
            return Ok(QueryPage::default());
        }

        let limit = query
            .limit
            .map(|n| i32::try_from(n.max(1)).unwrap_or(i32::MAX));

        let result = self
            .client
            .query()
            .table_name(&self.table_name)
            .consistent_read(true)
            .key_condition_expression(format!(
                "{} = :pk AND {} BETWEEN :lo AND :hi",
                PARTITION_ATTR, SORT_ATTR
            ))
            .expression_attribute_values(":pk", DynamoValue::S(query.partition.clone()))
            .expression_attribute_values(":lo", DynamoValue::N(query.lower.to_string()))
            .expression_attribute_values(":hi", DynamoValue::N(query.upper.to_string()))
            .set_exclusive_start_key(query.start_after.as_ref().map(Self::key_attrs))
            .set_limit(limit)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("DynamoDB query failed: {}", e)))?;

        let items = result
            .items
            .unwrap_or_default()
            .into_iter()
            .map(Self::from_dynamo)
            .collect::<Result<Vec<_>>>()?;

        let last_evaluated = match result.last_evaluated_key {
            Some(attrs) => Some(Self::key_from_dynamo(&attrs)?),
            None => None,
        };

        debug!(
            partition = %query.partition,
            count = items.len(),
            more = last_evaluated.is_some(),
            "Queried DynamoDB range"
        );

        Ok(QueryPage {
            items,
            last_evaluated,
        })
    }
}
