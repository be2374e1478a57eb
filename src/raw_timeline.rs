//! Raw per-fragment density facts.
//!
//! Item layout:
//! - partition: `raw#<deviceId>`, sort: fragment timestamp (ms)
//! - `durationMillis`, `location`, `createdAt`, `lastUpdated`, `ttlEpochSeconds`

use std::sync::Arc;

use tracing::debug;

use crate::config::{TimelineConfig, DEFAULT_RAW_PAGE_SIZE, DEFAULT_RAW_RETENTION_DAYS};
use crate::cursor;
use crate::error::{Result, TimelineError};
use crate::model::{RawDensityRecord, RawPage, VideoLocation};
use crate::storage::{
    AttributeValue, Item, ItemKey, ItemStore, PutCondition, RangeQuery, StorageError,
};
use crate::time::{raw_partition_key, system_clock, ttl_epoch_seconds, Clock};

const DURATION_ATTR: &str = "durationMillis";
const LOCATION_ATTR: &str = "location";
const CREATED_AT_ATTR: &str = "createdAt";
const LAST_UPDATED_ATTR: &str = "lastUpdated";
const TTL_ATTR: &str = "ttlEpochSeconds";

/// Store for raw density records.
pub struct RawTimelineStore {
    store: Arc<dyn ItemStore>,
    retention_days: u32,
    page_size: usize,
    clock: Clock,
}

impl RawTimelineStore {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self {
            store,
            retention_days: DEFAULT_RAW_RETENTION_DAYS,
            page_size: DEFAULT_RAW_PAGE_SIZE,
            clock: system_clock(),
        }
    }

    pub fn from_config(store: Arc<dyn ItemStore>, config: &TimelineConfig) -> Self {
        Self::new(store)
            .with_retention_days(config.raw_retention_days)
            .with_page_size(config.raw_page_size)
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Record that `duration_millis` of video starting at `timestamp` is at `location`.
    ///
    /// A `Cloud` save always wins. A `Device` save is dropped when the
    /// stored record already says `Cloud`. Re-saving an unchanged fact
    /// writes nothing, and an overwrite keeps the stored `createdAt`.
    pub async fn save(
        &self,
        device_id: &str,
        timestamp: i64,
        duration_millis: u64,
        location: VideoLocation,
    ) -> Result<()> {
        let existing = self.load(device_id, timestamp).await?;
        if let Some(stored) = &existing {
            if stored.duration_millis == duration_millis && stored.location == location {
                debug!(
                    device_id = %device_id,
                    timestamp,
                    "Raw density record unchanged, skipping write"
                );
                return Ok(());
            }
        }

        let now = (self.clock)();
        let record = RawDensityRecord {
            device_id: device_id.to_string(),
            timestamp,
            duration_millis,
            location,
            created_at: existing.as_ref().map_or(now, |stored| stored.created_at),
            last_updated: now,
            expiration_epoch_seconds: ttl_epoch_seconds(timestamp, self.retention_days),
        };
        let item = to_item(&record)?;

        match location {
            VideoLocation::Cloud => {
                self.store.put(item).await?;
            }
            VideoLocation::Device => {
                let condition = PutCondition::AbsentOrNotEqual {
                    attribute: LOCATION_ATTR.to_string(),
                    value: AttributeValue::String(VideoLocation::Cloud.as_str().to_string()),
                };
                match self.store.conditional_put(item, condition).await {
                    Ok(()) => {}
                    Err(StorageError::ConditionFailed(key)) => {
                        debug!(
                            key = %key,
                            "Fragment already in cloud, ignoring device-side save"
                        );
                        return Ok(());
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        debug!(
            device_id = %device_id,
            timestamp,
            duration_millis,
            location = %location,
            "Saved raw density record"
        );
        Ok(())
    }

    /// Point lookup of one fragment's record.
    pub async fn load(&self, device_id: &str, timestamp: i64) -> Result<Option<RawDensityRecord>> {
        let key = ItemKey::new(raw_partition_key(device_id), timestamp);
        match self.store.get(&key).await? {
            Some(item) => Ok(Some(from_item(device_id, &item)?)),
            None => Ok(None),
        }
    }

    /// One page of records with timestamps in `[start_millis, end_millis]`.
    ///
    /// The returned token is the store's own continuation point.
    pub async fn list_raw(
        &self,
        device_id: &str,
        start_millis: i64,
        end_millis: i64,
        next_token: Option<&str>,
    ) -> Result<RawPage> {
        if start_millis > end_millis {
            return Err(TimelineError::InvalidRequest(format!(
                "start {} is after end {}",
                start_millis, end_millis
            )));
        }

        let partition = raw_partition_key(device_id);
        let start_after = next_token
            .map(|token| cursor::decode(token, &partition))
            .transpose()?;

        let page = self
            .store
            .query_range(
                RangeQuery::new(partition, start_millis, end_millis)
                    .start_after(start_after)
                    .limit(Some(self.page_size)),
            )
            .await?;

        let records = page
            .items
            .iter()
            .map(|item| from_item(device_id, item))
            .collect::<Result<Vec<_>>>()?;

        Ok(RawPage {
            records,
            next_token: page.last_evaluated.as_ref().map(cursor::encode),
        })
    }
}

fn to_item(record: &RawDensityRecord) -> Result<Item> {
    let duration = i64::try_from(record.duration_millis).map_err(|_| {
        TimelineError::InvalidRequest(format!(
            "duration {}ms does not fit a stored number",
            record.duration_millis
        ))
    })?;
    Ok(Item::new(ItemKey::new(
        raw_partition_key(&record.device_id),
        record.timestamp,
    ))
    .with_number(DURATION_ATTR, duration)
    .with_string(LOCATION_ATTR, record.location.as_str())
    .with_number(CREATED_AT_ATTR, record.created_at)
    .with_number(LAST_UPDATED_ATTR, record.last_updated)
    .with_number(TTL_ATTR, record.expiration_epoch_seconds))
}

fn from_item(device_id: &str, item: &Item) -> Result<RawDensityRecord> {
    let location = item
        .string(LOCATION_ATTR)?
        .parse::<VideoLocation>()
        .map_err(|_| item.invalid(LOCATION_ATTR))?;
    Ok(RawDensityRecord {
        device_id: device_id.to_string(),
        timestamp: item.key.sort,
        duration_millis: item.unsigned(DURATION_ATTR)?,
        location,
        created_at: item.number(CREATED_AT_ATTR)?,
        last_updated: item.number(LAST_UPDATED_ATTR)?,
        expiration_epoch_seconds: item.number(TTL_ATTR)?,
    })
}
