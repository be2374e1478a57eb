//! Aggregate rollup buckets and period listings.
//!
//! Item layout:
//! - partition: `<deviceId>#<unit>`, sort: bucket start (ms)
//! - `cloudDensityMillis`, `deviceDensityMillis`, `createdAt`, `lastUpdated`
//!
//! Listings group buckets into periods of `increment_millis` anchored at the
//! requested start time, and always return every period of the range, even
//! ones with no stored bucket.

use std::sync::Arc;

use tracing::{debug, error};

use crate::aggregator;
use crate::config::{TimelineConfig, DEFAULT_MAX_PERIODS_PER_PAGE};
use crate::cursor;
use crate::error::{Result, TimelineError};
use crate::model::{AggregateBucket, DensityEvent, PaginatedResult, TimelinePeriod};
use crate::storage::{Item, ItemKey, ItemStore, RangeQuery};
use crate::time::{
    bucket_duration, is_bucket_aligned, next_period_boundary, partition_key, system_clock, Clock,
    TimeIncrementUnit,
};

const CLOUD_DENSITY_ATTR: &str = "cloudDensityMillis";
const DEVICE_DENSITY_ATTR: &str = "deviceDensityMillis";
const CREATED_AT_ATTR: &str = "createdAt";
const LAST_UPDATED_ATTR: &str = "lastUpdated";

/// Parameters of a period listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodQuery {
    pub device_id: String,
    pub unit: TimeIncrementUnit,
    /// First period starts here.
    pub start_time: i64,
    /// Exclusive end of the listing.
    pub end_time: i64,
    /// Period length; a positive multiple of the unit's bucket duration.
    pub increment_millis: i64,
    /// Token from the previous page, if any.
    pub next_token: Option<String>,
}

impl PeriodQuery {
    pub fn new(
        device_id: impl Into<String>,
        unit: TimeIncrementUnit,
        start_time: i64,
        end_time: i64,
        increment_millis: i64,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            unit,
            start_time,
            end_time,
            increment_millis,
            next_token: None,
        }
    }

    pub fn with_token(mut self, next_token: Option<String>) -> Self {
        self.next_token = next_token;
        self
    }
}

/// Store for aggregate buckets.
///
/// `save` is a plain read-modify-write: two writers racing on one bucket
/// can lose an update. Nothing here guards against that.
pub struct TimelineStore {
    store: Arc<dyn ItemStore>,
    page_size: Option<usize>,
    max_periods: usize,
    clock: Clock,
}

impl TimelineStore {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self {
            store,
            page_size: None,
            max_periods: DEFAULT_MAX_PERIODS_PER_PAGE,
            clock: system_clock(),
        }
    }

    pub fn from_config(store: Arc<dyn ItemStore>, config: &TimelineConfig) -> Self {
        Self::new(store)
            .with_page_size(config.query_page_size)
            .with_max_periods(config.max_periods_per_page)
    }

    /// Limit applied to every range read.
    pub fn with_page_size(mut self, page_size: Option<usize>) -> Self {
        self.page_size = page_size.map(|n| n.max(1));
        self
    }

    /// Most periods one listing page may hold.
    pub fn with_max_periods(mut self, max_periods: usize) -> Self {
        self.max_periods = max_periods.max(1);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Apply one density event to its bucket.
    ///
    /// Returns the bucket as persisted.
    pub async fn save(&self, event: &DensityEvent) -> Result<AggregateBucket> {
        let update = event.update();
        if !is_bucket_aligned(update.unit, update.bucket_start) {
            return Err(TimelineError::InvalidRequest(format!(
                "bucket start {} is not aligned to {}",
                update.bucket_start, update.unit
            )));
        }

        let old = self
            .load(&update.device_id, update.unit, update.bucket_start)
            .await?;

        let merged = aggregator::merge(event, old, (self.clock)()).map_err(|e| {
            error!(
                device_id = %update.device_id,
                unit = %update.unit,
                bucket_start = update.bucket_start,
                catchup = event.is_catchup(),
                error = %e,
                "Density bookkeeping is inconsistent"
            );
            e
        })?;

        self.store.put(to_item(&merged)?).await?;

        debug!(
            device_id = %merged.device_id,
            unit = %merged.unit,
            bucket_start = merged.bucket_start,
            cloud = merged.cloud_density_millis,
            device = merged.device_density_millis,
            "Saved aggregate bucket"
        );
        Ok(merged)
    }

    /// Point lookup of one bucket.
    pub async fn load(
        &self,
        device_id: &str,
        unit: TimeIncrementUnit,
        bucket_start: i64,
    ) -> Result<Option<AggregateBucket>> {
        let key = ItemKey::new(partition_key(device_id, unit), bucket_start);
        match self.store.get(&key).await? {
            Some(item) => Ok(Some(from_item(device_id, unit, &item)?)),
            None => Ok(None),
        }
    }

    /// One page of gap-free periods.
    ///
    /// A page never ends inside a period: when the store's page stops part
    /// way through one, a second bounded read completes it first. A page
    /// holds at most `max_periods` periods, so long empty stretches come
    /// back over several pages. Following
    /// `next_token` until it is `None` yields exactly the periods of a single
    /// unpaginated listing.
    #[tracing::instrument(
        name = "timeline.list_periods",
        skip_all,
        fields(device_id = %query.device_id, unit = %query.unit)
    )]
    pub async fn list_periods(&self, query: &PeriodQuery) -> Result<PaginatedResult> {
        let bucket = bucket_duration(query.unit);
        let start = query.start_time;
        let end = query.end_time;
        let increment = query.increment_millis;

        if increment <= 0 || increment % bucket != 0 {
            return Err(TimelineError::InvalidRequest(format!(
                "increment {}ms is not a positive multiple of the {} bucket ({}ms)",
                increment, query.unit, bucket
            )));
        }
        if start >= end {
            return Err(TimelineError::InvalidRequest(format!(
                "start {} is not before end {}",
                start, end
            )));
        }

        let partition = partition_key(&query.device_id, query.unit);
        let resume = query
            .next_token
            .as_deref()
            .map(|token| cursor::decode(token, &partition))
            .transpose()?;

        let start_period = match &resume {
            Some(key) => {
                if key.sort < start || key.sort >= end {
                    return Err(TimelineError::InvalidToken(format!(
                        "token position {} is outside [{}, {})",
                        key.sort, start, end
                    )));
                }
                next_period_boundary(start, increment, key.sort).ok_or_else(|| {
                    TimelineError::InvalidToken(format!(
                        "token position {} has no following period",
                        key.sort
                    ))
                })?
            }
            None => start,
        };
        if start_period >= end {
            return Ok(PaginatedResult::default());
        }

        // A bucket starting after `end - bucket` would run past `end`.
        let query_end = end.checked_sub(bucket).ok_or_else(|| {
            TimelineError::InvalidRequest(format!("end {} is too far in the past", end))
        })?;

        let mut items: Vec<Item> = Vec::new();
        let mut more: Option<ItemKey> = None;
        if query_end >= start {
            let mut start_after = resume.clone();
            loop {
                let page = self
                    .store
                    .query_range(
                        RangeQuery::new(partition.clone(), start, query_end)
                            .start_after(start_after)
                            .limit(self.page_size),
                    )
                    .await?;
                items = page.items;
                more = page.last_evaluated;
                if !items.is_empty() || more.is_none() {
                    break;
                }
                start_after = more.clone();
            }
        }

        let last_sort = items.last().map(|item| item.key.sort);
        let data_end = match (more.clone(), last_sort) {
            (Some(store_cursor), Some(last_sort)) => {
                // Past i64::MAX means past `end` too.
                let period_end = next_period_boundary(start, increment, last_sort)
                    .map_or(end, |boundary| boundary.min(end));

                // The trailing period may continue on the store's next page.
                if last_sort + bucket < period_end {
                    let upper = (period_end - 1).min(query_end);
                    let mut start_after = Some(store_cursor);
                    let mut reads = 0usize;
                    while let Some(after) = start_after.take() {
                        let page = self
                            .store
                            .query_range(
                                RangeQuery::new(partition.clone(), start, upper)
                                    .start_after(Some(after))
                                    .limit(self.page_size),
                            )
                            .await?;
                        reads += 1;
                        items.extend(page.items);
                        start_after = page.last_evaluated;
                    }
                    debug!(
                        period_end,
                        reads,
                        "Completed period spilling past the store page"
                    );
                }
                period_end
            }
            _ => end,
        };

        // Never emit more than `max_periods` periods, however sparse the data.
        let period_cap = i64::try_from(self.max_periods)
            .ok()
            .and_then(|n| n.checked_mul(increment))
            .and_then(|span| start_period.checked_add(span));
        let (end_period, capped) = match period_cap {
            Some(cap) if cap < data_end => (cap, true),
            _ => (data_end, false),
        };

        let buckets = items
            .iter()
            .map(|item| from_item(&query.device_id, query.unit, item))
            .collect::<Result<Vec<_>>>()?;
        let results = fold_periods(&buckets, start_period, end_period, increment);

        let next_token = if capped {
            // Resumes at `end_period`; buckets from there on are read again.
            Some(cursor::encode(&ItemKey::new(partition, end_period - 1)))
        } else if more.is_some() && end_period < end {
            items.last().map(|item| cursor::encode(&item.key))
        } else {
            None
        };

        debug!(
            periods = results.len(),
            buckets = buckets.len(),
            capped,
            has_more = next_token.is_some(),
            "Listed timeline periods"
        );

        Ok(PaginatedResult {
            results,
            next_token,
        })
    }
}

/// Sum sorted buckets into every period of `[start_period, end_period)`.
fn fold_periods(
    buckets: &[AggregateBucket],
    start_period: i64,
    end_period: i64,
    increment: i64,
) -> Vec<TimelinePeriod> {
    let mut results = Vec::new();
    let mut remaining = buckets.iter().peekable();
    let mut period_start = start_period;

    while period_start < end_period {
        let period_end = period_start.saturating_add(increment);
        let mut period = TimelinePeriod::empty(period_start);
        while let Some(bucket) = remaining.next_if(|b| b.bucket_start < period_end) {
            if bucket.bucket_start >= period_start {
                period.absorb(bucket);
            }
        }
        results.push(period);
        period_start = period_end;
    }

    results
}

fn to_item(bucket: &AggregateBucket) -> Result<Item> {
    let as_number = |value: u64| {
        i64::try_from(value).map_err(|_| {
            TimelineError::InvalidRequest(format!("density {}ms does not fit a stored number", value))
        })
    };
    Ok(Item::new(ItemKey::new(
        partition_key(&bucket.device_id, bucket.unit),
        bucket.bucket_start,
    ))
    .with_number(CLOUD_DENSITY_ATTR, as_number(bucket.cloud_density_millis)?)
    .with_number(DEVICE_DENSITY_ATTR, as_number(bucket.device_density_millis)?)
    .with_number(CREATED_AT_ATTR, bucket.created_at)
    .with_number(LAST_UPDATED_ATTR, bucket.last_updated))
}

fn from_item(device_id: &str, unit: TimeIncrementUnit, item: &Item) -> Result<AggregateBucket> {
    Ok(AggregateBucket {
        device_id: device_id.to_string(),
        unit,
        bucket_start: item.key.sort,
        cloud_density_millis: item.unsigned(CLOUD_DENSITY_ATTR)?,
        device_density_millis: item.unsigned(DEVICE_DENSITY_ATTR)?,
        created_at: item.number(CREATED_AT_ATTR)?,
        last_updated: item.number(LAST_UPDATED_ATTR)?,
    })
}
