//! Time and bucket arithmetic.
//!
//! All timestamps are epoch milliseconds. Buckets are aligned to the epoch
//! in multiples of their unit's duration.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Prefix separating the raw keyspace from the aggregate keyspace.
pub const RAW_PARTITION_PREFIX: &str = "raw";
/// Separator between key components.
pub const KEY_SEPARATOR: char = '#';

pub const MILLIS_PER_SECOND: i64 = 1_000;
pub const MILLIS_PER_MINUTE: i64 = 60 * MILLIS_PER_SECOND;
pub const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;
pub const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Granularity of an aggregate bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeIncrementUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeIncrementUnit {
    pub const ALL: [TimeIncrementUnit; 4] = [
        TimeIncrementUnit::Seconds,
        TimeIncrementUnit::Minutes,
        TimeIncrementUnit::Hours,
        TimeIncrementUnit::Days,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeIncrementUnit::Seconds => "SECONDS",
            TimeIncrementUnit::Minutes => "MINUTES",
            TimeIncrementUnit::Hours => "HOURS",
            TimeIncrementUnit::Days => "DAYS",
        }
    }
}

impl fmt::Display for TimeIncrementUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeIncrementUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeIncrementUnit::ALL
            .into_iter()
            .find(|unit| unit.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown time increment unit: {}", s))
    }
}

/// Wall-clock length of one bucket of `unit`.
pub fn bucket_duration(unit: TimeIncrementUnit) -> i64 {
    match unit {
        TimeIncrementUnit::Seconds => MILLIS_PER_SECOND,
        TimeIncrementUnit::Minutes => MILLIS_PER_MINUTE,
        TimeIncrementUnit::Hours => MILLIS_PER_HOUR,
        TimeIncrementUnit::Days => MILLIS_PER_DAY,
    }
}

/// Partition key of the aggregate keyspace: `<deviceId>#<unit>`.
pub fn partition_key(device_id: &str, unit: TimeIncrementUnit) -> String {
    format!("{}{}{}", device_id, KEY_SEPARATOR, unit)
}

/// Partition key of the raw keyspace: `raw#<deviceId>`.
///
/// Raw facts and rollups are written through separate stores (normally
/// separate tables), so the two keyspaces never share items.
pub fn raw_partition_key(device_id: &str) -> String {
    format!("{}{}{}", RAW_PARTITION_PREFIX, KEY_SEPARATOR, device_id)
}

/// Smallest `origin + k * increment` strictly greater than `timestamp`.
///
/// `None` when `increment` is not positive or the boundary does not fit
/// an `i64`.
pub fn next_period_boundary(origin: i64, increment: i64, timestamp: i64) -> Option<i64> {
    if increment <= 0 {
        return None;
    }
    let k = timestamp
        .checked_sub(origin)?
        .div_euclid(increment)
        .checked_add(1)?;
    origin.checked_add(k.checked_mul(increment)?)
}

/// Start of the bucket of `unit` containing `timestamp`.
pub fn bucket_floor(unit: TimeIncrementUnit, timestamp: i64) -> i64 {
    timestamp - timestamp.rem_euclid(bucket_duration(unit))
}

pub fn is_bucket_aligned(unit: TimeIncrementUnit, timestamp: i64) -> bool {
    timestamp.rem_euclid(bucket_duration(unit)) == 0
}

/// Expiry of a raw record, in epoch seconds, `retention_days` after its fragment.
pub fn ttl_epoch_seconds(timestamp_millis: i64, retention_days: u32) -> i64 {
    timestamp_millis.div_euclid(MILLIS_PER_SECOND) + i64::from(retention_days) * SECONDS_PER_DAY
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Source of `createdAt` / `lastUpdated` stamps.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(now_millis)
}

/// Clock that always reads `millis`.
pub fn fixed_clock(millis: i64) -> Clock {
    Arc::new(move || millis)
}
