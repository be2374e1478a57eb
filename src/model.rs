//! Domain types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::time::TimeIncrementUnit;

/// Where a span of recorded video currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoLocation {
    Device,
    Cloud,
}

impl VideoLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoLocation::Device => "DEVICE",
            VideoLocation::Cloud => "CLOUD",
        }
    }

    /// The location a catchup for `self` moves density away from.
    pub fn other(&self) -> VideoLocation {
        match self {
            VideoLocation::Device => VideoLocation::Cloud,
            VideoLocation::Cloud => VideoLocation::Device,
        }
    }
}

impl fmt::Display for VideoLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEVICE" => Ok(VideoLocation::Device),
            "CLOUD" => Ok(VideoLocation::Cloud),
            other => Err(format!("unknown video location: {}", other)),
        }
    }
}

/// One density fact per (device, fragment timestamp).
///
/// Once a record says `Cloud` it is never rewritten to `Device`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDensityRecord {
    pub device_id: String,
    pub timestamp: i64,
    pub duration_millis: u64,
    pub location: VideoLocation,
    pub created_at: i64,
    pub last_updated: i64,
    pub expiration_epoch_seconds: i64,
}

/// Rollup of density for one device, unit and bucket.
///
/// `cloud_density_millis + device_density_millis` never exceeds the
/// bucket's duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateBucket {
    pub device_id: String,
    pub unit: TimeIncrementUnit,
    pub bucket_start: i64,
    pub cloud_density_millis: u64,
    pub device_density_millis: u64,
    pub created_at: i64,
    pub last_updated: i64,
}

impl AggregateBucket {
    /// Empty bucket, stamped `now`.
    pub fn empty(device_id: &str, unit: TimeIncrementUnit, bucket_start: i64, now: i64) -> Self {
        Self {
            device_id: device_id.to_string(),
            unit,
            bucket_start,
            cloud_density_millis: 0,
            device_density_millis: 0,
            created_at: now,
            last_updated: now,
        }
    }

    pub fn density(&self, location: VideoLocation) -> u64 {
        match location {
            VideoLocation::Device => self.device_density_millis,
            VideoLocation::Cloud => self.cloud_density_millis,
        }
    }

    pub fn density_mut(&mut self, location: VideoLocation) -> &mut u64 {
        match location {
            VideoLocation::Device => &mut self.device_density_millis,
            VideoLocation::Cloud => &mut self.cloud_density_millis,
        }
    }

    pub fn total_density_millis(&self) -> u64 {
        self.cloud_density_millis + self.device_density_millis
    }
}

/// Payload shared by both kinds of density event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DensityUpdate {
    pub device_id: String,
    #[serde(rename = "timeIncrementUnit")]
    pub unit: TimeIncrementUnit,
    #[serde(rename = "bucketStartTime")]
    pub bucket_start: i64,
    pub duration_millis: u64,
    pub location: VideoLocation,
}

/// Incoming change to one aggregate bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DensityEvent {
    /// Newly observed video, added to `location`.
    Increment(DensityUpdate),
    /// Video already counted elsewhere, moved to `location`.
    Catchup(DensityUpdate),
}

impl DensityEvent {
    /// Build an event from the boolean form used by upstream producers.
    pub fn from_flags(update: DensityUpdate, is_catchup: bool) -> Self {
        if is_catchup {
            DensityEvent::Catchup(update)
        } else {
            DensityEvent::Increment(update)
        }
    }

    pub fn update(&self) -> &DensityUpdate {
        match self {
            DensityEvent::Increment(update) | DensityEvent::Catchup(update) => update,
        }
    }

    pub fn is_catchup(&self) -> bool {
        matches!(self, DensityEvent::Catchup(_))
    }
}

/// One period of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePeriod {
    pub period_start: i64,
    pub density_millis: u64,
    pub cloud_density_millis: u64,
    pub device_density_millis: u64,
}

impl TimelinePeriod {
    pub fn empty(period_start: i64) -> Self {
        Self {
            period_start,
            density_millis: 0,
            cloud_density_millis: 0,
            device_density_millis: 0,
        }
    }

    pub(crate) fn absorb(&mut self, bucket: &AggregateBucket) {
        self.cloud_density_millis += bucket.cloud_density_millis;
        self.device_density_millis += bucket.device_density_millis;
        self.density_millis += bucket.total_density_millis();
    }
}

/// A page of periods plus the token for the next page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResult {
    pub results: Vec<TimelinePeriod>,
    pub next_token: Option<String>,
}

/// A page of raw records plus the token for the next page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPage {
    pub records: Vec<RawDensityRecord>,
    pub next_token: Option<String>,
}
