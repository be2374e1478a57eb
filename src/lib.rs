//! Video density timelines.
//!
//! Tracks, per device and per time granularity, how much recorded video
//! exists and whether it lives on the device or in the cloud. Raw
//! per-fragment facts are rolled up into fixed-length buckets, and buckets
//! are listed back as gap-free, paginated period sequences.

pub mod aggregator;
pub mod config;
pub mod cursor;
pub mod error;
pub mod model;
pub mod raw_timeline;
pub mod storage;
pub mod time;
pub mod timeline;
pub mod utils;

pub use error::{Result, TimelineError};
pub use model::{
    AggregateBucket, DensityEvent, DensityUpdate, PaginatedResult, RawDensityRecord, RawPage,
    TimelinePeriod, VideoLocation,
};
pub use raw_timeline::RawTimelineStore;
pub use time::TimeIncrementUnit;
pub use timeline::{PeriodQuery, TimelineStore};
