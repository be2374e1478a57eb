//! Bucket merging.
//!
//! Pure: given the stored bucket (if any) and one density event, compute
//! the bucket to store next. Nothing here touches storage.

use crate::model::{AggregateBucket, DensityEvent, VideoLocation};
use crate::time::{bucket_duration, TimeIncrementUnit};

/// Internal-consistency violations. Never retryable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsistencyError {
    #[error(
        "Bucket overflow: {unit} bucket at {bucket_start} would hold {total}ms, capacity is {capacity}ms"
    )]
    BucketOverflow {
        unit: TimeIncrementUnit,
        bucket_start: i64,
        total: u64,
        capacity: u64,
    },

    #[error(
        "Catchup at {bucket_start} needs {requested}ms of {location} density, only {available}ms recorded"
    )]
    InsufficientDensity {
        location: VideoLocation,
        bucket_start: i64,
        available: u64,
        requested: u64,
    },
}

/// Apply `event` to `old`, producing the bucket to persist.
///
/// - No bucket yet: the whole duration goes to the event's location.
/// - Increment: the duration is added to the event's location.
/// - Catchup: the duration moves from the other location to the event's
///   location; the total is unchanged.
///
/// `created_at` survives from `old`; `last_updated` becomes `now`.
pub fn merge(
    event: &DensityEvent,
    old: Option<AggregateBucket>,
    now: i64,
) -> Result<AggregateBucket, ConsistencyError> {
    let update = event.update();

    let Some(mut bucket) = old else {
        let mut bucket =
            AggregateBucket::empty(&update.device_id, update.unit, update.bucket_start, now);
        *bucket.density_mut(update.location) = update.duration_millis;
        check_capacity(&bucket)?;
        return Ok(bucket);
    };

    match event {
        DensityEvent::Increment(_) => {
            let field = bucket.density_mut(update.location);
            *field = field.saturating_add(update.duration_millis);
        }
        DensityEvent::Catchup(_) => {
            let source = update.location.other();
            let available = bucket.density(source);
            if available < update.duration_millis {
                return Err(ConsistencyError::InsufficientDensity {
                    location: source,
                    bucket_start: update.bucket_start,
                    available,
                    requested: update.duration_millis,
                });
            }
            *bucket.density_mut(source) = available - update.duration_millis;
            let target = bucket.density_mut(update.location);
            *target = target.saturating_add(update.duration_millis);
        }
    }

    check_capacity(&bucket)?;
    bucket.last_updated = now;
    Ok(bucket)
}

fn check_capacity(bucket: &AggregateBucket) -> Result<(), ConsistencyError> {
    let capacity = bucket_duration(bucket.unit).unsigned_abs();
    let total = bucket
        .cloud_density_millis
        .saturating_add(bucket.device_density_millis);
    if total > capacity {
        return Err(ConsistencyError::BucketOverflow {
            unit: bucket.unit,
            bucket_start: bucket.bucket_start,
            total,
            capacity,
        });
    }
    Ok(())
}
