//! density-timeline: replay density events and print a period listing.
//!
//! Reads JSON-lines `DensityEvent`s from stdin, applies each to its
//! aggregate bucket, then prints every page of the requested listing to
//! stdout, one JSON document per page.
//!
//! An unparsable input line aborts the run before anything is applied.
//! With `--skip-invalid` such lines are logged and skipped instead.
//!
//! ## Usage
//! ```text
//! density-timeline [--skip-invalid] <device_id> <unit> <start_ms> <end_ms> <increment_ms>
//! ```
//!
//! ## Configuration
//! - DENSITY_CONFIG: YAML config file (storage backend, page sizes)
//! - DENSITY_LOG: tracing filter (default: info)

use tracing::{info, warn};

use video_density::config::Config;
use video_density::storage::init_storage;
use video_density::utils::bootstrap::init_tracing;
use video_density::utils::event_lines::read_event_lines;
use video_density::{PeriodQuery, TimeIncrementUnit, TimelineStore};

const USAGE: &str =
    "usage: density-timeline [--skip-invalid] <device_id> <unit> <start_ms> <end_ms> <increment_ms>";
const SKIP_INVALID_FLAG: &str = "--skip-invalid";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let skip_invalid = args.iter().any(|arg| arg == SKIP_INVALID_FLAG);
    args.retain(|arg| arg != SKIP_INVALID_FLAG);
    let [device_id, unit, start, end, increment] = args.as_slice() else {
        return Err(USAGE.into());
    };
    let unit: TimeIncrementUnit = unit.parse()?;
    let query = PeriodQuery::new(
        device_id.clone(),
        unit,
        start.parse()?,
        end.parse()?,
        increment.parse()?,
    );

    let config = Config::load(None)?;
    let stores = init_storage(&config.storage).await?;
    let timeline = TimelineStore::from_config(stores.aggregate, &config.timeline);

    let batch = read_event_lines(std::io::stdin().lock(), skip_invalid)?;
    if batch.skipped > 0 {
        warn!(skipped = batch.skipped, "Unparsable events were skipped");
    }

    for event in &batch.events {
        timeline.save(event).await?;
    }
    let applied = batch.events.len();
    info!(applied, "Density events applied");

    let mut next_token = None;
    loop {
        let page = timeline
            .list_periods(&query.clone().with_token(next_token))
            .await?;
        println!("{}", serde_json::to_string(&page)?);
        match page.next_token {
            Some(token) => next_token = Some(token),
            None => break,
        }
    }

    Ok(())
}
