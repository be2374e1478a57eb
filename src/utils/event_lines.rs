//! JSON-lines decoding of density events.

use std::io::{self, BufRead};

use tracing::warn;

use crate::model::DensityEvent;

/// Events decoded from a JSON-lines stream.
#[derive(Debug, Default)]
pub struct EventLines {
    pub events: Vec<DensityEvent>,
    /// Unparsable lines dropped because skipping was allowed.
    pub skipped: usize,
}

/// Decode one `DensityEvent` per non-blank line.
///
/// An unparsable line fails the whole read with `InvalidData` unless
/// `skip_invalid` is set, in which case it is logged and counted.
pub fn read_event_lines<R: BufRead>(reader: R, skip_invalid: bool) -> io::Result<EventLines> {
    let mut batch = EventLines::default();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<DensityEvent>(&line) {
            Ok(event) => batch.events.push(event),
            Err(e) if skip_invalid => {
                warn!(line = index + 1, error = %e, "Skipping unparsable event");
                batch.skipped += 1;
            }
            Err(e) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("line {}: unparsable event: {}", index + 1, e),
                ))
            }
        }
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"{"kind":"increment","deviceId":"devA","timeIncrementUnit":"HOURS","bucketStartTime":0,"durationMillis":10,"location":"CLOUD"}"#;

    #[test]
    fn test_reads_events_and_ignores_blank_lines() {
        let input = format!("{}\n\n{}\n", GOOD, GOOD);
        let batch = read_event_lines(input.as_bytes(), false).unwrap();
        assert_eq!(batch.events.len(), 2);
        assert_eq!(batch.skipped, 0);
        assert!(!batch.events[0].is_catchup());
    }

    #[test]
    fn test_unparsable_line_fails_by_default() {
        let input = format!("{}\nnot json\n{}\n", GOOD, GOOD);
        let err = read_event_lines(input.as_bytes(), false).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_unparsable_lines_counted_when_skipping() {
        let input = format!("{}\nnot json\n{{}}\n{}\n", GOOD, GOOD);
        let batch = read_event_lines(input.as_bytes(), true).unwrap();
        assert_eq!(batch.events.len(), 2);
        assert_eq!(batch.skipped, 2);
    }
}
