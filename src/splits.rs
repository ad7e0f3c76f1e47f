//! Split derivation. A split exists only between two consecutive recorded
//! completions; a missing predecessor timestamp breaks the chain and no
//! split is emitted for that hop.

use chrono::{DateTime, Utc};

use crate::catalog::StationCatalog;
use crate::error::{EngineError, Result};
use crate::models::{Athlete, Split, Station};

/// Split ending at `station` (position `station_index`), starting at the
/// previous station's completion time. `None` for the first station or when
/// the predecessor timestamp is not on record.
pub fn derive_split(
    catalog: &StationCatalog,
    athlete: &Athlete,
    station: &Station,
    station_index: usize,
    now: DateTime<Utc>,
) -> Result<Option<Split>> {
    if station_index == 0 {
        return Ok(None);
    }
    let previous = match catalog.station_at(station_index - 1) {
        Some(s) => s,
        None => return Ok(None),
    };
    let started_at = match athlete.station_times.get(&previous.id) {
        Some(t) => *t,
        None => return Ok(None),
    };
    if now < started_at {
        return Err(EngineError::Validation(format!(
            "ping timestamp {} precedes completion of station {} at {}",
            now, previous.id, started_at
        )));
    }
    let duration = now.signed_duration_since(started_at);
    Ok(Some(Split {
        event_id: athlete.event_id,
        athlete_id: athlete.id,
        station_id: station.id.clone(),
        station_index: station_index as i32,
        started_at,
        ended_at: now,
        duration_ms: duration.num_milliseconds(),
    }))
}

/// Total elapsed time over all recorded splits, `None` when no split exists.
/// This is not `finished_at - started_at`: splits only accumulate between
/// consecutive recorded completions.
pub fn total_ms(splits: &[Split]) -> Option<i64> {
    if splits.is_empty() {
        None
    } else {
        Some(splits.iter().map(|s| s.duration_ms).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_total_without_splits() {
        assert_eq!(total_ms(&[]), None);
    }
}
