//! Athlete progress state machine. `advance` validates a ping against the
//! current athlete record and computes the complete transition without
//! touching the store; the engine commits the result atomically.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::StationCatalog;
use crate::error::{EngineError, Result};
use crate::models::{Athlete, AthleteStatus, Ping, Split};
use crate::splits;

/// Success payload of a recorded ping.
#[derive(Debug, Clone, Serialize)]
pub struct PingOutcome {
    pub progress: i32,
    pub split_ms: Option<i64>,
    pub finished: bool,
}

/// Everything one successful ping changes.
pub struct PingTransition {
    pub athlete: Athlete,
    pub ping: Ping,
    pub split: Option<Split>,
    pub outcome: PingOutcome,
}

/// Validates the ping and produces the advanced athlete state plus the facts
/// to append. Event-level preconditions (active status, known station) are
/// the caller's job; everything athlete-level is checked here, in order.
pub fn advance(
    catalog: &StationCatalog,
    athlete: &Athlete,
    station_id: &str,
    now: DateTime<Utc>,
) -> Result<PingTransition> {
    if athlete.status == AthleteStatus::Dnf {
        return Err(EngineError::Disqualified {
            athlete_id: athlete.id,
        });
    }

    let position = athlete.progress.max(0) as usize;
    let expected = match catalog.station_at(position) {
        Some(station) => station,
        None => {
            return Err(EngineError::AlreadyFinished {
                athlete_id: athlete.id,
            })
        }
    };
    // A station already on record is a repeat delivery, not an ordering
    // violation, so this check comes before the expected-station comparison.
    if athlete.station_times.contains_key(station_id) {
        return Err(EngineError::DuplicateCompletion {
            station_id: station_id.to_string(),
        });
    }
    if expected.id != station_id {
        return Err(EngineError::OutOfOrderStation {
            expected: expected.id.clone(),
            attempted: station_id.to_string(),
        });
    }

    let split = splits::derive_split(catalog, athlete, expected, position, now)?;
    let ping = Ping {
        event_id: athlete.event_id,
        athlete_id: athlete.id,
        station_id: expected.id.clone(),
        station_index: position as i32,
        recorded_at: now,
    };

    let mut next = athlete.clone();
    next.station_times.insert(expected.id.clone(), now);
    next.progress = (position + 1) as i32;
    let finished = position + 1 == catalog.len();
    if finished {
        next.status = AthleteStatus::Finished;
        next.finished_at = Some(now);
    } else if next.status == AthleteStatus::Ready {
        next.status = AthleteStatus::Active;
    }

    let outcome = PingOutcome {
        progress: next.progress,
        split_ms: split.as_ref().map(|s| s.duration_ms),
        finished,
    };
    Ok(PingTransition {
        athlete: next,
        ping,
        split,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{Duration, TimeZone};

    use crate::models::{Event, EventStatus, Station};

    use super::*;

    fn catalog() -> StationCatalog {
        let stations = ["s0", "s1", "s2"]
            .iter()
            .map(|id| Station {
                id: id.to_string(),
                name: format!("Station {}", id),
                kind: None,
            })
            .collect();
        StationCatalog::for_event(&Event {
            id: 1,
            name: "Ridge run".into(),
            status: EventStatus::Active,
            stations,
            started_at: None,
            ended_at: None,
        })
    }

    fn athlete() -> Athlete {
        Athlete {
            id: 10,
            event_id: 1,
            name: "Asta".into(),
            progress: 0,
            station_times: HashMap::new(),
            status: AthleteStatus::Ready,
            finished_at: None,
        }
    }

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::milliseconds(ms)
    }

    #[test]
    fn first_ping_activates_without_a_split() {
        let transition = advance(&catalog(), &athlete(), "s0", t(0)).unwrap();
        assert_eq!(transition.outcome.progress, 1);
        assert_eq!(transition.outcome.split_ms, None);
        assert!(!transition.outcome.finished);
        assert_eq!(transition.athlete.status, AthleteStatus::Active);
        assert_eq!(transition.ping.station_index, 0);
    }

    #[test]
    fn consecutive_ping_emits_a_split() {
        let catalog = catalog();
        let first = advance(&catalog, &athlete(), "s0", t(0)).unwrap();
        let second = advance(&catalog, &first.athlete, "s1", t(1000)).unwrap();
        assert_eq!(second.outcome.split_ms, Some(1000));
        let split = second.split.unwrap();
        assert_eq!(split.station_id, "s1");
        assert_eq!(split.started_at, t(0));
        assert_eq!(split.ended_at, t(1000));
    }

    #[test]
    fn final_ping_finishes_the_athlete() {
        let catalog = catalog();
        let mut current = athlete();
        for (station, at) in [("s0", 0), ("s1", 1000)] {
            current = advance(&catalog, &current, station, t(at)).unwrap().athlete;
        }
        let last = advance(&catalog, &current, "s2", t(1500)).unwrap();
        assert!(last.outcome.finished);
        assert_eq!(last.outcome.progress, 3);
        assert_eq!(last.athlete.status, AthleteStatus::Finished);
        assert_eq!(last.athlete.finished_at, Some(t(1500)));
    }

    #[test]
    fn skipping_ahead_is_out_of_order() {
        let err = advance(&catalog(), &athlete(), "s2", t(0)).unwrap_err();
        match err {
            EngineError::OutOfOrderStation {
                expected,
                attempted,
            } => {
                assert_eq!(expected, "s0");
                assert_eq!(attempted, "s2");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn repeating_a_completed_station_is_a_duplicate() {
        let catalog = catalog();
        let first = advance(&catalog, &athlete(), "s0", t(0)).unwrap();
        let second = advance(&catalog, &first.athlete, "s1", t(1000)).unwrap();
        let err = advance(&catalog, &second.athlete, "s0", t(1200)).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateCompletion { .. }));
    }

    #[test]
    fn any_ping_after_finishing_is_already_finished() {
        let catalog = catalog();
        let mut current = athlete();
        for (station, at) in [("s0", 0), ("s1", 1000), ("s2", 1500)] {
            current = advance(&catalog, &current, station, t(at)).unwrap().athlete;
        }
        let err = advance(&catalog, &current, "s1", t(2000)).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyFinished { athlete_id: 10 }));
    }

    #[test]
    fn missing_predecessor_breaks_the_split_chain() {
        // A record with a gap (should not happen, but the ledger must not
        // invent a split from it).
        let mut gappy = athlete();
        gappy.progress = 2;
        gappy.status = AthleteStatus::Active;
        gappy.station_times.insert("s0".into(), t(0));

        let transition = advance(&catalog(), &gappy, "s2", t(2000)).unwrap();
        assert_eq!(transition.outcome.split_ms, None);
        assert!(transition.split.is_none());
    }

    #[test]
    fn backwards_timestamp_is_rejected() {
        let catalog = catalog();
        let first = advance(&catalog, &athlete(), "s0", t(1000)).unwrap();
        let err = advance(&catalog, &first.athlete, "s1", t(500)).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn dnf_blocks_any_ping() {
        let mut dnf = athlete();
        dnf.status = AthleteStatus::Dnf;
        let err = advance(&catalog(), &dnf, "s0", t(0)).unwrap_err();
        assert!(matches!(err, EngineError::Disqualified { athlete_id: 10 }));
    }
}
