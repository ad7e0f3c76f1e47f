//! Caller-facing operation surface. Every operation reads current state,
//! runs the pure transition, and commits the resulting facts as one atomic
//! batch guarded on the progress value it observed; concurrent writers for
//! the same athlete lose the commit instead of corrupting state.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::admin;
use crate::catalog::StationCatalog;
use crate::clock::Clock;
use crate::error::{EngineError, Result};
use crate::models::{Athlete, AthleteId, Event, EventId, EventStatus, Station};
use crate::progress::{self, PingOutcome};
use crate::ranking::{self, LeaderboardRow, ResultRow};
use crate::store::{RecordStore, StoreError, WriteOp};

pub struct Engine {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
}

impl Engine {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Engine { store, clock }
    }

    pub fn create_event(&self, name: &str, stations: Vec<Station>) -> Result<Event> {
        if stations.is_empty() {
            return Err(EngineError::Validation(
                "an event needs at least one station".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for station in &stations {
            if station.id.trim().is_empty() {
                return Err(EngineError::Validation(
                    "station ids must not be empty".to_string(),
                ));
            }
            if !seen.insert(station.id.as_str()) {
                return Err(EngineError::Validation(format!(
                    "duplicate station id {}",
                    station.id
                )));
            }
        }
        let event = self.store.insert_event(name, stations)?;
        info!(
            "created event {} ({}) with {} stations",
            event.id,
            event.name,
            event.stations.len()
        );
        Ok(event)
    }

    pub fn start_event(&self, event_id: EventId) -> Result<Event> {
        self.transition_event(event_id, EventStatus::Upcoming, EventStatus::Active)
    }

    pub fn stop_event(&self, event_id: EventId) -> Result<Event> {
        self.transition_event(event_id, EventStatus::Active, EventStatus::Completed)
    }

    fn transition_event(
        &self,
        event_id: EventId,
        from: EventStatus,
        to: EventStatus,
    ) -> Result<Event> {
        let mut event = self.store.get_event(event_id)?;
        if event.status != from {
            return Err(EngineError::EventTransition {
                event_id,
                from: event.status,
                requested: to,
            });
        }
        let now = self.clock.now();
        event.status = to;
        match to {
            EventStatus::Active => event.started_at = Some(now),
            EventStatus::Completed => event.ended_at = Some(now),
            EventStatus::Upcoming => {}
        }
        self.store.commit_atomic(vec![WriteOp::PutEvent(event.clone())])?;
        info!("event {} is now {}", event_id, to);
        Ok(event)
    }

    /// Records one checkpoint completion. Preconditions are checked in a
    /// fixed order so each failure mode is a distinct, reportable error.
    pub fn record_ping(
        &self,
        event_id: EventId,
        athlete_id: AthleteId,
        station_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PingOutcome> {
        let event = self.store.get_event(event_id)?;
        if event.status != EventStatus::Active {
            return Err(EngineError::EventNotActive {
                event_id,
                status: event.status,
            });
        }
        let catalog = StationCatalog::for_event(&event);
        catalog.index_of(station_id)?;
        let athlete = self.store.get_athlete(event_id, athlete_id)?;

        let transition = progress::advance(&catalog, &athlete, station_id, now)?;

        // The ping facts must agree with the athlete's own record; an
        // existing fact means the completion already stands.
        if !self
            .store
            .query_pings(event_id, athlete_id, Some(station_id))?
            .is_empty()
        {
            return Err(EngineError::DuplicateCompletion {
                station_id: station_id.to_string(),
            });
        }

        let mut ops = vec![WriteOp::InsertPing(transition.ping.clone())];
        if let Some(split) = &transition.split {
            ops.push(WriteOp::InsertSplit(split.clone()));
        }
        ops.push(WriteOp::PutAthlete {
            athlete: transition.athlete.clone(),
            expect_progress: Some(athlete.progress),
        });

        match self.store.commit_atomic(ops) {
            Ok(()) => {}
            Err(StoreError::Conflict) => {
                warn!(
                    "lost commit race for athlete {} at station {}",
                    athlete_id, station_id
                );
                return Err(self.explain_ping_conflict(&catalog, event_id, athlete_id, station_id)?);
            }
            Err(err) => return Err(err.into()),
        }

        info!(
            "athlete {} completed station {} in event {} (progress {})",
            athlete_id, station_id, event_id, transition.outcome.progress
        );
        if transition.outcome.finished {
            info!("athlete {} finished event {}", athlete_id, event_id);
        }
        Ok(transition.outcome)
    }

    /// A guarded commit lost a race. Re-read once and report the state the
    /// winner left behind, so a retried duplicate resolves to
    /// `DuplicateCompletion` rather than a second completion.
    fn explain_ping_conflict(
        &self,
        catalog: &StationCatalog,
        event_id: EventId,
        athlete_id: AthleteId,
        station_id: &str,
    ) -> Result<EngineError> {
        let athlete = self.store.get_athlete(event_id, athlete_id)?;
        if athlete.station_times.contains_key(station_id) {
            return Ok(EngineError::DuplicateCompletion {
                station_id: station_id.to_string(),
            });
        }
        match catalog.station_at(athlete.progress.max(0) as usize) {
            None => Ok(EngineError::AlreadyFinished { athlete_id }),
            Some(expected) if expected.id != station_id => Ok(EngineError::OutOfOrderStation {
                expected: expected.id.clone(),
                attempted: station_id.to_string(),
            }),
            Some(_) => Ok(EngineError::Store(StoreError::Conflict)),
        }
    }

    /// Reverses the athlete's most recent completion.
    pub fn undo(&self, event_id: EventId, athlete_id: AthleteId) -> Result<Athlete> {
        let event = self.store.get_event(event_id)?;
        let catalog = StationCatalog::for_event(&event);
        let athlete = self.store.get_athlete(event_id, athlete_id)?;

        let transition = admin::undo(&catalog, &athlete)?;
        self.store.commit_atomic(vec![
            WriteOp::DeletePing {
                event_id,
                athlete_id,
                station_id: transition.station_id.clone(),
            },
            WriteOp::DeleteSplit {
                event_id,
                athlete_id,
                station_id: transition.station_id.clone(),
            },
            WriteOp::PutAthlete {
                athlete: transition.athlete.clone(),
                expect_progress: Some(athlete.progress),
            },
        ])?;
        info!(
            "undid station {} for athlete {} in event {}",
            transition.station_id, athlete_id, event_id
        );
        Ok(transition.athlete)
    }

    /// Wipes the athlete's entire record back to registration state.
    pub fn reset(&self, event_id: EventId, athlete_id: AthleteId) -> Result<Athlete> {
        let athlete = self.store.get_athlete(event_id, athlete_id)?;
        let fresh = admin::reset(&athlete);
        self.store.commit_atomic(vec![
            WriteOp::ClearFacts {
                event_id,
                athlete_id,
            },
            WriteOp::PutAthlete {
                athlete: fresh.clone(),
                expect_progress: Some(athlete.progress),
            },
        ])?;
        info!("reset athlete {} in event {}", athlete_id, event_id);
        Ok(fresh)
    }

    pub fn disqualify(&self, event_id: EventId, athlete_id: AthleteId) -> Result<Athlete> {
        let athlete = self.store.get_athlete(event_id, athlete_id)?;
        let dnf = admin::disqualify(&athlete)?;
        self.store.commit_atomic(vec![WriteOp::PutAthlete {
            athlete: dnf.clone(),
            expect_progress: Some(athlete.progress),
        }])?;
        info!("athlete {} marked dnf in event {}", athlete_id, event_id);
        Ok(dnf)
    }

    /// Live standing. The roster and split reads are independent, so a
    /// concurrent ping may show through as slightly stale data.
    pub fn leaderboard(&self, event_id: EventId) -> Result<Vec<LeaderboardRow>> {
        self.store.get_event(event_id)?;
        let athletes = self.store.list_athletes(event_id)?;
        let splits = self.store.query_splits(event_id, None)?;
        Ok(ranking::leaderboard(athletes, &splits))
    }

    pub fn results(&self, event_id: EventId) -> Result<Vec<ResultRow>> {
        self.store.get_event(event_id)?;
        let athletes = self.store.list_athletes(event_id)?;
        let splits = self.store.query_splits(event_id, None)?;
        Ok(ranking::results(athletes, splits))
    }
}
