//! In-process record store, used by the test suites and small demos. Shares
//! the exact commit semantics of the Postgres store: guards are checked
//! before any op applies, so a failed batch leaves no partial writes.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::{EngineError, Result};
use crate::models::{
    Athlete, AthleteId, AthleteStatus, Event, EventId, EventStatus, Ping, Split, Station,
};
use crate::store::{RecordStore, StoreError, WriteOp};

type FactKey = (EventId, AthleteId, String);

#[derive(Default)]
struct Tables {
    events: HashMap<EventId, Event>,
    athletes: HashMap<(EventId, AthleteId), Athlete>,
    pings: HashMap<FactKey, Ping>,
    splits: HashMap<FactKey, Split>,
    next_event_id: EventId,
    next_athlete_id: AthleteId,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn get_event(&self, event_id: EventId) -> Result<Event> {
        self.tables
            .lock()
            .events
            .get(&event_id)
            .cloned()
            .ok_or(EngineError::EventNotFound(event_id))
    }

    fn get_athlete(&self, event_id: EventId, athlete_id: AthleteId) -> Result<Athlete> {
        self.tables
            .lock()
            .athletes
            .get(&(event_id, athlete_id))
            .cloned()
            .ok_or(EngineError::AthleteNotFound {
                event_id,
                athlete_id,
            })
    }

    fn list_athletes(&self, event_id: EventId) -> Result<Vec<Athlete>> {
        let mut athletes: Vec<Athlete> = self
            .tables
            .lock()
            .athletes
            .values()
            .filter(|a| a.event_id == event_id)
            .cloned()
            .collect();
        athletes.sort_by_key(|a| a.id);
        Ok(athletes)
    }

    fn query_pings(
        &self,
        event_id: EventId,
        athlete_id: AthleteId,
        station_id: Option<&str>,
    ) -> Result<Vec<Ping>> {
        let mut pings: Vec<Ping> = self
            .tables
            .lock()
            .pings
            .values()
            .filter(|p| {
                p.event_id == event_id
                    && p.athlete_id == athlete_id
                    && station_id.map_or(true, |s| p.station_id == s)
            })
            .cloned()
            .collect();
        pings.sort_by_key(|p| p.station_index);
        Ok(pings)
    }

    fn query_splits(&self, event_id: EventId, athlete_id: Option<AthleteId>) -> Result<Vec<Split>> {
        let mut splits: Vec<Split> = self
            .tables
            .lock()
            .splits
            .values()
            .filter(|s| s.event_id == event_id && athlete_id.map_or(true, |a| s.athlete_id == a))
            .cloned()
            .collect();
        splits.sort_by_key(|s| (s.athlete_id, s.station_index));
        Ok(splits)
    }

    fn insert_event(&self, name: &str, stations: Vec<Station>) -> Result<Event> {
        let mut tables = self.tables.lock();
        tables.next_event_id += 1;
        let event = Event {
            id: tables.next_event_id,
            name: name.to_string(),
            status: EventStatus::Upcoming,
            stations,
            started_at: None,
            ended_at: None,
        };
        tables.events.insert(event.id, event.clone());
        Ok(event)
    }

    fn insert_athlete(&self, event_id: EventId, name: &str) -> Result<Athlete> {
        let mut tables = self.tables.lock();
        if !tables.events.contains_key(&event_id) {
            return Err(EngineError::EventNotFound(event_id));
        }
        tables.next_athlete_id += 1;
        let athlete = Athlete {
            id: tables.next_athlete_id,
            event_id,
            name: name.to_string(),
            progress: 0,
            station_times: HashMap::new(),
            status: AthleteStatus::Ready,
            finished_at: None,
        };
        tables
            .athletes
            .insert((event_id, athlete.id), athlete.clone());
        Ok(athlete)
    }

    fn commit_atomic(&self, ops: Vec<WriteOp>) -> std::result::Result<(), StoreError> {
        let mut tables = self.tables.lock();

        // Validate every guard and uniqueness constraint up front.
        for op in &ops {
            match op {
                WriteOp::PutAthlete {
                    athlete,
                    expect_progress: Some(expected),
                } => {
                    let stored = tables
                        .athletes
                        .get(&(athlete.event_id, athlete.id))
                        .ok_or(StoreError::Conflict)?;
                    if stored.progress != *expected {
                        return Err(StoreError::Conflict);
                    }
                }
                WriteOp::InsertPing(ping) => {
                    let key = (ping.event_id, ping.athlete_id, ping.station_id.clone());
                    if tables.pings.contains_key(&key) {
                        return Err(StoreError::Conflict);
                    }
                }
                WriteOp::InsertSplit(split) => {
                    let key = (split.event_id, split.athlete_id, split.station_id.clone());
                    if tables.splits.contains_key(&key) {
                        return Err(StoreError::Conflict);
                    }
                }
                _ => {}
            }
        }

        for op in ops {
            match op {
                WriteOp::PutEvent(event) => {
                    tables.events.insert(event.id, event);
                }
                WriteOp::PutAthlete { athlete, .. } => {
                    tables
                        .athletes
                        .insert((athlete.event_id, athlete.id), athlete);
                }
                WriteOp::InsertPing(ping) => {
                    let key = (ping.event_id, ping.athlete_id, ping.station_id.clone());
                    tables.pings.insert(key, ping);
                }
                WriteOp::DeletePing {
                    event_id,
                    athlete_id,
                    station_id,
                } => {
                    tables.pings.remove(&(event_id, athlete_id, station_id));
                }
                WriteOp::InsertSplit(split) => {
                    let key = (split.event_id, split.athlete_id, split.station_id.clone());
                    tables.splits.insert(key, split);
                }
                WriteOp::DeleteSplit {
                    event_id,
                    athlete_id,
                    station_id,
                } => {
                    tables.splits.remove(&(event_id, athlete_id, station_id));
                }
                WriteOp::ClearFacts {
                    event_id,
                    athlete_id,
                } => {
                    tables
                        .pings
                        .retain(|_, p| !(p.event_id == event_id && p.athlete_id == athlete_id));
                    tables
                        .splits
                        .retain(|_, s| !(s.event_id == event_id && s.athlete_id == athlete_id));
                }
            }
        }
        Ok(())
    }
}
