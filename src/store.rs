use thiserror::Error;

use crate::error::Result;
use crate::models::{Athlete, AthleteId, Event, EventId, Ping, Split, Station};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A write guard or uniqueness constraint did not hold. The batch was
    /// rolled back in full; the caller may re-read and retry.
    #[error("commit conflict")]
    Conflict,

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("postgres: {0}")]
    Postgres(#[from] postgres::Error),

    #[error("connection pool: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),
}

/// One entry in an atomic commit batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    PutEvent(Event),
    /// Replace the athlete record. With `expect_progress` set, the write only
    /// applies while the stored progress still matches the value the caller
    /// read; a mismatch fails the whole batch with [`StoreError::Conflict`].
    PutAthlete {
        athlete: Athlete,
        expect_progress: Option<i32>,
    },
    InsertPing(Ping),
    DeletePing {
        event_id: EventId,
        athlete_id: AthleteId,
        station_id: String,
    },
    InsertSplit(Split),
    DeleteSplit {
        event_id: EventId,
        athlete_id: AthleteId,
        station_id: String,
    },
    /// Drop every ping and split fact recorded for one athlete.
    ClearFacts {
        event_id: EventId,
        athlete_id: AthleteId,
    },
}

/// Storage boundary of the engine. Point lookups, field-equality queries and
/// an all-or-nothing multi-record commit; no other capability is assumed.
pub trait RecordStore: Send + Sync {
    fn get_event(&self, event_id: EventId) -> Result<Event>;

    fn get_athlete(&self, event_id: EventId, athlete_id: AthleteId) -> Result<Athlete>;

    fn list_athletes(&self, event_id: EventId) -> Result<Vec<Athlete>>;

    fn query_pings(
        &self,
        event_id: EventId,
        athlete_id: AthleteId,
        station_id: Option<&str>,
    ) -> Result<Vec<Ping>>;

    fn query_splits(&self, event_id: EventId, athlete_id: Option<AthleteId>) -> Result<Vec<Split>>;

    /// Creates the event as `upcoming`. Id assignment belongs to the store.
    fn insert_event(&self, name: &str, stations: Vec<Station>) -> Result<Event>;

    /// Registers an athlete as `ready` with zero progress.
    fn insert_athlete(&self, event_id: EventId, name: &str) -> Result<Athlete>;

    /// Applies the batch as a single atomic unit: either every op commits or
    /// none does.
    fn commit_atomic(&self, ops: Vec<WriteOp>) -> std::result::Result<(), StoreError>;
}
