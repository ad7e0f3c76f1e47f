use thiserror::Error;

use crate::models::{AthleteId, EventId, EventStatus};
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, EngineError>;

/// All failures the engine reports to callers. Each variant carries the ids
/// and values a client needs to decide its next action.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed request, rejected before any state transition.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("event {0} not found")]
    EventNotFound(EventId),

    #[error("athlete {athlete_id} not found in event {event_id}")]
    AthleteNotFound {
        event_id: EventId,
        athlete_id: AthleteId,
    },

    #[error("station {station_id} does not exist in event {event_id}")]
    UnknownStation {
        event_id: EventId,
        station_id: String,
    },

    #[error("event {event_id} is {status}, not active")]
    EventNotActive {
        event_id: EventId,
        status: EventStatus,
    },

    #[error("event {event_id} cannot go from {from} to {requested}")]
    EventTransition {
        event_id: EventId,
        from: EventStatus,
        requested: EventStatus,
    },

    /// Strict in-order completion: the ping named a station other than the
    /// one the athlete must complete next.
    #[error("expected station {expected}, attempted {attempted}")]
    OutOfOrderStation { expected: String, attempted: String },

    #[error("station {station_id} already completed")]
    DuplicateCompletion { station_id: String },

    #[error("athlete {athlete_id} has already finished")]
    AlreadyFinished { athlete_id: AthleteId },

    #[error("athlete {athlete_id} is disqualified")]
    Disqualified { athlete_id: AthleteId },

    #[error("nothing to undo for athlete {athlete_id}")]
    NothingToUndo { athlete_id: AthleteId },

    #[error("record store error: {0}")]
    Store(#[from] StoreError),
}
