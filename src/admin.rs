//! Admin corrections. Undo reproduces the exact inverse of the most recent
//! ping; reset rewinds the athlete to registration state. Both leave no
//! ghost pings, splits or station times behind.

use crate::catalog::StationCatalog;
use crate::error::{EngineError, Result};
use crate::models::{Athlete, AthleteStatus};

pub struct UndoTransition {
    pub athlete: Athlete,
    /// Station whose completion is being reversed.
    pub station_id: String,
}

pub fn undo(catalog: &StationCatalog, athlete: &Athlete) -> Result<UndoTransition> {
    if athlete.progress == 0 {
        return Err(EngineError::NothingToUndo {
            athlete_id: athlete.id,
        });
    }
    let last_index = (athlete.progress - 1) as usize;
    let station = catalog.station_at(last_index).ok_or_else(|| {
        EngineError::Validation(format!(
            "athlete {} progress {} exceeds the station sequence",
            athlete.id, athlete.progress
        ))
    })?;

    let mut next = athlete.clone();
    next.station_times.remove(&station.id);
    next.progress -= 1;
    next.finished_at = None;
    next.status = match next.status {
        AthleteStatus::Dnf => AthleteStatus::Dnf,
        _ if next.progress == 0 => AthleteStatus::Ready,
        AthleteStatus::Finished => AthleteStatus::Active,
        other => other,
    };
    Ok(UndoTransition {
        athlete: next,
        station_id: station.id.clone(),
    })
}

pub fn reset(athlete: &Athlete) -> Athlete {
    let mut next = athlete.clone();
    next.progress = 0;
    next.station_times.clear();
    next.status = AthleteStatus::Ready;
    next.finished_at = None;
    next
}

/// Marks the athlete dnf. Progress, times and facts stay untouched; only
/// future pings are rejected. Idempotent on an already-dnf athlete.
pub fn disqualify(athlete: &Athlete) -> Result<Athlete> {
    if athlete.status == AthleteStatus::Finished {
        return Err(EngineError::AlreadyFinished {
            athlete_id: athlete.id,
        });
    }
    let mut next = athlete.clone();
    next.status = AthleteStatus::Dnf;
    Ok(next)
}
