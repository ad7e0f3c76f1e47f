use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

pub type EventId = i64;
pub type AthleteId = i64;

/// Event lifecycle. Transitions are one-directional:
/// upcoming -> active -> completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Upcoming,
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AthleteStatus {
    Ready,
    Active,
    Finished,
    Dnf,
}

/// One timed checkpoint. Ordinal position is its place in the event's
/// station sequence, never stored on the station itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub status: EventStatus,
    pub stations: Vec<Station>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Per-event competitor record. `progress` is the index of the next station
/// to complete and always equals the contiguous completed prefix recorded in
/// `station_times`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Athlete {
    pub id: AthleteId,
    pub event_id: EventId,
    pub name: String,
    pub progress: i32,
    pub station_times: HashMap<String, DateTime<Utc>>,
    pub status: AthleteStatus,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Append-only completion fact, one per (event, athlete, station) while the
/// completion stands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    pub event_id: EventId,
    pub athlete_id: AthleteId,
    pub station_id: String,
    pub station_index: i32,
    pub recorded_at: DateTime<Utc>,
}

/// Elapsed time between two consecutive completed stations. Only exists for
/// a non-first station whose predecessor completion was on record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub event_id: EventId,
    pub athlete_id: AthleteId,
    pub station_id: String,
    pub station_index: i32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: i64,
}
