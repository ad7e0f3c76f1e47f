//! Postgres-backed record store. Station lists and per-athlete station time
//! maps live in JSONB columns; pings and splits carry composite primary keys
//! so a concurrent duplicate insert aborts the transaction.

use std::env;

use dotenv::dotenv;
use postgres::error::SqlState;
use postgres::NoTls;
use r2d2::{Pool, PooledConnection};
use r2d2_postgres::PostgresConnectionManager;

use crate::error::{EngineError, Result};
use crate::models::{
    Athlete, AthleteId, AthleteStatus, Event, EventId, EventStatus, Ping, Split, Station,
};
use crate::store::{RecordStore, StoreError, WriteOp};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS events (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    status TEXT NOT NULL,
    stations JSONB NOT NULL,
    started_at TIMESTAMPTZ,
    ended_at TIMESTAMPTZ
);
CREATE TABLE IF NOT EXISTS athletes (
    event_id BIGINT NOT NULL REFERENCES events (id),
    id BIGSERIAL,
    name TEXT NOT NULL,
    progress INTEGER NOT NULL DEFAULT 0,
    station_times JSONB NOT NULL DEFAULT '{}'::jsonb,
    status TEXT NOT NULL,
    finished_at TIMESTAMPTZ,
    PRIMARY KEY (event_id, id)
);
CREATE TABLE IF NOT EXISTS pings (
    event_id BIGINT NOT NULL,
    athlete_id BIGINT NOT NULL,
    station_id TEXT NOT NULL,
    station_index INTEGER NOT NULL,
    recorded_at TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (event_id, athlete_id, station_id)
);
CREATE TABLE IF NOT EXISTS splits (
    event_id BIGINT NOT NULL,
    athlete_id BIGINT NOT NULL,
    station_id TEXT NOT NULL,
    station_index INTEGER NOT NULL,
    started_at TIMESTAMPTZ NOT NULL,
    ended_at TIMESTAMPTZ NOT NULL,
    duration_ms BIGINT NOT NULL,
    PRIMARY KEY (event_id, athlete_id, station_id)
);
";

type PgPool = Pool<PostgresConnectionManager<NoTls>>;
type PgConn = PooledConnection<PostgresConnectionManager<NoTls>>;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects using DATABASE_URL (dotenv aware). The credential is
    /// initialization-time configuration, so a missing variable panics here
    /// instead of surfacing as an engine error.
    pub fn connect() -> std::result::Result<Self, StoreError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        Self::with_url(&database_url)
    }

    pub fn with_url(database_url: &str) -> std::result::Result<Self, StoreError> {
        let config: postgres::Config = database_url.parse().map_err(StoreError::Postgres)?;
        let manager = PostgresConnectionManager::new(config, NoTls);
        let pool = Pool::new(manager)?;
        Ok(PgStore { pool })
    }

    fn conn(&self) -> std::result::Result<PgConn, StoreError> {
        Ok(self.pool.get()?)
    }

    pub fn create_schema(&self) -> std::result::Result<(), StoreError> {
        let mut conn = self.conn()?;
        conn.batch_execute(SCHEMA)?;
        Ok(())
    }

    /// Wipes all rows while keeping the schema.
    pub fn empty_db(&self) -> std::result::Result<(), StoreError> {
        let mut conn = self.conn()?;
        conn.batch_execute("TRUNCATE splits, pings, athletes, events")?;
        Ok(())
    }
}

fn event_from_row(row: &postgres::Row) -> std::result::Result<Event, StoreError> {
    let status: String = row.get("status");
    let stations: serde_json::Value = row.get("stations");
    Ok(Event {
        id: row.get("id"),
        name: row.get("name"),
        status: parse_status::<EventStatus>(&status)?,
        stations: serde_json::from_value(stations)?,
        started_at: row.get("started_at"),
        ended_at: row.get("ended_at"),
    })
}

fn athlete_from_row(row: &postgres::Row) -> std::result::Result<Athlete, StoreError> {
    let status: String = row.get("status");
    let station_times: serde_json::Value = row.get("station_times");
    Ok(Athlete {
        id: row.get("id"),
        event_id: row.get("event_id"),
        name: row.get("name"),
        progress: row.get("progress"),
        station_times: serde_json::from_value(station_times)?,
        status: parse_status::<AthleteStatus>(&status)?,
        finished_at: row.get("finished_at"),
    })
}

fn ping_from_row(row: &postgres::Row) -> Ping {
    Ping {
        event_id: row.get("event_id"),
        athlete_id: row.get("athlete_id"),
        station_id: row.get("station_id"),
        station_index: row.get("station_index"),
        recorded_at: row.get("recorded_at"),
    }
}

fn split_from_row(row: &postgres::Row) -> Split {
    Split {
        event_id: row.get("event_id"),
        athlete_id: row.get("athlete_id"),
        station_id: row.get("station_id"),
        station_index: row.get("station_index"),
        started_at: row.get("started_at"),
        ended_at: row.get("ended_at"),
        duration_ms: row.get("duration_ms"),
    }
}

fn parse_status<T: std::str::FromStr>(text: &str) -> std::result::Result<T, StoreError> {
    text.parse()
        .map_err(|_| StoreError::Corrupt(format!("unknown status {:?}", text)))
}

fn is_unique_violation(err: &postgres::Error) -> bool {
    err.code() == Some(&SqlState::UNIQUE_VIOLATION)
}

impl RecordStore for PgStore {
    fn get_event(&self, event_id: EventId) -> Result<Event> {
        let mut conn = self.conn()?;
        let rows = conn
            .query("SELECT * FROM events WHERE id = $1", &[&event_id])
            .map_err(StoreError::from)?;
        let row = rows.first().ok_or(EngineError::EventNotFound(event_id))?;
        Ok(event_from_row(row)?)
    }

    fn get_athlete(&self, event_id: EventId, athlete_id: AthleteId) -> Result<Athlete> {
        let mut conn = self.conn()?;
        let rows = conn
            .query(
                "SELECT * FROM athletes WHERE event_id = $1 AND id = $2",
                &[&event_id, &athlete_id],
            )
            .map_err(StoreError::from)?;
        let row = rows.first().ok_or(EngineError::AthleteNotFound {
            event_id,
            athlete_id,
        })?;
        Ok(athlete_from_row(row)?)
    }

    fn list_athletes(&self, event_id: EventId) -> Result<Vec<Athlete>> {
        let mut conn = self.conn()?;
        let rows = conn
            .query(
                "SELECT * FROM athletes WHERE event_id = $1 ORDER BY id",
                &[&event_id],
            )
            .map_err(StoreError::from)?;
        let mut athletes = Vec::with_capacity(rows.len());
        for row in &rows {
            athletes.push(athlete_from_row(row)?);
        }
        Ok(athletes)
    }

    fn query_pings(
        &self,
        event_id: EventId,
        athlete_id: AthleteId,
        station_id: Option<&str>,
    ) -> Result<Vec<Ping>> {
        let mut conn = self.conn()?;
        let rows = match station_id {
            Some(station_id) => conn.query(
                "SELECT * FROM pings
                 WHERE event_id = $1 AND athlete_id = $2 AND station_id = $3
                 ORDER BY station_index",
                &[&event_id, &athlete_id, &station_id],
            ),
            None => conn.query(
                "SELECT * FROM pings
                 WHERE event_id = $1 AND athlete_id = $2
                 ORDER BY station_index",
                &[&event_id, &athlete_id],
            ),
        }
        .map_err(StoreError::from)?;
        Ok(rows.iter().map(ping_from_row).collect())
    }

    fn query_splits(&self, event_id: EventId, athlete_id: Option<AthleteId>) -> Result<Vec<Split>> {
        let mut conn = self.conn()?;
        let rows = match athlete_id {
            Some(athlete_id) => conn.query(
                "SELECT * FROM splits
                 WHERE event_id = $1 AND athlete_id = $2
                 ORDER BY athlete_id, station_index",
                &[&event_id, &athlete_id],
            ),
            None => conn.query(
                "SELECT * FROM splits
                 WHERE event_id = $1
                 ORDER BY athlete_id, station_index",
                &[&event_id],
            ),
        }
        .map_err(StoreError::from)?;
        Ok(rows.iter().map(split_from_row).collect())
    }

    fn insert_event(&self, name: &str, stations: Vec<Station>) -> Result<Event> {
        let mut conn = self.conn()?;
        let status = EventStatus::Upcoming.to_string();
        let stations_json = serde_json::to_value(&stations).map_err(StoreError::from)?;
        let rows = conn
            .query(
                "INSERT INTO events (name, status, stations) VALUES ($1, $2, $3) RETURNING id",
                &[&name, &status, &stations_json],
            )
            .map_err(StoreError::from)?;
        Ok(Event {
            id: rows[0].get(0),
            name: name.to_string(),
            status: EventStatus::Upcoming,
            stations,
            started_at: None,
            ended_at: None,
        })
    }

    fn insert_athlete(&self, event_id: EventId, name: &str) -> Result<Athlete> {
        self.get_event(event_id)?;
        let mut conn = self.conn()?;
        let status = AthleteStatus::Ready.to_string();
        let rows = conn
            .query(
                "INSERT INTO athletes (event_id, name, status) VALUES ($1, $2, $3) RETURNING id",
                &[&event_id, &name, &status],
            )
            .map_err(StoreError::from)?;
        Ok(Athlete {
            id: rows[0].get(0),
            event_id,
            name: name.to_string(),
            progress: 0,
            station_times: Default::default(),
            status: AthleteStatus::Ready,
            finished_at: None,
        })
    }

    fn commit_atomic(&self, ops: Vec<WriteOp>) -> std::result::Result<(), StoreError> {
        let mut conn = self.conn()?;
        let mut tx = conn.transaction()?;

        for op in &ops {
            match op {
                WriteOp::PutEvent(event) => {
                    let status = event.status.to_string();
                    let stations = serde_json::to_value(&event.stations)?;
                    tx.execute(
                        "INSERT INTO events (id, name, status, stations, started_at, ended_at)
                         VALUES ($1, $2, $3, $4, $5, $6)
                         ON CONFLICT (id) DO UPDATE SET
                             name = EXCLUDED.name,
                             status = EXCLUDED.status,
                             stations = EXCLUDED.stations,
                             started_at = EXCLUDED.started_at,
                             ended_at = EXCLUDED.ended_at",
                        &[
                            &event.id,
                            &event.name,
                            &status,
                            &stations,
                            &event.started_at,
                            &event.ended_at,
                        ],
                    )?;
                }
                WriteOp::PutAthlete {
                    athlete,
                    expect_progress,
                } => {
                    let status = athlete.status.to_string();
                    let station_times = serde_json::to_value(&athlete.station_times)?;
                    match expect_progress {
                        Some(expected) => {
                            let updated = tx.execute(
                                "UPDATE athletes SET
                                     name = $3,
                                     progress = $4,
                                     station_times = $5,
                                     status = $6,
                                     finished_at = $7
                                 WHERE event_id = $1 AND id = $2 AND progress = $8",
                                &[
                                    &athlete.event_id,
                                    &athlete.id,
                                    &athlete.name,
                                    &athlete.progress,
                                    &station_times,
                                    &status,
                                    &athlete.finished_at,
                                    expected,
                                ],
                            )?;
                            if updated != 1 {
                                // Dropping the transaction rolls it back.
                                return Err(StoreError::Conflict);
                            }
                        }
                        None => {
                            tx.execute(
                                "INSERT INTO athletes
                                     (event_id, id, name, progress, station_times, status, finished_at)
                                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                                 ON CONFLICT (event_id, id) DO UPDATE SET
                                     name = EXCLUDED.name,
                                     progress = EXCLUDED.progress,
                                     station_times = EXCLUDED.station_times,
                                     status = EXCLUDED.status,
                                     finished_at = EXCLUDED.finished_at",
                                &[
                                    &athlete.event_id,
                                    &athlete.id,
                                    &athlete.name,
                                    &athlete.progress,
                                    &station_times,
                                    &status,
                                    &athlete.finished_at,
                                ],
                            )?;
                        }
                    }
                }
                WriteOp::InsertPing(ping) => {
                    let inserted = tx.execute(
                        "INSERT INTO pings
                             (event_id, athlete_id, station_id, station_index, recorded_at)
                         VALUES ($1, $2, $3, $4, $5)",
                        &[
                            &ping.event_id,
                            &ping.athlete_id,
                            &ping.station_id,
                            &ping.station_index,
                            &ping.recorded_at,
                        ],
                    );
                    match inserted {
                        Ok(_) => {}
                        Err(err) if is_unique_violation(&err) => {
                            return Err(StoreError::Conflict);
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
                WriteOp::DeletePing {
                    event_id,
                    athlete_id,
                    station_id,
                } => {
                    tx.execute(
                        "DELETE FROM pings
                         WHERE event_id = $1 AND athlete_id = $2 AND station_id = $3",
                        &[event_id, athlete_id, station_id],
                    )?;
                }
                WriteOp::InsertSplit(split) => {
                    let inserted = tx.execute(
                        "INSERT INTO splits
                             (event_id, athlete_id, station_id, station_index,
                              started_at, ended_at, duration_ms)
                         VALUES ($1, $2, $3, $4, $5, $6, $7)",
                        &[
                            &split.event_id,
                            &split.athlete_id,
                            &split.station_id,
                            &split.station_index,
                            &split.started_at,
                            &split.ended_at,
                            &split.duration_ms,
                        ],
                    );
                    match inserted {
                        Ok(_) => {}
                        Err(err) if is_unique_violation(&err) => {
                            return Err(StoreError::Conflict);
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
                WriteOp::DeleteSplit {
                    event_id,
                    athlete_id,
                    station_id,
                } => {
                    tx.execute(
                        "DELETE FROM splits
                         WHERE event_id = $1 AND athlete_id = $2 AND station_id = $3",
                        &[event_id, athlete_id, station_id],
                    )?;
                }
                WriteOp::ClearFacts {
                    event_id,
                    athlete_id,
                } => {
                    tx.execute(
                        "DELETE FROM pings WHERE event_id = $1 AND athlete_id = $2",
                        &[event_id, athlete_id],
                    )?;
                    tx.execute(
                        "DELETE FROM splits WHERE event_id = $1 AND athlete_id = $2",
                        &[event_id, athlete_id],
                    )?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    }
}
