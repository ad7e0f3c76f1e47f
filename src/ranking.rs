//! Read-only ranking over persisted progress and splits, recomputed fresh on
//! every call.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::models::{Athlete, AthleteId, AthleteStatus, Split};
use crate::splits;

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub athlete_id: AthleteId,
    pub name: String,
    pub status: AthleteStatus,
    pub progress: i32,
    pub total_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultRow {
    pub rank: usize,
    pub athlete_id: AthleteId,
    pub name: String,
    pub total_ms: i64,
    pub splits: Vec<Split>,
}

/// Live standing of every athlete in the event, including those yet to
/// start. Further along ranks higher; equal progress is broken by lower
/// total split time when both sides have one, otherwise input order stands.
pub fn leaderboard(athletes: Vec<Athlete>, splits: &[Split]) -> Vec<LeaderboardRow> {
    let mut by_athlete: HashMap<AthleteId, Vec<Split>> = HashMap::new();
    for split in splits {
        by_athlete
            .entry(split.athlete_id)
            .or_default()
            .push(split.clone());
    }

    let mut entries: Vec<(Athlete, Option<i64>)> = athletes
        .into_iter()
        .map(|a| {
            let total = by_athlete
                .get(&a.id)
                .and_then(|s| splits::total_ms(s));
            (a, total)
        })
        .collect();
    // sort_by is stable, so undecided ties keep input order.
    entries.sort_by(|(a, a_total), (b, b_total)| {
        b.progress
            .cmp(&a.progress)
            .then_with(|| match (a_total, b_total) {
                (Some(x), Some(y)) => x.cmp(y),
                _ => Ordering::Equal,
            })
    });

    entries
        .into_iter()
        .enumerate()
        .map(|(i, (athlete, total_ms))| LeaderboardRow {
            rank: i + 1,
            athlete_id: athlete.id,
            name: athlete.name,
            status: athlete.status,
            progress: athlete.progress,
            total_ms,
        })
        .collect()
}

/// Final results table: finished athletes with at least one recorded split,
/// fastest total first, splits listed in station order.
pub fn results(athletes: Vec<Athlete>, splits: Vec<Split>) -> Vec<ResultRow> {
    let mut by_athlete: HashMap<AthleteId, Vec<Split>> = HashMap::new();
    for split in splits {
        by_athlete.entry(split.athlete_id).or_default().push(split);
    }

    let mut rows: Vec<ResultRow> = Vec::new();
    for athlete in athletes {
        if athlete.status != AthleteStatus::Finished {
            continue;
        }
        let mut athlete_splits = by_athlete.remove(&athlete.id).unwrap_or_default();
        athlete_splits.sort_by_key(|s| s.station_index);
        let total_ms = match splits::total_ms(&athlete_splits) {
            Some(total) => total,
            None => continue,
        };
        rows.push(ResultRow {
            rank: 0,
            athlete_id: athlete.id,
            name: athlete.name,
            total_ms,
            splits: athlete_splits,
        });
    }
    rows.sort_by_key(|r| r.total_ms);
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
    }
    rows
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use crate::models::EventId;

    use super::*;

    const EVENT: EventId = 1;

    fn athlete(id: AthleteId, progress: i32, status: AthleteStatus) -> Athlete {
        Athlete {
            id,
            event_id: EVENT,
            name: format!("athlete-{}", id),
            progress,
            station_times: HashMap::new(),
            status,
            finished_at: None,
        }
    }

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn split(athlete_id: AthleteId, station_index: i32, duration_ms: i64) -> Split {
        Split {
            event_id: EVENT,
            athlete_id,
            station_id: format!("s{}", station_index),
            station_index,
            started_at: t(0),
            ended_at: t(duration_ms),
            duration_ms,
        }
    }

    #[test]
    fn progress_outranks_time() {
        let athletes = vec![
            athlete(1, 1, AthleteStatus::Active),
            athlete(2, 2, AthleteStatus::Active),
        ];
        let splits = vec![split(1, 1, 100), split(2, 1, 90_000)];
        let board = leaderboard(athletes, &splits);
        assert_eq!(board[0].athlete_id, 2);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[1].athlete_id, 1);
        assert_eq!(board[1].rank, 2);
    }

    #[test]
    fn equal_progress_breaks_on_total() {
        let athletes = vec![
            athlete(1, 2, AthleteStatus::Active),
            athlete(2, 2, AthleteStatus::Active),
        ];
        let splits = vec![split(1, 1, 1500), split(2, 1, 1000)];
        let board = leaderboard(athletes, &splits);
        assert_eq!(board[0].athlete_id, 2);
        assert_eq!(board[0].total_ms, Some(1000));
        assert_eq!(board[1].athlete_id, 1);
    }

    #[test]
    fn athletes_without_splits_keep_input_order() {
        let athletes = vec![
            athlete(5, 0, AthleteStatus::Ready),
            athlete(6, 0, AthleteStatus::Ready),
        ];
        let board = leaderboard(athletes, &[]);
        assert_eq!(board[0].athlete_id, 5);
        assert_eq!(board[1].athlete_id, 6);
        assert_eq!(board[0].total_ms, None);
    }

    #[test]
    fn results_rank_finishers_by_total_ascending() {
        let athletes = vec![
            athlete(1, 3, AthleteStatus::Finished),
            athlete(2, 3, AthleteStatus::Finished),
            athlete(3, 2, AthleteStatus::Active),
        ];
        let splits = vec![
            split(1, 1, 1000),
            split(1, 2, 700),
            split(2, 1, 800),
            split(2, 2, 500),
            split(3, 1, 100),
        ];
        let table = results(athletes, splits);
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].athlete_id, 2);
        assert_eq!(table[0].rank, 1);
        assert_eq!(table[0].total_ms, 1300);
        assert_eq!(table[1].athlete_id, 1);
        assert_eq!(table[1].total_ms, 1700);
        assert_eq!(table[0].splits.len(), 2);
        assert!(table[0].splits[0].station_index < table[0].splits[1].station_index);
    }

    #[test]
    fn finisher_without_splits_is_absent_from_results() {
        // Single-station events finish without ever producing a split.
        let athletes = vec![athlete(1, 1, AthleteStatus::Finished)];
        let table = results(athletes, vec![]);
        assert!(table.is_empty());
    }
}
