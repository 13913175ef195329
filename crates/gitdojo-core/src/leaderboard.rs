//! Leaderboard ranking over persisted session records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use gitdojo_state::SessionRecord;
use serde::{Deserialize, Serialize};

use crate::scoring::SessionMetrics;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub player: String,
    pub session_id: String,
    pub metrics: SessionMetrics,
    pub score: f64,
    pub total_stage_count: u32,
    pub recorded_at: DateTime<Utc>,
}

impl From<&SessionRecord> for LeaderboardEntry {
    fn from(record: &SessionRecord) -> Self {
        Self {
            player: record.player.clone(),
            session_id: record.session_id.clone(),
            metrics: SessionMetrics::from_record(record),
            score: record.score,
            total_stage_count: record.total_stage_count,
            recorded_at: record.recorded_at,
        }
    }
}

/// `a` ranks above `b`: higher score, then earlier record.
fn outranks(a: &LeaderboardEntry, b: &LeaderboardEntry) -> bool {
    a.score > b.score || (a.score == b.score && a.recorded_at < b.recorded_at)
}

/// Keep each player's best session, sort by score descending (earlier
/// record first on ties) and truncate to `limit`.
pub fn rank_leaderboard(records: &[SessionRecord], limit: usize) -> Vec<LeaderboardEntry> {
    let mut best: HashMap<&str, LeaderboardEntry> = HashMap::new();
    for record in records {
        let entry = LeaderboardEntry::from(record);
        match best.get(record.player.as_str()) {
            Some(current) if !outranks(&entry, current) => {}
            _ => {
                best.insert(record.player.as_str(), entry);
            }
        }
    }

    let mut ranked: Vec<LeaderboardEntry> = best.into_values().collect();
    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.recorded_at.cmp(&b.recorded_at))
    });
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use gitdojo_state::StageMetrics;

    fn record(id: &str, player: &str, score: f64, minute: i64) -> SessionRecord {
        SessionRecord {
            session_id: id.into(),
            player: player.into(),
            stages: vec![StageMetrics {
                stage_id: 1,
                commands: 2,
                elapsed_ms: 30_000,
                hint_used: false,
                solution_used: false,
                repeated: false,
            }],
            score,
            total_stage_count: 12,
            recorded_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
                + Duration::minutes(minute),
        }
    }

    #[test]
    fn best_score_per_player_sorted_descending() {
        let records = vec![
            record("a1", "mina", 300.0, 0),
            record("b1", "joon", 450.0, 1),
            record("a2", "mina", 500.0, 2),
            record("c1", "sora", 100.0, 3),
        ];
        let board = rank_leaderboard(&records, 10);
        let rows: Vec<(&str, f64)> = board.iter().map(|e| (e.player.as_str(), e.score)).collect();
        assert_eq!(rows, vec![("mina", 500.0), ("joon", 450.0), ("sora", 100.0)]);
        assert_eq!(board[0].session_id, "a2");
        assert_eq!(board[0].metrics.total_commands, 2);
    }

    #[test]
    fn ties_prefer_earlier_record() {
        let records = vec![
            record("late", "joon", 200.0, 5),
            record("early", "mina", 200.0, 1),
            record("again", "mina", 200.0, 9),
        ];
        let board = rank_leaderboard(&records, 10);
        assert_eq!(board[0].player, "mina");
        assert_eq!(board[0].session_id, "early");
        assert_eq!(board[1].player, "joon");
    }

    #[test]
    fn limit_truncates() {
        let records = vec![
            record("1", "a", 1.0, 0),
            record("2", "b", 2.0, 0),
            record("3", "c", 3.0, 0),
        ];
        assert_eq!(rank_leaderboard(&records, 2).len(), 2);
        assert!(rank_leaderboard(&records, 0).is_empty());
    }
}
