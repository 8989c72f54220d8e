//! Yearly score aggregation and ranking.
//!
//! Scores accumulate per calendar year. The public board exposes only
//! the top 100 entries; a player outside that window can still ask for
//! their exact rank, which is computed against the full score set.
//!
//! Ordering is by score descending, then by player id ascending so ties
//! rank deterministically.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use apiary_types::{LeaderboardEntry, PlayerId};

/// Number of entries the public board exposes.
pub const BOARD_SIZE: usize = 100;

#[derive(Debug, Clone, Copy)]
struct Score {
    value: Decimal,
    updated_at: DateTime<Utc>,
}

/// In-memory leaderboard, fed as a side effect of scoring mutations.
#[derive(Debug, Default)]
pub struct Leaderboard {
    years: RwLock<BTreeMap<i32, BTreeMap<PlayerId, Score>>>,
}

impl Leaderboard {
    /// Create an empty leaderboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `player`'s absolute cumulative score for `year`.
    ///
    /// Callers pass the ledger's authoritative yearly total, so replays
    /// and out-of-order updates converge on the same value.
    pub async fn record(&self, year: i32, player: PlayerId, score: Decimal, now: DateTime<Utc>) {
        let mut years = self.years.write().await;
        years.entry(year).or_default().insert(
            player,
            Score {
                value: score,
                updated_at: now,
            },
        );
    }

    /// The top entries for `year`, best first, at most [`BOARD_SIZE`].
    pub async fn top(&self, year: i32) -> Vec<LeaderboardEntry> {
        let mut entries = self.sorted(year).await;
        entries.truncate(BOARD_SIZE);
        entries
    }

    /// One-based rank of `player` in `year`, over the full score set,
    /// or `None` if the player has no score that year.
    pub async fn rank_of(&self, year: i32, player: PlayerId) -> Option<usize> {
        let entries = self.sorted(year).await;
        entries
            .iter()
            .position(|e| e.player == player)
            .map(|p| p.saturating_add(1))
    }

    async fn sorted(&self, year: i32) -> Vec<LeaderboardEntry> {
        let years = self.years.read().await;
        let Some(scores) = years.get(&year) else {
            return Vec::new();
        };
        let mut entries: Vec<LeaderboardEntry> = scores
            .iter()
            .map(|(player, score)| LeaderboardEntry {
                player: *player,
                score: score.value,
                updated_at: score.updated_at,
            })
            .collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.player.cmp(&b.player)));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn top_sorts_descending_and_truncates() {
        let board = Leaderboard::new();
        let now = Utc::now();
        let mut players = Vec::new();
        for i in 1..=120_i64 {
            let player = PlayerId::new();
            players.push(player);
            board.record(2026, player, Decimal::new(i, 0), now).await;
        }

        let top = board.top(2026).await;
        assert_eq!(top.len(), BOARD_SIZE);
        assert_eq!(top.first().map(|e| e.score), Some(Decimal::new(120, 0)));
        assert_eq!(top.last().map(|e| e.score), Some(Decimal::new(21, 0)));
        for pair in top.windows(2) {
            if let [a, b] = pair {
                assert!(a.score >= b.score);
            }
        }
    }

    #[tokio::test]
    async fn rank_covers_players_outside_the_board() {
        let board = Leaderboard::new();
        let now = Utc::now();
        let mut lowest = None;
        for i in 1..=120_i64 {
            let player = PlayerId::new();
            if i == 1 {
                lowest = Some(player);
            }
            board.record(2026, player, Decimal::new(i, 0), now).await;
        }

        let Some(lowest) = lowest else {
            return;
        };
        assert_eq!(board.rank_of(2026, lowest).await, Some(120));
        assert_eq!(board.rank_of(2026, PlayerId::new()).await, None);
    }

    #[tokio::test]
    async fn records_converge_on_latest_absolute_score() {
        let board = Leaderboard::new();
        let now = Utc::now();
        let player = PlayerId::new();
        board.record(2026, player, Decimal::new(10, 0), now).await;
        board.record(2026, player, Decimal::new(45, 0), now).await;
        // A replay of an authoritative total does not double count.
        board.record(2026, player, Decimal::new(45, 0), now).await;

        let top = board.top(2026).await;
        assert_eq!(top.len(), 1);
        assert_eq!(top.first().map(|e| e.score), Some(Decimal::new(45, 0)));
    }

    #[tokio::test]
    async fn years_are_independent() {
        let board = Leaderboard::new();
        let now = Utc::now();
        let player = PlayerId::new();
        board.record(2025, player, Decimal::new(99, 0), now).await;

        assert!(board.top(2026).await.is_empty());
        assert_eq!(board.rank_of(2025, player).await, Some(1));
    }
}
