//! Best-effort match/result persistence, invoked once by the Match
//! Controller at `Ending`. Mirrors the teacher's `GameDatabase` trait: an
//! async trait over an in-memory default, so a relational-backed
//! implementation is a drop-in later without touching callers.

use crate::protocol::{is_guest, MatchId, UserId};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One player's outcome in a finished match.
#[derive(Debug, Clone)]
pub struct PlayerResult {
    pub match_id: MatchId,
    pub user_id: UserId,
    pub placement: u32,
    pub kills: u32,
    pub damage_dealt: f32,
    pub survival_time_secs: u64,
    pub mmr_change: i32,
}

/// A finished match, stamped once at `Ending`.
#[derive(Debug, Clone)]
pub struct MatchRecord {
    pub match_id: MatchId,
    pub map_name: String,
    pub player_count: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_secs: u64,
    pub results: Vec<PlayerResult>,
}

/// Best-effort match result sink.
#[async_trait]
pub trait ResultsSink: Send + Sync {
    async fn record_match(&self, record: MatchRecord) -> Result<()>;
    /// Most-recently-recorded matches, newest first, for `/metrics` and
    /// test introspection.
    async fn recent_matches(&self) -> Result<Vec<MatchRecord>>;
}

const RECENT_MATCH_CAP: usize = 100;

/// In-memory default, consistent with this codebase's in-memory
/// `GameDatabase`/`InMemoryCache` — not a substitute for the external
/// relational store, which stays out of scope.
#[derive(Default)]
pub struct InMemoryResultsSink {
    recent: Mutex<VecDeque<MatchRecord>>,
}

impl InMemoryResultsSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultsSink for InMemoryResultsSink {
    async fn record_match(&self, record: MatchRecord) -> Result<()> {
        let mut recent = self.recent.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        recent.push_front(record);
        while recent.len() > RECENT_MATCH_CAP {
            recent.pop_back();
        }
        Ok(())
    }

    async fn recent_matches(&self) -> Result<Vec<MatchRecord>> {
        let recent = self.recent.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(recent.iter().cloned().collect())
    }
}

/// Raw MMR delta for a placement out of `total_players`, before clamping
/// the resulting MMR to `>= 0`.
///
/// - 1st place: `25 + (total - 2)`
/// - top quarter (placement <= ceil(0.25 * total)): `+15`
/// - top half (placement <= ceil(0.5 * total)): `+5`
/// - otherwise: `-10`
#[must_use]
pub fn mmr_delta(placement: u32, total_players: u32) -> i32 {
    if placement == 1 {
        return 25 + (i32::try_from(total_players).unwrap_or(i32::MAX) - 2);
    }
    let quarter = div_ceil_u32(total_players, 4);
    let half = div_ceil_u32(total_players, 2);
    if placement <= quarter {
        15
    } else if placement <= half {
        5
    } else {
        -10
    }
}

fn div_ceil_u32(value: u32, divisor: u32) -> u32 {
    value.div_ceil(divisor)
}

/// Apply a placement's raw delta to `current_mmr`, clamped to `>= 0`.
/// Returns `(new_mmr, applied_delta)`; `applied_delta` may differ from the
/// raw delta when the clamp engages.
#[must_use]
pub fn apply_mmr_delta(current_mmr: i32, placement: u32, total_players: u32) -> (i32, i32) {
    let delta = mmr_delta(placement, total_players);
    let new_mmr = (current_mmr + delta).max(0);
    (new_mmr, new_mmr - current_mmr)
}

/// Whether `user_id` should be skipped for all persistence (guests).
#[must_use]
pub fn skip_player(user_id: &UserId) -> bool {
    is_guest(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winner_delta_scales_with_lobby_size() {
        assert_eq!(mmr_delta(1, 2), 25);
        assert_eq!(mmr_delta(1, 10), 33);
    }

    #[test]
    fn top_quarter_gets_flat_fifteen() {
        assert_eq!(mmr_delta(2, 8), 15);
        assert_eq!(mmr_delta(3, 8), 5);
        assert_eq!(mmr_delta(4, 8), 5);
        assert_eq!(mmr_delta(8, 8), -10);
    }

    #[test]
    fn mmr_floor_is_zero() {
        let (new_mmr, applied) = apply_mmr_delta(5, 8, 8);
        assert_eq!(new_mmr, 0);
        assert_eq!(applied, -5);
    }

    #[tokio::test]
    async fn recent_matches_cap_at_one_hundred() {
        let sink = InMemoryResultsSink::new();
        for i in 0..120u32 {
            sink.record_match(MatchRecord {
                match_id: MatchId::from_u128(u128::from(i)),
                map_name: "procedural".to_string(),
                player_count: 2,
                start_time: Utc::now(),
                end_time: Utc::now(),
                duration_secs: 60,
                results: Vec::new(),
            })
            .await
            .unwrap();
        }
        assert_eq!(sink.recent_matches().await.unwrap().len(), 100);
    }
}
