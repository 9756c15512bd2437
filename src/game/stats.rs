//! End-of-match statistics and the sink that receives them

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Reverse;
use tracing::info;
use uuid::Uuid;

use super::state::{MatchOutcome, MatchState, MatchStatus, PlayerId};

/// Match statistics at end
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchStats {
    pub match_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f32,
    pub winner_id: Option<PlayerId>,
    /// Join order
    pub player_stats: Vec<PlayerMatchStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerMatchStats {
    pub player_id: PlayerId,
    pub display_name: String,
    pub kills: u32,
    pub is_winner: bool,
    /// 1 = winner; the rest ordered by how long they survived
    pub placement: u32,
}

impl MatchStats {
    /// Build stats for a match that ended with a winner or a draw.
    ///
    /// Aborted and running matches have no stats.
    pub fn from_state(state: &MatchState) -> Option<Self> {
        let winner_id = match &state.status {
            MatchStatus::Ended {
                outcome: MatchOutcome::Winner { player_id },
            } => Some(*player_id),
            MatchStatus::Ended {
                outcome: MatchOutcome::NoWinner,
            } => None,
            _ => return None,
        };

        // Survivors first, then later deaths; stable sort keeps join order on ties
        let mut order: Vec<usize> = (0..state.players.len()).collect();
        order.sort_by_key(|&idx| {
            let p = &state.players[idx];
            (!p.alive, Reverse(p.death_at))
        });
        let mut placements = vec![0u32; state.players.len()];
        for (rank, idx) in order.into_iter().enumerate() {
            placements[idx] = rank as u32 + 1;
        }

        let player_stats = state
            .players
            .iter()
            .zip(placements)
            .map(|(p, placement)| PlayerMatchStats {
                player_id: p.id,
                display_name: p.display_name.clone(),
                kills: p.kills,
                is_winner: Some(p.id) == winner_id,
                placement,
            })
            .collect();

        Some(Self {
            match_id: state.id,
            started_at: state.started_at,
            duration_secs: state.clock.as_secs_f32(),
            winner_id,
            player_stats,
        })
    }
}

/// Receives results of finished matches. Storage is up to the implementor.
pub trait StatsSink: Send + Sync {
    fn record(&self, stats: &MatchStats);
}

/// Sink that writes results to the log
#[derive(Debug, Default, Clone)]
pub struct TracingStatsSink;

impl StatsSink for TracingStatsSink {
    fn record(&self, stats: &MatchStats) {
        for p in &stats.player_stats {
            info!(
                match_id = %stats.match_id,
                player_id = %p.player_id,
                kills = p.kills,
                is_winner = p.is_winner,
                placement = p.placement,
                "Match result"
            );
        }
    }
}
