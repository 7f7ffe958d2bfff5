use std::collections::BTreeMap;

use crate::domain::config::Config;
use crate::domain::model::{PlayerId, PlayerStats};

/// A player's computed rating plus whether they are still provisional
/// (§4.4.1). Provisional players are exempt from bracket filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rating {
    pub value: f64,
    pub provisional: bool,
    pub games_played: u32,
}

/// `rating = clamp(base + 200*ln(1 + 9*win_rate) - 200
///     + 50*sign(delta)*ln(1 + |delta|)
///     + (win_rate >= 0.6 ? 30*ln(games_played) : 0), min, max)`
pub fn compute_rating(stats: &PlayerStats, config: &Config) -> Rating {
    if stats.games_played == 0 {
        return Rating {
            value: config.base_rating as f64,
            provisional: true,
            games_played: 0,
        };
    }

    let win_rate = stats.win_rate();
    let delta = stats.average_point_differential();
    let delta_sign = if delta > 0.0 {
        1.0
    } else if delta < 0.0 {
        -1.0
    } else {
        0.0
    };

    let mut value = config.base_rating as f64 + 200.0 * (1.0 + 9.0 * win_rate).ln() - 200.0
        + 50.0 * delta_sign * (1.0 + delta.abs()).ln();

    if win_rate >= 0.6 {
        value += 30.0 * (stats.games_played as f64).ln();
    }

    value = value.clamp(config.min_rating as f64, config.max_rating as f64);

    Rating {
        value,
        provisional: stats.games_played < config.provisional_games_threshold,
        games_played: stats.games_played,
    }
}

/// Sorted ranking of active players (rank 1 = highest rating), with ties on
/// rating broken by fewer games played then lexicographic id (§4.4.2).
pub fn rank_players(
    active_player_ids: &[PlayerId],
    ratings: &BTreeMap<PlayerId, Rating>,
) -> Vec<PlayerId> {
    let mut ordered: Vec<PlayerId> = active_player_ids.to_vec();
    ordered.sort_by(|a, b| {
        let ra = &ratings[a];
        let rb = &ratings[b];
        rb.value
            .partial_cmp(&ra.value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| ra.games_played.cmp(&rb.games_played))
            .then_with(|| a.cmp(b))
    });
    ordered
}

/// Bracket membership: `0` = upper half, `1` = lower half, `None` = no
/// bracket constraint (provisional player). Ranks are 1-based positions in
/// `ranked`; the split point is `ceil(M * ranking_range_percentage)`.
pub fn brackets(
    ranked: &[PlayerId],
    ratings: &BTreeMap<PlayerId, Rating>,
    ranking_range_percentage: f64,
) -> BTreeMap<PlayerId, Option<u8>> {
    let m = ranked.len();
    let split = ((m as f64) * ranking_range_percentage).ceil() as usize;
    let split = split.clamp(0, m);

    let mut out = BTreeMap::new();
    for (idx, player) in ranked.iter().enumerate() {
        let provisional = ratings.get(player).map(|r| r.provisional).unwrap_or(true);
        if provisional {
            out.insert(player.clone(), None);
        } else if idx < split {
            out.insert(player.clone(), Some(0));
        } else {
            out.insert(player.clone(), Some(1));
        }
    }
    out
}

/// Two players/groups may be matched iff they share a bracket, or either is
/// bracket-free (provisional).
pub fn bracket_compatible(a: Option<u8>, b: Option<u8>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x == y,
        _ => true,
    }
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
