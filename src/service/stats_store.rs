use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::model::{Match, PlayerId, PlayerStats, StandingRow, Team1Or2};

/// Maps player id to [`PlayerStats`] (§4.1). Pure data plus the operations
/// that keep the documented invariants: `wins + losses = games_played` for
/// non-forfeited history, `wins <= games_played`, and partner/opponent
/// multiset totals matching `games_played * (players_per_team - 1)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsStore {
    by_player: BTreeMap<PlayerId, PlayerStats>,
}

impl StatsStore {
    pub fn create(&mut self, player_id: PlayerId) {
        self.by_player.entry(player_id).or_default();
    }

    pub fn get(&self, player_id: &PlayerId) -> PlayerStats {
        self.by_player.get(player_id).cloned().unwrap_or_default()
    }

    pub fn get_mut(&mut self, player_id: &PlayerId) -> &mut PlayerStats {
        self.by_player.entry(player_id.clone()).or_default()
    }

    pub fn increment_wait(&mut self, player_id: &PlayerId) {
        self.get_mut(player_id).games_waited += 1;
    }

    pub fn reset_wait(&mut self, player_id: &PlayerId) {
        self.get_mut(player_id).games_waited = 0;
    }

    pub fn average_point_differential(&self, player_id: &PlayerId) -> f64 {
        self.get(player_id).average_point_differential()
    }

    /// Applies the result of a completed (or forfeited) match to every
    /// participant's stats. `team1_score`/`team2_score` are `0` for a
    /// forfeit, in which case points are not recorded (§4.8).
    pub fn record_match_result(
        &mut self,
        m: &Match,
        winner_team: Team1Or2,
        team1_score: u32,
        team2_score: u32,
        record_points: bool,
    ) {
        let (winners, losers, winner_score, loser_score) = match winner_team {
            Team1Or2::Team1 => (&m.team1, &m.team2, team1_score, team2_score),
            Team1Or2::Team2 => (&m.team2, &m.team1, team2_score, team1_score),
        };

        for w in winners {
            let stats = self.get_mut(w);
            stats.wins += 1;
            stats.games_played += 1;
            if record_points {
                stats.total_points_for += winner_score;
                stats.total_points_against += loser_score;
            }
        }
        for l in losers {
            let stats = self.get_mut(l);
            stats.losses += 1;
            stats.games_played += 1;
            if record_points {
                stats.total_points_for += loser_score;
                stats.total_points_against += winner_score;
            }
        }

        for a in m.team1.iter() {
            for b in m.team1.iter() {
                if a != b {
                    *self.get_mut(a).partners_played.entry(b.clone()).or_insert(0) += 1;
                }
            }
            for b in m.team2.iter() {
                *self.get_mut(a).opponents_played.entry(b.clone()).or_insert(0) += 1;
            }
        }
        for a in m.team2.iter() {
            for b in m.team2.iter() {
                if a != b {
                    *self.get_mut(a).partners_played.entry(b.clone()).or_insert(0) += 1;
                }
            }
            for b in m.team1.iter() {
                *self.get_mut(a).opponents_played.entry(b.clone()).or_insert(0) += 1;
            }
        }
    }

    /// Exact inverse of [`Self::record_match_result`], used when an
    /// already-completed match's score is edited (§4.8, §8 edit law).
    pub fn rewind_match_result(
        &mut self,
        m: &Match,
        previous_winner_team: Team1Or2,
        previous_t1: u32,
        previous_t2: u32,
        had_points: bool,
    ) {
        let (winners, losers, winner_score, loser_score) = match previous_winner_team {
            Team1Or2::Team1 => (&m.team1, &m.team2, previous_t1, previous_t2),
            Team1Or2::Team2 => (&m.team2, &m.team1, previous_t2, previous_t1),
        };

        for w in winners {
            let stats = self.get_mut(w);
            stats.wins = stats.wins.saturating_sub(1);
            stats.games_played = stats.games_played.saturating_sub(1);
            if had_points {
                stats.total_points_for = stats.total_points_for.saturating_sub(winner_score);
                stats.total_points_against =
                    stats.total_points_against.saturating_sub(loser_score);
            }
        }
        for l in losers {
            let stats = self.get_mut(l);
            stats.losses = stats.losses.saturating_sub(1);
            stats.games_played = stats.games_played.saturating_sub(1);
            if had_points {
                stats.total_points_for = stats.total_points_for.saturating_sub(loser_score);
                stats.total_points_against =
                    stats.total_points_against.saturating_sub(winner_score);
            }
        }

        for a in m.team1.iter() {
            for b in m.team1.iter() {
                if a != b {
                    decrement(&mut self.get_mut(a).partners_played, b);
                }
            }
            for b in m.team2.iter() {
                decrement(&mut self.get_mut(a).opponents_played, b);
            }
        }
        for a in m.team2.iter() {
            for b in m.team2.iter() {
                if a != b {
                    decrement(&mut self.get_mut(a).partners_played, b);
                }
            }
            for b in m.team1.iter() {
                decrement(&mut self.get_mut(a).opponents_played, b);
            }
        }
    }

    /// Sorts `active_player_ids` by wins desc, then average point
    /// differential desc. Ties share the rank of the first tied position.
    /// Returns `(player_id, rank)` pairs in ranked order.
    pub fn ranking(&self, active_player_ids: &[PlayerId]) -> Vec<(PlayerId, u32)> {
        let mut ordered: Vec<&PlayerId> = active_player_ids.iter().collect();
        ordered.sort_by(|a, b| {
            let sa = self.get(a);
            let sb = self.get(b);
            sb.wins
                .cmp(&sa.wins)
                .then_with(|| {
                    sb.average_point_differential()
                        .partial_cmp(&sa.average_point_differential())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.cmp(b))
        });

        let mut ranks = Vec::with_capacity(ordered.len());
        let mut previous: Option<(u32, u32, i64)> = None; // (wins, rank, diff*1000 truncated)
        for (idx, id) in ordered.iter().enumerate() {
            let stats = self.get(id);
            let diff_key = (stats.average_point_differential() * 1000.0).round() as i64;
            let rank = match previous {
                Some((w, r, d)) if w == stats.wins && d == diff_key => r,
                _ => (idx as u32) + 1,
            };
            previous = Some((stats.wins, rank, diff_key));
            ranks.push(((*id).clone(), rank));
        }
        ranks
    }

    /// Ambient (§2.2): read-only leaderboard projection over `ranking`.
    pub fn export_standings(
        &self,
        active_player_ids: &[PlayerId],
        names: &BTreeMap<PlayerId, String>,
    ) -> Vec<StandingRow> {
        self.ranking(active_player_ids)
            .into_iter()
            .map(|(id, rank)| {
                let stats = self.get(&id);
                StandingRow {
                    display_name: names.get(&id).cloned().unwrap_or_default(),
                    player_id: id,
                    rank,
                    wins: stats.wins,
                    losses: stats.losses,
                    win_rate: stats.win_rate(),
                    games_played: stats.games_played,
                    games_waited: stats.games_waited,
                }
            })
            .collect()
    }
}

fn decrement(map: &mut BTreeMap<PlayerId, u32>, key: &PlayerId) {
    if let Some(v) = map.get_mut(key) {
        if *v <= 1 {
            map.remove(key);
        } else {
            *v -= 1;
        }
    }
}
