use std::collections::{BTreeMap, BTreeSet};

use crate::domain::config::Config;
use crate::domain::model::{BannedPairSet, LockedTeams, PlayerId, Session};
use crate::service::rating::{self, Rating};
use crate::service::utils::combinations;

/// Wait-fair order (§4.4.3): `games_waited` desc, `games_played` asc,
/// rating-distance-to-median asc, id asc.
pub fn wait_fair_order(
    session: &Session,
    pool: &[PlayerId],
    ratings: &BTreeMap<PlayerId, Rating>,
) -> Vec<PlayerId> {
    let values: Vec<f64> = ratings.values().map(|r| r.value).collect();
    let median = rating::median(&values);

    let mut ordered: Vec<PlayerId> = pool.to_vec();
    ordered.sort_by(|a, b| {
        let sa = session.stats.get(a);
        let sb = session.stats.get(b);
        let dist_a = ratings.get(a).map(|r| (r.value - median).abs()).unwrap_or(0.0);
        let dist_b = ratings.get(b).map(|r| (r.value - median).abs()).unwrap_or(0.0);
        sb.games_waited
            .cmp(&sa.games_waited)
            .then_with(|| sa.games_played.cmp(&sb.games_played))
            .then_with(|| dist_a.partial_cmp(&dist_b).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.cmp(b))
    });
    ordered
}

/// §4.4.4 rules 1-3 and 5: does the matcher create a match on an empty court
/// right now, or wait? Rule 4 (the HARD-CAP "wait" rule) is not decided
/// here: the driver checks `violates_hard_cap` per candidate court placement
/// once a concrete group has been chosen, and skips that court rather than
/// waiting outright, trying every remaining empty court first (§4.6 step 5,
/// "court-utilization priority").
pub fn decide(
    session: &Session,
    avail_count: usize,
    players_per_match: usize,
    empty_court_exists: bool,
) -> CourtDecision0 {
    if empty_court_exists && avail_count >= players_per_match {
        return CourtDecision0::Create;
    }
    if session
        .active_players
        .iter()
        .any(|p| session.stats.get(p).games_waited >= session.config.max_consecutive_waits)
    {
        return CourtDecision0::Create;
    }
    if session.completed_match_count() < session.config.min_completed_matches_for_waiting as usize
    {
        return CourtDecision0::Create;
    }
    CourtDecision0::Create
}

/// Yes/no outcome of [`decide`], before a concrete group has been selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourtDecision0 {
    Create,
    Wait,
}

/// §4.4.5 + §4.4.6: choose `players_per_match` players from `pool` for
/// `target_court` and split them into teams. Returns `None` if no
/// bracket-compatible, banned-pair-free group exists.
pub fn select_group_and_teams(
    session: &Session,
    pool: &[PlayerId],
    target_court: u32,
    players_per_match: usize,
    ratings: &BTreeMap<PlayerId, Rating>,
    brackets: &BTreeMap<PlayerId, Option<u8>>,
) -> Option<(Vec<PlayerId>, Vec<PlayerId>)> {
    let config = &session.config;
    let recent_on_court = recent_players_on_court(session, target_court);

    let mut best: Option<(f64, Vec<PlayerId>, Vec<PlayerId>)> = None;

    for group in combinations(pool, players_per_match) {
        if !bracket_compatible_group(&group, brackets) {
            continue;
        }
        let Some((team1, team2, team_score)) =
            best_team_split(session, &group, &session.locked_teams, &session.banned_pairs, config)
        else {
            continue;
        };

        let wait_term: i64 = group
            .iter()
            .map(|p| session.stats.get(p).games_waited as i64)
            .sum();
        let mut score = -(wait_term as f64) + team_score;

        let overlap = group.iter().filter(|p| recent_on_court.contains(*p)).count();
        if overlap as u32 >= config.back_to_back_overlap_threshold {
            score += config.recent_overlap_penalty;
        }

        let candidate_max_wait = group
            .iter()
            .map(|p| session.stats.get(p).games_waited)
            .max()
            .unwrap_or(0);

        let better = match &best {
            None => true,
            Some((best_score, best_group, _)) => {
                if (score - *best_score).abs() > f64::EPSILON {
                    score < *best_score
                } else {
                    let best_max_wait = best_group
                        .iter()
                        .map(|p| session.stats.get(p).games_waited)
                        .max()
                        .unwrap_or(0);
                    if candidate_max_wait != best_max_wait {
                        candidate_max_wait > best_max_wait
                    } else {
                        group < *best_group
                    }
                }
            }
        };

        if better {
            best = Some((score, team1, team2));
        }
    }

    best.map(|(_, t1, t2)| (t1, t2))
}

fn bracket_compatible_group(group: &[PlayerId], brackets: &BTreeMap<PlayerId, Option<u8>>) -> bool {
    let mut members = group.iter().filter_map(|p| brackets.get(p).copied().flatten());
    match members.next() {
        None => true,
        Some(first) => members.all(|b| b == first),
    }
}

fn recent_players_on_court(session: &Session, court: u32) -> BTreeSet<PlayerId> {
    session
        .matches
        .iter()
        .filter(|m| m.court == court)
        .max_by_key(|m| m.end_time.or(m.start_time))
        .map(|m| m.players().cloned().collect())
        .unwrap_or_default()
}

/// §4.4.6: evaluate every legal team split of `group` and return the best
/// one plus its score, or `None` if every split is hard-rejected (banned
/// pair or locked-team violation).
fn best_team_split(
    session: &Session,
    group: &[PlayerId],
    locked_teams: &LockedTeams,
    banned_pairs: &BannedPairSet,
    config: &Config,
) -> Option<(Vec<PlayerId>, Vec<PlayerId>, f64)> {
    if group.len() == 2 {
        // Singles: each player is their own team, so the pair is always
        // opponents, never teammates. A banned pair only restricts who may
        // share a *team* (§3), so it does not apply here.
        let (a, b) = (group[0].clone(), group[1].clone());
        return Some((vec![a], vec![b], 0.0));
    }

    debug_assert_eq!(group.len(), 4);
    let [a, b, c, d] = [
        group[0].clone(),
        group[1].clone(),
        group[2].clone(),
        group[3].clone(),
    ];
    let splits: [[PlayerId; 4]; 3] = [
        [a.clone(), b.clone(), c.clone(), d.clone()],
        [a.clone(), c.clone(), b.clone(), d.clone()],
        [a.clone(), d.clone(), b.clone(), c.clone()],
    ];

    let mut best: Option<(f64, Vec<PlayerId>, Vec<PlayerId>, u32)> = None;

    for [t1a, t1b, t2a, t2b] in splits {
        let team1 = vec![t1a.clone(), t1b.clone()];
        let team2 = vec![t2a.clone(), t2b.clone()];

        if banned_pairs.contains(&t1a, &t1b) || banned_pairs.contains(&t2a, &t2b) {
            continue;
        }
        if violates_locked_teams(&team1, &team2, locked_teams) {
            continue;
        }

        let team1_rating = team_rating(session, &team1);
        let team2_rating = team_rating(session, &team2);
        let imbalance = (team1_rating - team2_rating).abs();

        let mut score = imbalance * config.team_balance_penalty;
        let mut historical_partnerships = 0u32;

        for (x, y) in [(&t1a, &t1b), (&t2a, &t2b)] {
            let count = session.stats.get(x).partner_count(y);
            historical_partnerships += count;
            if count == 0 {
                score -= config.partnership_variety_weight;
            } else {
                score += config.partnership_repeat_penalty * count as f64;
            }
            if recent_partners(session, x, y, config.recent_partnership_window) {
                score += config.recent_partnership_penalty;
            }
        }

        let better = match &best {
            None => true,
            Some((best_score, best_team1, _, best_hist)) => {
                if (score - *best_score).abs() > f64::EPSILON {
                    score < *best_score
                } else if imbalance != 0.0 && historical_partnerships != *best_hist {
                    historical_partnerships < *best_hist
                } else {
                    &team1 < best_team1
                }
            }
        };

        if better {
            best = Some((score, team1, team2, historical_partnerships));
        }
    }

    best.map(|(score, t1, t2, _)| (t1, t2, score))
}

fn violates_locked_teams(team1: &[PlayerId], team2: &[PlayerId], locked_teams: &LockedTeams) -> bool {
    for p in team1.iter().chain(team2.iter()) {
        if let Some(mate) = locked_teams.teammate_of(p) {
            let same_team_as_mate = team1.contains(p) && team1.contains(mate)
                || team2.contains(p) && team2.contains(mate);
            let mate_present = team1.contains(mate) || team2.contains(mate);
            if mate_present && !same_team_as_mate {
                return true;
            }
        }
    }
    false
}

fn team_rating(session: &Session, team: &[PlayerId]) -> f64 {
    let config = &session.config;
    let sum: f64 = team
        .iter()
        .map(|p| crate::service::rating::compute_rating(&session.stats.get(p), config).value)
        .sum();
    sum / team.len() as f64
}

/// Whether `x` and `y` partnered within the last `window` matches on any
/// court (§4.4.6, `R` in the spec).
fn recent_partners(session: &Session, x: &PlayerId, y: &PlayerId, window: u32) -> bool {
    session
        .matches
        .iter()
        .rev()
        .take(window as usize)
        .any(|m| {
            (m.team1.contains(x) && m.team1.contains(y)) || (m.team2.contains(x) && m.team2.contains(y))
        })
}

/// §4.4.7: when locked teams exist, rating is the mean of the team's
/// members. Used by callers that need a team's effective rating outside a
/// concrete match proposal (e.g. future bracket computation over teams).
pub fn locked_team_rating(session: &Session, a: &PlayerId, b: &PlayerId) -> f64 {
    team_rating(session, &[a.clone(), b.clone()])
}
