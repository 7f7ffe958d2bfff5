use std::collections::BTreeSet;

use crate::domain::model::{BannedPairSet, LockedTeams, PlayerId, QueuedMatchup, Session, SessionType};
use crate::service::utils::combinations;

/// §4.7: rebuilds the round-robin queue from scratch. Called whenever the
/// active roster changes; any unstarted entries from the previous queue are
/// discarded by the caller before this runs.
pub fn generate_queue(session: &Session, max_queue_len: usize) -> Vec<QueuedMatchup> {
    let players: Vec<PlayerId> = session.active_players.iter().cloned().collect();
    let candidates = candidate_matchups(&players, session.session_type, &session.banned_pairs);

    let mut queue: Vec<QueuedMatchup> = Vec::new();
    let mut games_played_in_queue: std::collections::BTreeMap<PlayerId, u32> =
        players.iter().map(|p| (p.clone(), 0)).collect();
    let mut used: Vec<bool> = vec![false; candidates.len()];
    let mut foursome_counts: std::collections::BTreeMap<Vec<PlayerId>, u32> =
        std::collections::BTreeMap::new();

    while queue.len() < max_queue_len {
        let mut used_this_round: BTreeSet<PlayerId> = BTreeSet::new();
        let mut added_any = false;

        loop {
            let mut scored: Vec<(f64, usize)> = candidates
                .iter()
                .enumerate()
                .filter(|(i, _)| !used[*i])
                .filter(|(_, m)| m.players().all(|p| !used_this_round.contains(p)))
                .map(|(i, m)| (score_matchup(m, &games_played_in_queue, &foursome_counts, session), i))
                .collect();

            if scored.is_empty() || queue.len() >= max_queue_len {
                break;
            }
            scored.sort_by(|a, b| {
                a.0.partial_cmp(&b.0)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| candidates[a.1].team1.cmp(&candidates[b.1].team1))
            });
            let (_, idx) = scored[0];
            let matchup = candidates[idx].clone();

            for p in matchup.players() {
                used_this_round.insert(p.clone());
                *games_played_in_queue.entry(p.clone()).or_insert(0) += 1;
            }
            let mut foursome: Vec<PlayerId> = matchup.players().cloned().collect();
            foursome.sort();
            *foursome_counts.entry(foursome).or_insert(0) += 1;

            used[idx] = true;
            queue.push(matchup);
            added_any = true;
        }

        if !added_any {
            break;
        }
    }

    queue
}

trait Players {
    fn players(&self) -> Vec<&PlayerId>;
}

impl Players for QueuedMatchup {
    fn players(&self) -> Vec<&PlayerId> {
        self.team1.iter().chain(self.team2.iter()).collect()
    }
}

fn candidate_matchups(
    players: &[PlayerId],
    session_type: SessionType,
    banned_pairs: &BannedPairSet,
) -> Vec<QueuedMatchup> {
    let mut out = Vec::new();
    match session_type {
        SessionType::Singles => {
            // Each player is their own team, so a banned pair (which only
            // restricts sharing a *team*, §3) never excludes a singles
            // matchup: the two players are always opponents, not teammates.
            for pair in combinations(players, 2) {
                out.push(QueuedMatchup {
                    team1: vec![pair[0].clone()],
                    team2: vec![pair[1].clone()],
                });
            }
        }
        SessionType::Doubles => {
            for four in combinations(players, 4) {
                let [a, b, c, d] = [four[0].clone(), four[1].clone(), four[2].clone(), four[3].clone()];
                let splits = [
                    (vec![a.clone(), b.clone()], vec![c.clone(), d.clone()]),
                    (vec![a.clone(), c.clone()], vec![b.clone(), d.clone()]),
                    (vec![a.clone(), d.clone()], vec![b.clone(), c.clone()]),
                ];
                for (team1, team2) in splits {
                    if banned_pairs.contains(&team1[0], &team1[1])
                        || banned_pairs.contains(&team2[0], &team2[1])
                    {
                        continue;
                    }
                    out.push(QueuedMatchup { team1, team2 });
                }
            }
        }
    }
    out
}

fn score_matchup(
    m: &QueuedMatchup,
    games_played_in_queue: &std::collections::BTreeMap<PlayerId, u32>,
    foursome_counts: &std::collections::BTreeMap<Vec<PlayerId>, u32>,
    session: &Session,
) -> f64 {
    let gp_sum: u32 = m
        .players()
        .iter()
        .map(|p| games_played_in_queue.get(*p).copied().unwrap_or(0))
        .sum();

    let mut foursome: Vec<PlayerId> = m.players().into_iter().cloned().collect();
    foursome.sort();
    let repeat_count = foursome_counts.get(&foursome).copied().unwrap_or(0);

    let mut partnership_count = 0u32;
    for team in [&m.team1, &m.team2] {
        for i in 0..team.len() {
            for j in (i + 1)..team.len() {
                partnership_count += session.stats.get(&team[i]).partner_count(&team[j]);
            }
        }
    }

    let mut opponent_count = 0u32;
    for a in &m.team1 {
        for b in &m.team2 {
            opponent_count += session.stats.get(a).opponent_count(b);
        }
    }

    1000.0 * gp_sum as f64
        + 500.0 * repeat_count as f64
        + 100.0 * partnership_count as f64
        + 50.0 * opponent_count as f64
}

/// §4.7 step 4: locked-teams variant, treating each declared team as one
/// atomic unit so partnership scoring never applies within it.
pub fn generate_queue_with_locked_teams(
    session: &Session,
    max_queue_len: usize,
    locked_teams: &LockedTeams,
) -> Vec<QueuedMatchup> {
    if locked_teams.0.is_empty() {
        return generate_queue(session, max_queue_len);
    }

    // Unlocked players mixing into ad-hoc pairs alongside locked teams is not
    // modeled: a locked-team session matches only team-vs-team (§4.4.7).
    let teams: Vec<(PlayerId, PlayerId)> = locked_teams.0.iter().map(|t| t.members.clone()).collect();
    let mut queue = Vec::new();
    let mut used: Vec<bool> = vec![false; teams.len()];
    let mut games_played: std::collections::BTreeMap<usize, u32> =
        (0..teams.len()).map(|i| (i, 0)).collect();

    while queue.len() < max_queue_len {
        let candidates: Vec<(usize, usize)> = (0..teams.len())
            .flat_map(|i| (0..teams.len()).map(move |j| (i, j)))
            .filter(|(i, j)| i != j && !used[*i] && !used[*j])
            .collect();
        if candidates.is_empty() {
            break;
        }
        let mut scored: Vec<(f64, (usize, usize))> = candidates
            .iter()
            .map(|&(i, j)| {
                let gp = games_played[&i] + games_played[&j];
                let prior = session.stats.get(&teams[i].0).opponent_count(&teams[j].0)
                    + session.stats.get(&teams[i].0).opponent_count(&teams[j].1)
                    + session.stats.get(&teams[i].1).opponent_count(&teams[j].0)
                    + session.stats.get(&teams[i].1).opponent_count(&teams[j].1);
                (1000.0 * gp as f64 + 100.0 * prior as f64, (i, j))
            })
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let (_, (i, j)) = scored[0];
        used[i] = true;
        used[j] = true;
        *games_played.get_mut(&i).unwrap() += 1;
        *games_played.get_mut(&j).unwrap() += 1;
        queue.push(QueuedMatchup {
            team1: vec![teams[i].0.clone(), teams[i].1.clone()],
            team2: vec![teams[j].0.clone(), teams[j].1.clone()],
        });
    }

    queue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::Config;
    use crate::domain::model::{CourtVarietyTracker, Player, PseudoRandomSource, SessionMode};
    use std::collections::{BTreeMap, BTreeSet};

    fn session_with(players: &[&str], session_type: SessionType) -> Session {
        let mut active = BTreeSet::new();
        let mut map = BTreeMap::new();
        for p in players {
            let id = PlayerId(p.to_string());
            active.insert(id.clone());
            map.insert(id.clone(), Player { id: id.clone(), display_name: p.to_string() });
        }
        Session {
            schema_version: 1,
            mode: SessionMode::RoundRobin,
            session_type,
            court_count: 2,
            config: Config::default(),
            banned_pairs: BannedPairSet::default(),
            locked_teams: LockedTeams::default(),
            players: map,
            active_players: active,
            waiting_players: Vec::new(),
            matches: Vec::new(),
            stats: Default::default(),
            court_variety: CourtVarietyTracker::new(2),
            round_robin_queue: Vec::new(),
            rng: PseudoRandomSource::from_seed(1),
            events: Vec::new(),
        }
    }

    #[test]
    fn no_queued_match_contains_a_banned_pair() {
        let mut session = session_with(&["a", "b", "c", "d", "e", "f", "g", "h"], SessionType::Doubles);
        session.banned_pairs.insert(&PlayerId("a".into()), &PlayerId("b".into()));
        let queue = generate_queue(&session, 10);
        for m in &queue {
            assert!(!session.banned_pairs.contains(&m.team1[0], &m.team1[1]));
            assert!(!session.banned_pairs.contains(&m.team2[0], &m.team2[1]));
        }
    }

    #[test]
    fn singles_queue_has_no_repeated_player_within_a_match() {
        let session = session_with(&["a", "b", "c", "d"], SessionType::Singles);
        let queue = generate_queue(&session, 6);
        for m in &queue {
            assert_ne!(m.team1[0], m.team2[0]);
        }
    }

    #[test]
    fn queue_is_nonempty_for_sufficient_players() {
        let session = session_with(&["a", "b", "c", "d", "e", "f", "g", "h"], SessionType::Doubles);
        let queue = generate_queue(&session, 4);
        assert!(!queue.is_empty());
    }
}
