use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::model::{
    Match, MatchStatus, PlayerId, Session, SessionEventKind, SessionMode, WAITLIST_COURT,
};
use crate::service::king_of_court::{self, CourtDecision0};
use crate::service::rating::{self, Rating};
use crate::service::round_robin;

/// §4.6: the single entry point invoked by every lifecycle operation after a
/// state change. Idempotent: a session already satisfying all invariants is
/// returned unchanged (modulo the appended, possibly-empty event record).
pub fn evaluate(session: &mut Session, now: DateTime<Utc>) {
    let empty = session.empty_courts();
    let avail = session.available_players();
    let players_per_match = session.players_per_match();

    if empty.is_empty() || avail.len() < players_per_match {
        session.record_event(
            SessionEventKind::MatchesCreated { court_numbers: Vec::new() },
            now,
        );
        debug!(court_numbers = ?Vec::<u32>::new(), "evaluation produced no matches");
        return;
    }

    // On a brand new session (no matches have ever been created), nobody has
    // played and nobody has "just finished" a match either, so the entire
    // available pool counts as `PreviouslyWaiting` for this round's
    // bookkeeping — otherwise the players left over from the very first
    // round would never pick up their first `games_waited` increment.
    let previously_waiting: BTreeSet<PlayerId> = if session.matches.is_empty() {
        avail.iter().cloned().collect()
    } else {
        session.waiting_players.iter().cloned().collect()
    };

    let created_courts = match session.mode {
        SessionMode::RoundRobin => evaluate_round_robin(session, &empty, &avail, players_per_match, now),
        SessionMode::KingOfCourt => evaluate_king_of_court(session, &empty, &avail, players_per_match, now),
    };

    update_waiting_and_stats(session, &previously_waiting);

    session.record_event(
        SessionEventKind::MatchesCreated { court_numbers: created_courts.clone() },
        now,
    );
    debug!(court_numbers = ?created_courts, "evaluation created matches");
}

fn evaluate_round_robin(
    session: &mut Session,
    empty: &[u32],
    avail: &[PlayerId],
    players_per_match: usize,
    now: DateTime<Utc>,
) -> Vec<u32> {
    let max_matches = empty.len().min(avail.len() / players_per_match);
    if max_matches == 0 {
        return Vec::new();
    }

    if session.round_robin_queue.is_empty() {
        session.round_robin_queue = if session.locked_teams.0.is_empty() {
            round_robin::generate_queue(session, 64)
        } else {
            round_robin::generate_queue_with_locked_teams(session, 64, &session.locked_teams.clone())
        };
    }

    let mut busy: BTreeSet<PlayerId> = session
        .matches
        .iter()
        .filter(|m| m.is_live())
        .flat_map(|m| m.players().cloned())
        .collect();

    let mut created_courts = Vec::new();
    let mut remaining_queue = std::mem::take(&mut session.round_robin_queue);

    for &court in empty {
        if created_courts.len() >= max_matches {
            break;
        }
        let pos = remaining_queue
            .iter()
            .position(|m| m.team1.iter().chain(m.team2.iter()).all(|p| !busy.contains(p)));
        let Some(pos) = pos else { break };
        let matchup = remaining_queue.remove(pos);

        for p in matchup.team1.iter().chain(matchup.team2.iter()) {
            busy.insert(p.clone());
        }

        let match_id = crate::domain::model::MatchId::new(&mut session.rng);
        session.matches.push(Match {
            id: match_id,
            court,
            team1: matchup.team1,
            team2: matchup.team2,
            status: MatchStatus::Waiting,
            score: None,
            start_time: None,
            end_time: None,
        });
        created_courts.push(court);
        session.record_event(SessionEventKind::MatchStarted { match_id }, now);
    }

    session.round_robin_queue = remaining_queue;
    created_courts
}

fn evaluate_king_of_court(
    session: &mut Session,
    empty: &[u32],
    avail: &[PlayerId],
    players_per_match: usize,
    now: DateTime<Utc>,
) -> Vec<u32> {
    let ratings: BTreeMap<PlayerId, Rating> = avail
        .iter()
        .map(|p| (p.clone(), rating::compute_rating(&session.stats.get(p), &session.config)))
        .collect();
    let ranked = rating::rank_players(avail, &ratings);
    let brackets = rating::brackets(&ranked, &ratings, session.config.ranking_range_percentage);

    let mut pool: Vec<PlayerId> = avail.to_vec();
    let mut created_courts = Vec::new();
    let mut running_courts_involved: BTreeSet<u32> = BTreeSet::new();

    for &court in empty {
        if pool.len() < players_per_match {
            break;
        }

        let decision = king_of_court::decide(session, pool.len(), players_per_match, true);
        if decision == CourtDecision0::Wait {
            continue;
        }

        let Some((team1, team2)) = king_of_court::select_group_and_teams(
            session,
            &pool,
            court,
            players_per_match,
            &ratings,
            &brackets,
        ) else {
            continue;
        };

        // §4.6 step 5: build the tentative courts-involved set for *this*
        // court and check HARD-CAP before committing. A violation skips
        // only this court — the loop still tries every remaining empty
        // court before the round's leftover players end up waiting
        // ("court-utilization priority").
        let will_still_wait = pool.len() > players_per_match;
        let hard_cap_forbids = session.config.hard_cap_enabled && {
            let mut tentative = running_courts_involved.clone();
            tentative.insert(court);
            if will_still_wait {
                tentative.insert(WAITLIST_COURT);
            }
            session.court_variety.violates_hard_cap(&tentative)
        };
        if hard_cap_forbids {
            continue;
        }

        let seated: BTreeSet<PlayerId> = team1.iter().chain(team2.iter()).cloned().collect();
        pool.retain(|p| !seated.contains(p));

        let match_id = crate::domain::model::MatchId::new(&mut session.rng);
        session.matches.push(Match {
            id: match_id,
            court,
            team1,
            team2,
            status: MatchStatus::Waiting,
            score: None,
            start_time: None,
            end_time: None,
        });
        created_courts.push(court);
        session.record_event(SessionEventKind::MatchStarted { match_id }, now);

        running_courts_involved.insert(court);
        if !pool.is_empty() {
            running_courts_involved.insert(WAITLIST_COURT);
        }
    }

    if !running_courts_involved.is_empty() {
        session.court_variety.record_mix(&running_courts_involved);
    }

    created_courts
}

fn update_waiting_and_stats(session: &mut Session, previously_waiting: &BTreeSet<PlayerId>) {
    let new_waiting: Vec<PlayerId> = king_of_court::wait_fair_order(
        session,
        &session.available_players(),
        &session
            .available_players()
            .iter()
            .map(|p| (p.clone(), rating::compute_rating(&session.stats.get(p), &session.config)))
            .collect(),
    );
    let new_waiting_set: BTreeSet<PlayerId> = new_waiting.iter().cloned().collect();

    for p in previously_waiting {
        if new_waiting_set.contains(p) {
            session.stats.increment_wait(p);
        } else {
            session.stats.reset_wait(p);
        }
    }

    session.waiting_players = new_waiting;
}
