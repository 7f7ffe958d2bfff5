use chrono::{DateTime, Utc};
use tracing::info;

use crate::common::error::{EngineError, EngineResult, SnapshotError};
use crate::domain::config::ConfigPatch;
use crate::domain::dto::CreateSessionConfig;
use crate::domain::model::{
    CourtVarietyTracker, Match, MatchId, MatchStatus, Player, PlayerId, PseudoRandomSource, Score,
    Session, SessionEventKind, StandingRow, Team1Or2, SCHEMA_VERSION,
};
use crate::service::evaluation_driver;
use crate::service::utils::stable_shuffle;

/// §4.8: initialize a fresh session and run the driver once so a session
/// with enough players immediately has its first matches.
pub fn create_session(request: CreateSessionConfig, now: DateTime<Utc>) -> EngineResult<Session> {
    let players_per_match = request.session_type.players_per_match();
    if request.players.len() < players_per_match {
        return Err(EngineError::InsufficientPlayers {
            needed: players_per_match,
            have: request.players.len(),
        });
    }

    let config = request.advanced_config.unwrap_or_default();
    let seed = request.test_seed.unwrap_or_else(|| now.timestamp_millis() as u64);
    let mut rng = PseudoRandomSource::from_seed(seed);

    let mut ordered_players = request.players.clone();
    if request.randomize_initial_order {
        ordered_players = stable_shuffle(&ordered_players, &mut rng);
    }

    let mut players = std::collections::BTreeMap::new();
    let mut active_players = std::collections::BTreeSet::new();
    let mut stats = crate::service::stats_store::StatsStore::default();
    for p in &ordered_players {
        players.insert(p.id.clone(), p.clone());
        active_players.insert(p.id.clone());
        stats.create(p.id.clone());
    }

    let mut session = Session {
        schema_version: SCHEMA_VERSION,
        mode: request.mode,
        session_type: request.session_type,
        court_count: request.court_count,
        config,
        banned_pairs: request.banned_pairs,
        locked_teams: request.locked_teams,
        players,
        active_players,
        waiting_players: Vec::new(),
        matches: Vec::new(),
        stats,
        court_variety: CourtVarietyTracker::new(request.court_count),
        round_robin_queue: Vec::new(),
        rng,
        events: Vec::new(),
    };

    session.record_event(SessionEventKind::SessionCreated, now);
    info!(players = session.players.len(), court_count = session.court_count, "session created");
    evaluation_driver::evaluate(&mut session, now);
    Ok(session)
}

/// §4.8: `games_waited := max(games_waited over current waiters) + 1` gives
/// the newcomer fair priority against the longest-waiting incumbent.
pub fn add_player(session: &mut Session, player: Player, now: DateTime<Utc>) -> EngineResult<()> {
    let max_wait = session
        .waiting_players
        .iter()
        .map(|p| session.stats.get(p).games_waited)
        .max()
        .unwrap_or(0);

    session.active_players.insert(player.id.clone());
    session.players.insert(player.id.clone(), player.clone());
    session.stats.create(player.id.clone());
    session.stats.get_mut(&player.id).games_waited = max_wait + 1;

    session.round_robin_queue.clear();
    session.record_event(SessionEventKind::PlayerAdded { player: player.id }, now);
    evaluation_driver::evaluate(session, now);
    Ok(())
}

/// §4.8: if the player is mid-match, that match is forfeited (their
/// opponents win) before removal.
pub fn remove_player(session: &mut Session, player_id: PlayerId, now: DateTime<Utc>) -> EngineResult<()> {
    if !session.active_players.contains(&player_id) {
        return Err(EngineError::UnknownPlayer(player_id));
    }

    let live_match = session
        .matches
        .iter()
        .find(|m| m.is_live() && m.contains(&player_id))
        .map(|m| m.id);

    if let Some(match_id) = live_match {
        let m = session.match_by_id(match_id).unwrap();
        let winner = if m.team1.contains(&player_id) { Team1Or2::Team2 } else { Team1Or2::Team1 };
        do_forfeit(session, match_id, winner, now)?;
    }

    session.active_players.remove(&player_id);
    session.waiting_players.retain(|p| p != &player_id);
    session.round_robin_queue.clear();
    session.record_event(SessionEventKind::PlayerRemoved { player: player_id }, now);
    evaluation_driver::evaluate(session, now);
    Ok(())
}

/// §4.8: `start_match` transitions `waiting` → `in-progress` and stamps the
/// start time. Does not re-invoke the driver: the court was already
/// occupied the moment the match was created as `waiting`.
pub fn start_match(session: &mut Session, match_id: MatchId, now: DateTime<Utc>) -> EngineResult<()> {
    let m = session.match_by_id_mut(match_id).ok_or(EngineError::UnknownMatch(match_id))?;
    if m.status != MatchStatus::Waiting {
        return Err(EngineError::IllegalTransition {
            reason: format!("match {match_id} is not waiting"),
        });
    }
    m.status = MatchStatus::InProgress;
    m.start_time = Some(now);
    session.record_event(SessionEventKind::MatchStarted { match_id }, now);
    Ok(())
}

/// §4.8 / §8 edit law: completing an already-completed match rewinds the
/// prior stats effect before applying the new score, and does not
/// re-invoke the driver (the court's occupancy is unaffected by an edit).
pub fn complete_match(
    session: &mut Session,
    match_id: MatchId,
    team1_score: u32,
    team2_score: u32,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    if team1_score == team2_score {
        return Err(EngineError::InvalidScore {
            team1_score: team1_score as i64,
            team2_score: team2_score as i64,
        });
    }

    let m = session.match_by_id(match_id).ok_or(EngineError::UnknownMatch(match_id))?.clone();
    let is_edit = m.status == MatchStatus::Completed;
    if !is_edit && m.status != MatchStatus::InProgress {
        return Err(EngineError::IllegalTransition {
            reason: format!("match {match_id} is not in progress"),
        });
    }

    if is_edit {
        let prev_winner = m.score.and_then(|s| s.winner()).unwrap_or(Team1Or2::Team1);
        let prev_score = m.score.unwrap();
        session.stats.rewind_match_result(&m, prev_winner, prev_score.team1_score, prev_score.team2_score, true);
    }

    let new_score = Score { team1_score, team2_score };
    let winner = new_score.winner().ok_or(EngineError::InvalidScore {
        team1_score: team1_score as i64,
        team2_score: team2_score as i64,
    })?;
    session.stats.record_match_result(&m, winner, team1_score, team2_score, true);

    let court = m.court;
    let mm = session.match_by_id_mut(match_id).unwrap();
    mm.status = MatchStatus::Completed;
    mm.score = Some(new_score);
    mm.end_time = Some(now);

    if is_edit {
        session.record_event(SessionEventKind::MatchEdited { match_id }, now);
    } else {
        session.court_variety.record_finish(court);
        session.court_variety.update_thresholds();
        session.record_event(SessionEventKind::MatchCompleted { match_id, court }, now);
        evaluation_driver::evaluate(session, now);
    }
    Ok(())
}

/// §4.8: `forfeit_match` transitions → forfeited; wins/losses update but
/// points do not.
pub fn forfeit_match(
    session: &mut Session,
    match_id: MatchId,
    winning_team: Team1Or2,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    do_forfeit(session, match_id, winning_team, now)?;
    evaluation_driver::evaluate(session, now);
    Ok(())
}

fn do_forfeit(
    session: &mut Session,
    match_id: MatchId,
    winning_team: Team1Or2,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    let m = session.match_by_id(match_id).ok_or(EngineError::UnknownMatch(match_id))?.clone();
    if !m.is_live() {
        return Err(EngineError::IllegalTransition {
            reason: format!("match {match_id} is not live"),
        });
    }

    session.stats.record_match_result(&m, winning_team, 0, 0, false);

    let court = m.court;
    let mm = session.match_by_id_mut(match_id).unwrap();
    mm.status = MatchStatus::Forfeited;
    mm.end_time = Some(now);

    session.court_variety.record_finish(court);
    session.court_variety.update_thresholds();
    session.record_event(SessionEventKind::MatchForfeited { match_id, court }, now);
    Ok(())
}

/// §4.8: manual override. Bypasses HARD-CAP entirely, but the resulting
/// match still participates in CourtVarietyTracker on completion.
pub fn make_court(
    session: &mut Session,
    court_number: u32,
    team1: Vec<PlayerId>,
    team2: Vec<PlayerId>,
    now: DateTime<Utc>,
) -> EngineResult<()> {
    let mut seen = std::collections::BTreeSet::new();
    for p in team1.iter().chain(team2.iter()) {
        if !seen.insert(p) {
            return Err(EngineError::IllegalTransition {
                reason: format!("player {p} listed twice in make_court"),
            });
        }
        if !session.active_players.contains(p) {
            return Err(EngineError::UnknownPlayer(p.clone()));
        }
    }
    if session.banned_pairs.any_within(&team1) {
        return Err(EngineError::BannedPairViolation { a: team1[0].clone(), b: team1[1].clone() });
    }
    if session.banned_pairs.any_within(&team2) {
        return Err(EngineError::BannedPairViolation { a: team2[0].clone(), b: team2[1].clone() });
    }
    if session.busy_courts().contains(&court_number) {
        return Err(EngineError::CourtOccupied(court_number));
    }

    let match_id = MatchId::new(&mut session.rng);
    session.matches.push(Match {
        id: match_id,
        court: court_number,
        team1,
        team2,
        status: MatchStatus::InProgress,
        score: None,
        start_time: Some(now),
        end_time: None,
    });
    session.record_event(SessionEventKind::CourtMadeManually { court: court_number }, now);
    Ok(())
}

/// §4.8: returns the session to a setup-like state, keeping only the active
/// roster and banned pairs.
pub fn edit_session(session: &mut Session, now: DateTime<Utc>) -> EngineResult<()> {
    session.matches.clear();
    session.stats = crate::service::stats_store::StatsStore::default();
    for p in &session.active_players {
        session.stats.create(p.clone());
    }
    session.court_variety = CourtVarietyTracker::new(session.court_count);
    session.round_robin_queue.clear();
    session.waiting_players.clear();
    session.record_event(SessionEventKind::SessionEdited, now);
    Ok(())
}

/// §4.8: atomic deep-merge; a bad patch never partially applies.
pub fn update_advanced_config(session: &mut Session, patch: ConfigPatch, now: DateTime<Utc>) -> EngineResult<()> {
    session.config = session.config.merged(&patch)?;
    session.record_event(SessionEventKind::ConfigUpdated, now);
    Ok(())
}

/// §6: textual, schema-versioned, forward-compatible snapshot export.
pub fn export_snapshot(session: &Session) -> Vec<u8> {
    serde_json::to_vec(session).expect("Session serialization is infallible")
}

pub fn import_snapshot(bytes: &[u8]) -> Result<Session, SnapshotError> {
    let session: Session = serde_json::from_slice(bytes)?;
    if session.schema_version > SCHEMA_VERSION {
        return Err(SnapshotError::UnsupportedVersion(session.schema_version));
    }
    Ok(session)
}

/// Ambient (§2.2): read-only leaderboard projection.
pub fn export_standings(session: &Session) -> Vec<StandingRow> {
    let active: Vec<PlayerId> = session.active_players.iter().cloned().collect();
    let names = session
        .players
        .iter()
        .map(|(id, p)| (id.clone(), p.display_name.clone()))
        .collect();
    session.stats.export_standings(&active, &names)
}

/// Ambient (§2.2): read-only audit trail.
pub fn session_events(session: &Session) -> &[crate::domain::model::SessionEventRecord] {
    &session.events
}
