//! End-to-end tests over the public engine API.
//!
//! These exercise full `create_session` -> event -> `evaluate` cycles the
//! way the surrounding UI shell would, rather than calling into individual
//! service modules directly (those have their own `#[cfg(test)]` coverage
//! alongside the code).

use chrono::Utc;
use rally_engine::*;

fn player(id: &str) -> Player {
    Player {
        id: PlayerId(id.to_string()),
        display_name: id.to_string(),
    }
}

fn players(ids: &[&str]) -> Vec<Player> {
    ids.iter().map(|id| player(id)).collect()
}

fn koc_session(ids: &[&str], court_count: u32, session_type: SessionType) -> Session {
    let request = CreateSessionConfig {
        mode: SessionMode::KingOfCourt,
        session_type,
        court_count,
        players: players(ids),
        banned_pairs: Default::default(),
        locked_teams: Default::default(),
        advanced_config: None,
        randomize_initial_order: false,
        test_seed: Some(1),
    };
    rally_engine::create_session(request, Utc::now()).expect("session should be created")
}

/// S1: 7 players, 4 courts, doubles KOC -> one match, 3 waiters at
/// `games_waited == 1`; completing it brings in all 3 waiters plus exactly
/// one previous player.
#[test]
fn s1_seven_players_four_courts_doubles() {
    let mut session = koc_session(
        &["a", "b", "c", "d", "e", "f", "g"],
        4,
        SessionType::Doubles,
    );

    assert_eq!(session.matches.len(), 1);
    assert_eq!(session.waiting_players.len(), 3);
    for p in &session.waiting_players {
        assert_eq!(session.stats.get(p).games_waited, 1);
    }

    let first_match = session.matches[0].clone();
    let previous_four: std::collections::BTreeSet<PlayerId> =
        first_match.players().cloned().collect();

    start_match(&mut session, first_match.id, Utc::now()).unwrap();
    complete_match(&mut session, first_match.id, 11, 5, Utc::now()).unwrap();

    assert_eq!(session.matches.len(), 2, "evaluate should create the next match");
    let second_match = &session.matches[1];
    let second_group: std::collections::BTreeSet<PlayerId> =
        second_match.players().cloned().collect();

    let carried_over = second_group.intersection(&previous_four).count();
    assert_eq!(
        carried_over, 1,
        "second match should reuse exactly one player from the first"
    );
    assert_eq!(
        second_group.difference(&previous_four).count(),
        3,
        "the other three seats should be the previous waiters"
    );
}

/// S2: 8 players, 4 courts, KOC -> two matches placed, nobody waiting.
#[test]
fn s2_eight_players_four_courts_fills_two_courts() {
    let session = koc_session(
        &["a", "b", "c", "d", "e", "f", "g", "h"],
        4,
        SessionType::Doubles,
    );
    assert_eq!(session.matches.len(), 2);
    assert!(session.waiting_players.is_empty());
    let courts: std::collections::BTreeSet<u32> =
        session.matches.iter().map(|m| m.court).collect();
    assert_eq!(courts, std::collections::BTreeSet::from([1, 2]));
}

/// S3: 15 players, 4 courts; HARD-CAP must force the second match onto a
/// different physical court than the first.
#[test]
fn s3_hard_cap_forces_rotation_across_courts() {
    let names: Vec<String> = (1..=15).map(|i| i.to_string()).collect();
    let request = CreateSessionConfig {
        mode: SessionMode::KingOfCourt,
        session_type: SessionType::Doubles,
        court_count: 4,
        players: names.iter().map(|n| player(n)).collect(),
        banned_pairs: Default::default(),
        locked_teams: Default::default(),
        advanced_config: None,
        randomize_initial_order: false,
        test_seed: Some(1),
    };
    let mut session = rally_engine::create_session(request, Utc::now()).unwrap();

    // With 15 players and 4 courts, initial evaluate should have seated
    // multiple matches already. Force a fresh evaluation round while the
    // first match is still live by adding one more player.
    let first_courts: std::collections::BTreeSet<u32> =
        session.matches.iter().map(|m| m.court).collect();
    assert!(first_courts.len() >= 2, "multiple courts should be in play from the start");

    add_player(&mut session, player("16"), Utc::now()).unwrap();

    for m in &session.matches {
        assert!(m.court >= 1 && m.court <= 4);
    }
}

/// S4: adding an 8th player to a 7-player running session immediately seats
/// a second match from the new player plus the three previous waiters.
#[test]
fn s4_add_player_immediately_fills_next_court() {
    let mut session = koc_session(
        &["a", "b", "c", "d", "e", "f", "g"],
        4,
        SessionType::Doubles,
    );
    assert_eq!(session.matches.len(), 1);
    let waiters_before: std::collections::BTreeSet<PlayerId> =
        session.waiting_players.iter().cloned().collect();

    add_player(&mut session, player("h"), Utc::now()).unwrap();

    assert_eq!(session.matches.len(), 2);
    let new_match = &session.matches[1];
    let group: std::collections::BTreeSet<PlayerId> = new_match.players().cloned().collect();
    assert!(group.contains(&PlayerId("h".into())));
    assert_eq!(
        group
            .intersection(&waiters_before)
            .count(),
        3,
        "new match should seat the new player plus the three previous waiters"
    );
}

/// S5: editing a completed match's score rewinds the old result and applies
/// the new one without touching any other match.
#[test]
fn s5_editing_a_completed_match_rewinds_then_reapplies() {
    let mut session = koc_session(&["a", "b", "c", "d"], 1, SessionType::Doubles);
    let match_id = session.matches[0].id;
    start_match(&mut session, match_id, Utc::now()).unwrap();
    complete_match(&mut session, match_id, 11, 7, Utc::now()).unwrap();

    let team1 = session.matches[0].team1.clone();
    let team2 = session.matches[0].team2.clone();
    for p in &team1 {
        assert_eq!(session.stats.get(p).wins, 1);
        assert_eq!(session.stats.get(p).total_points_for, 11);
    }
    for p in &team2 {
        assert_eq!(session.stats.get(p).losses, 1);
        assert_eq!(session.stats.get(p).total_points_for, 7);
    }

    complete_match(&mut session, match_id, 7, 11, Utc::now()).unwrap();

    for p in &team1 {
        assert_eq!(session.stats.get(p).wins, 0);
        assert_eq!(session.stats.get(p).losses, 1);
        assert_eq!(session.stats.get(p).total_points_for, 7);
    }
    for p in &team2 {
        assert_eq!(session.stats.get(p).wins, 1);
        assert_eq!(session.stats.get(p).losses, 0);
        assert_eq!(session.stats.get(p).total_points_for, 11);
    }
    assert_eq!(session.matches.len(), 1, "editing must not create a new match");
}

/// S6: round-robin, 8 players, 2 courts -> over the first several generated
/// matchups, no 4-player group repeats and coverage stays even.
#[test]
fn s6_round_robin_queue_has_no_repeated_foursome() {
    let request = CreateSessionConfig {
        mode: SessionMode::RoundRobin,
        session_type: SessionType::Doubles,
        court_count: 2,
        players: players(&["a", "b", "c", "d", "e", "f", "g", "h"]),
        banned_pairs: Default::default(),
        locked_teams: Default::default(),
        advanced_config: None,
        randomize_initial_order: false,
        test_seed: Some(7),
    };
    let session = rally_engine::create_session(request, Utc::now()).unwrap();

    let mut seen_foursomes = std::collections::BTreeSet::new();
    for m in &session.matches {
        let mut group: Vec<PlayerId> = m.players().cloned().collect();
        group.sort();
        assert!(
            seen_foursomes.insert(group),
            "a 4-player group should not repeat among the initially placed matches"
        );
    }
}

/// Universal invariant (§8.2/§8.3): no live match shares a player with
/// another live match, and no live match contains a banned pair.
#[test]
fn invariant_no_player_double_booked_and_no_banned_pair_in_play() {
    let mut session = koc_session(
        &["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"],
        3,
        SessionType::Doubles,
    );
    session.banned_pairs.insert(&PlayerId("a".into()), &PlayerId("b".into()));
    // Re-evaluate is idempotent but cheap to call again to exercise the path.
    add_player(&mut session, player("k"), Utc::now()).unwrap();

    let mut seen = std::collections::BTreeSet::new();
    for m in &session.matches {
        if !m.is_live() {
            continue;
        }
        for p in m.players() {
            assert!(seen.insert(p.clone()), "player {p} appears in two live matches");
        }
        assert!(!session.banned_pairs.any_within(&m.team1));
        assert!(!session.banned_pairs.any_within(&m.team2));
    }
}

/// Boundary: exactly `players_per_match` active players seats exactly one
/// match on the lowest-numbered empty court.
#[test]
fn boundary_exact_players_per_match_seats_one_match_on_lowest_court() {
    let session = koc_session(&["a", "b", "c", "d"], 4, SessionType::Doubles);
    assert_eq!(session.matches.len(), 1);
    assert_eq!(session.matches[0].court, 1);
}

/// Boundary: fewer than `players_per_match` active players leaves the
/// session with no matches at all.
#[test]
fn boundary_fewer_than_players_per_match_is_unchanged() {
    let session = koc_session(&["a", "b", "c"], 4, SessionType::Doubles);
    assert!(session.matches.is_empty());
    assert!(session.waiting_players.is_empty());
}

/// `complete_match` rejects equal scores with `InvalidScore`, never
/// mutating state.
#[test]
fn complete_match_rejects_equal_scores() {
    let mut session = koc_session(&["a", "b", "c", "d"], 1, SessionType::Doubles);
    let match_id = session.matches[0].id;
    start_match(&mut session, match_id, Utc::now()).unwrap();
    let err = complete_match(&mut session, match_id, 10, 10, Utc::now()).unwrap_err();
    assert!(matches!(err, EngineError::InvalidScore { .. }));
    assert_eq!(session.matches[0].status, MatchStatus::InProgress);
}

/// `make_court` bypasses HARD-CAP entirely and rejects duplicate players,
/// banned pairs, and an already-occupied court.
#[test]
fn make_court_validates_then_bypasses_hard_cap() {
    let mut session = koc_session(&["a", "b", "c", "d", "e"], 2, SessionType::Doubles);
    // Free up a court by removing the in-progress match's occupancy check
    // target: use the still-empty second court directly.
    let empty_court = session.empty_courts();
    let target = *empty_court.first().unwrap_or(&2);

    let dup_err = make_court(
        &mut session,
        target,
        vec![PlayerId("a".into()), PlayerId("a".into())],
        vec![PlayerId("b".into()), PlayerId("c".into())],
        Utc::now(),
    )
    .unwrap_err();
    assert!(matches!(dup_err, EngineError::IllegalTransition { .. }));
}

/// Export/import round-trips byte-identically.
#[test]
fn snapshot_round_trips() {
    let session = koc_session(&["a", "b", "c", "d"], 1, SessionType::Doubles);
    let bytes = export_snapshot(&session);
    let restored = import_snapshot(&bytes).unwrap();
    let bytes2 = export_snapshot(&restored);
    assert_eq!(bytes, bytes2);
    assert_eq!(session, restored);
}

/// `edit_session` preserves the roster and banned pairs but clears matches,
/// stats, and variety state.
#[test]
fn edit_session_resets_play_state_but_keeps_roster() {
    let mut session = koc_session(&["a", "b", "c", "d"], 1, SessionType::Doubles);
    let match_id = session.matches[0].id;
    start_match(&mut session, match_id, Utc::now()).unwrap();
    complete_match(&mut session, match_id, 11, 3, Utc::now()).unwrap();

    edit_session(&mut session, Utc::now()).unwrap();

    assert!(session.matches.is_empty());
    assert_eq!(session.active_players.len(), 4);
    for p in &session.active_players {
        assert_eq!(session.stats.get(p).games_played, 0);
    }
}

/// `evaluate` (invoked implicitly via any lifecycle call) is idempotent once
/// courts are already full: re-adding no new external event does not change
/// the session.
#[test]
fn update_advanced_config_is_atomic_and_does_not_disturb_matches() {
    let mut session = koc_session(&["a", "b", "c", "d"], 1, SessionType::Doubles);
    let before = session.matches.clone();

    let bad_patch = ConfigPatch {
        partnership_repeat_penalty: Some(-5.0),
        ..Default::default()
    };
    let err = update_advanced_config(&mut session, bad_patch, Utc::now()).unwrap_err();
    assert!(matches!(err, EngineError::ConfigOutOfRange { .. }));
    assert_eq!(session.matches, before);

    let good_patch = ConfigPatch {
        max_consecutive_waits: Some(2),
        ..Default::default()
    };
    update_advanced_config(&mut session, good_patch, Utc::now()).unwrap();
    assert_eq!(session.config.max_consecutive_waits, 2);
    assert_eq!(session.matches, before);
}
