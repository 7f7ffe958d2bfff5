//! Runs a small King-of-the-Court session end to end and prints the
//! resulting standings. Not part of the library surface; a worked example
//! of driving the engine from an external caller's point of view.

use chrono::Utc;
use rally_engine::{
    complete_match, create_session, export_standings, start_match, CreateSessionConfig, Player,
    PlayerId, SessionMode, SessionType,
};

fn main() {
    let players: Vec<Player> = ["amy", "ben", "cleo", "dan", "eve", "fay", "gus", "hal"]
        .iter()
        .map(|id| Player {
            id: PlayerId(id.to_string()),
            display_name: id.to_string(),
        })
        .collect();

    let request = CreateSessionConfig {
        mode: SessionMode::KingOfCourt,
        session_type: SessionType::Doubles,
        court_count: 2,
        players,
        banned_pairs: Default::default(),
        locked_teams: Default::default(),
        advanced_config: None,
        randomize_initial_order: true,
        test_seed: Some(20260727),
    };

    let mut session = create_session(request, Utc::now()).expect("enough players to start");
    println!(
        "session created: {} matches, {} waiting",
        session.matches.len(),
        session.waiting_players.len()
    );

    for round in 0..6 {
        let waiting_match_ids: Vec<_> = session
            .matches
            .iter()
            .filter(|m| m.status == rally_engine::MatchStatus::Waiting)
            .map(|m| m.id)
            .collect();
        if waiting_match_ids.is_empty() {
            break;
        }
        for match_id in waiting_match_ids {
            start_match(&mut session, match_id, Utc::now()).unwrap();
            // Synthetic, slightly randomized-looking scoreline.
            let (t1, t2) = if round % 2 == 0 { (11, 7) } else { (9, 11) };
            complete_match(&mut session, match_id, t1, t2, Utc::now()).unwrap();
        }
    }

    println!("\nfinal standings:");
    for row in export_standings(&session) {
        println!(
            "  #{:<2} {:<6} {}-{} (waited {})",
            row.rank, row.display_name, row.wins, row.losses, row.games_waited
        );
    }
}
