//! Performance benchmarks for the matchmaking algorithms.
//!
//! Exercises `create_session` (which runs one evaluation round) and repeated
//! `complete_match` -> re-evaluate cycles across a range of session sizes,
//! for both scheduling modes.

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use rally_engine::{
    complete_match, create_session, start_match, CreateSessionConfig, Player, PlayerId,
    SessionMode, SessionType,
};

struct BenchmarkConfig {
    player_counts: Vec<usize>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            player_counts: vec![8, 16, 32, 64, 128],
        }
    }
}

fn make_players(count: usize) -> Vec<Player> {
    (0..count)
        .map(|i| Player {
            id: PlayerId(format!("p{i}")),
            display_name: format!("Player {}", i + 1),
        })
        .collect()
}

fn bench_king_of_court_initial_evaluation(c: &mut Criterion) {
    let config = BenchmarkConfig::default();
    let mut group = c.benchmark_group("king_of_court_initial_evaluation");

    for &count in &config.player_counts {
        group.bench_with_input(
            BenchmarkId::new("create_session", count),
            &count,
            |b, &count| {
                b.iter(|| {
                    let request = CreateSessionConfig {
                        mode: SessionMode::KingOfCourt,
                        session_type: SessionType::Doubles,
                        court_count: (count / 4).max(1) as u32,
                        players: make_players(count),
                        banned_pairs: Default::default(),
                        locked_teams: Default::default(),
                        advanced_config: None,
                        randomize_initial_order: false,
                        test_seed: Some(42),
                    };
                    black_box(create_session(request, Utc::now()).expect("session creation"))
                });
            },
        );
    }
    group.finish();
}

fn bench_king_of_court_sustained_play(c: &mut Criterion) {
    let config = BenchmarkConfig::default();
    let mut group = c.benchmark_group("king_of_court_sustained_play");
    group.sample_size(20);

    for &count in &config.player_counts {
        group.bench_with_input(
            BenchmarkId::new("ten_completion_cycles", count),
            &count,
            |b, &count| {
                b.iter(|| {
                    let request = CreateSessionConfig {
                        mode: SessionMode::KingOfCourt,
                        session_type: SessionType::Doubles,
                        court_count: (count / 4).max(1) as u32,
                        players: make_players(count),
                        banned_pairs: Default::default(),
                        locked_teams: Default::default(),
                        advanced_config: None,
                        randomize_initial_order: false,
                        test_seed: Some(7),
                    };
                    let mut session =
                        create_session(request, Utc::now()).expect("session creation");

                    for _ in 0..10 {
                        let Some(m) = session
                            .matches
                            .iter()
                            .find(|m| m.status == rally_engine::MatchStatus::Waiting)
                            .map(|m| m.id)
                        else {
                            break;
                        };
                        start_match(&mut session, m, Utc::now()).unwrap();
                        complete_match(&mut session, m, 11, 7, Utc::now()).unwrap();
                    }
                    black_box(&session);
                });
            },
        );
    }
    group.finish();
}

fn bench_round_robin_queue_generation(c: &mut Criterion) {
    let round_robin_sizes = vec![8, 12, 16, 24, 32];
    let mut group = c.benchmark_group("round_robin_queue_generation");

    for &count in &round_robin_sizes {
        group.bench_with_input(
            BenchmarkId::new("create_session", count),
            &count,
            |b, &count| {
                b.iter(|| {
                    let request = CreateSessionConfig {
                        mode: SessionMode::RoundRobin,
                        session_type: SessionType::Doubles,
                        court_count: (count / 4).max(1) as u32,
                        players: make_players(count),
                        banned_pairs: Default::default(),
                        locked_teams: Default::default(),
                        advanced_config: None,
                        randomize_initial_order: false,
                        test_seed: Some(99),
                    };
                    black_box(create_session(request, Utc::now()).expect("session creation"))
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_king_of_court_initial_evaluation,
    bench_king_of_court_sustained_play,
    bench_round_robin_queue_generation
);
criterion_main!(benches);
