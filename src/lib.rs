//! Matchmaking and scheduling engine for live pickleball sessions across a
//! fixed set of physical courts: round-robin queueing, King-of-the-Court
//! rating-based matching, and the HARD-CAP court-variety subsystem that
//! keeps play rotating across courts and the waitlist.
//!
//! The engine is a pure, single-threaded state machine: every public
//! operation takes the current [`domain::model::Session`] and an event,
//! and produces a new session snapshot. There is no ambient concurrency,
//! I/O, or persistence inside the crate; `export_snapshot`/`import_snapshot`
//! are the entire persistence surface.

pub mod common;
pub mod domain;
pub mod service;

pub use common::error::{EngineError, EngineResult, SnapshotError};
pub use domain::config::{Config, ConfigPatch};
pub use domain::dto::{CreatePlayer, CreateSessionConfig};
pub use domain::model::{
    Match, MatchId, MatchStatus, Player, PlayerId, PlayerStats, Score, Session, SessionEventKind,
    SessionEventRecord, SessionMode, SessionType, StandingRow, Team1Or2,
};
pub use service::session_lifecycle::{
    add_player, complete_match, create_session, edit_session, export_snapshot, export_standings,
    forfeit_match, import_snapshot, make_court, remove_player, session_events, start_match,
    update_advanced_config,
};
