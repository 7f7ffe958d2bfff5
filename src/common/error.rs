use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::model::{MatchId, PlayerId};

/// Global error for all engine operations.
///
/// Every variant maps to one of the error kinds an external caller needs to
/// branch on; conditions that are merely "no feasible match right now" are
/// never represented here (see [`crate::service::evaluation_driver`]).
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineError {
    #[error("invalid score: {team1_score}-{team2_score}")]
    InvalidScore { team1_score: i64, team2_score: i64 },

    #[error("unknown match: {0}")]
    UnknownMatch(MatchId),

    #[error("unknown player: {0}")]
    UnknownPlayer(PlayerId),

    #[error("illegal transition: {reason}")]
    IllegalTransition { reason: String },

    #[error("banned pair {a} / {b} would share a team")]
    BannedPairViolation { a: PlayerId, b: PlayerId },

    #[error("court {0} is occupied")]
    CourtOccupied(u32),

    #[error("config value out of range: {field} = {value}")]
    ConfigOutOfRange { field: String, value: String },

    #[error("insufficient players: need {needed}, have {have}")]
    InsufficientPlayers { needed: usize, have: usize },
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Distinct from [`EngineError`]: failures in decoding a persisted snapshot
/// are a format problem, not a gameplay-rule violation.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported schema version: {0}")]
    UnsupportedVersion(u32),
}
