use serde::{Deserialize, Serialize};

use crate::domain::config::Config;
use crate::domain::model::{BannedPairSet, LockedTeams, Player, SessionMode, SessionType};

/// Request to `create_session` (§4.8, §6). `test_seed`/`test_players` model
/// the surrounding application's "test mode" seed-and-playerlist injector —
/// the only two external knobs besides `randomize_initial_order` that reach
/// the engine, per §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionConfig {
    pub mode: SessionMode,
    pub session_type: SessionType,
    pub court_count: u32,
    pub players: Vec<Player>,
    #[serde(default)]
    pub banned_pairs: BannedPairSet,
    #[serde(default)]
    pub locked_teams: LockedTeams,
    #[serde(default)]
    pub advanced_config: Option<Config>,
    #[serde(default)]
    pub randomize_initial_order: bool,
    #[serde(default)]
    pub test_seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlayer {
    pub id: String,
    pub display_name: String,
}

impl From<CreatePlayer> for Player {
    fn from(p: CreatePlayer) -> Self {
        Player {
            id: crate::domain::model::PlayerId(p.id),
            display_name: p.display_name,
        }
    }
}
