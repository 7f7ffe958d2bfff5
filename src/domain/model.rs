use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use rand::{RngCore, SeedableRng};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::config::Config;

/// Stable, externally-assigned player identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub String);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        PlayerId(s.to_string())
    }
}

/// Unique match identifier. Matches are never reused across a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatchId(pub Uuid);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl MatchId {
    pub fn new(rng: &mut PseudoRandomSource) -> Self {
        // Seeded from the session's own source so export/import replay stays
        // byte-identical; not a security-sensitive use of randomness.
        let hi = rng.next_u64();
        let lo = rng.next_u64();
        let bytes = ((hi as u128) << 64 | lo as u128).to_be_bytes();
        MatchId(Uuid::from_bytes(bytes))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
}

/// Per-player counters and history sets. See invariants in §3 of the spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub games_played: u32,
    pub games_waited: u32,
    pub wins: u32,
    pub losses: u32,
    pub total_points_for: u32,
    pub total_points_against: u32,
    pub partners_played: BTreeMap<PlayerId, u32>,
    pub opponents_played: BTreeMap<PlayerId, u32>,
}

impl PlayerStats {
    pub fn partner_count(&self, other: &PlayerId) -> u32 {
        self.partners_played.get(other).copied().unwrap_or(0)
    }

    pub fn opponent_count(&self, other: &PlayerId) -> u32 {
        self.opponents_played.get(other).copied().unwrap_or(0)
    }

    pub fn win_rate(&self) -> f64 {
        if self.games_played == 0 {
            0.0
        } else {
            self.wins as f64 / self.games_played as f64
        }
    }

    pub fn average_point_differential(&self) -> f64 {
        if self.games_played == 0 {
            0.0
        } else {
            (self.total_points_for as f64 - self.total_points_against as f64)
                / self.games_played as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Waiting,
    InProgress,
    Completed,
    Forfeited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub team1_score: u32,
    pub team2_score: u32,
}

impl Score {
    /// Team that has strictly more points. `None` only happens for invalid
    /// (equal) scores, which `complete_match` rejects before this is called.
    pub fn winner(&self) -> Option<Team1Or2> {
        use std::cmp::Ordering::*;
        match self.team1_score.cmp(&self.team2_score) {
            Greater => Some(Team1Or2::Team1),
            Less => Some(Team1Or2::Team2),
            Equal => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Team1Or2 {
    Team1,
    Team2,
}

/// Synthetic court id standing in for "there exist waiting players" inside
/// [`crate::service::court_variety::CourtVarietyTracker`]. Never the `court`
/// of a real [`Match`].
pub const WAITLIST_COURT: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub court: u32,
    pub team1: Vec<PlayerId>,
    pub team2: Vec<PlayerId>,
    pub status: MatchStatus,
    pub score: Option<Score>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Match {
    pub fn players(&self) -> impl Iterator<Item = &PlayerId> {
        self.team1.iter().chain(self.team2.iter())
    }

    pub fn contains(&self, player: &PlayerId) -> bool {
        self.team1.contains(player) || self.team2.contains(player)
    }

    pub fn is_live(&self) -> bool {
        matches!(self.status, MatchStatus::Waiting | MatchStatus::InProgress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    RoundRobin,
    KingOfCourt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Singles,
    Doubles,
}

impl SessionType {
    pub fn players_per_team(&self) -> usize {
        match self {
            SessionType::Singles => 1,
            SessionType::Doubles => 2,
        }
    }

    pub fn players_per_match(&self) -> usize {
        self.players_per_team() * 2
    }
}

/// Undirected set of banned pairs: two players who must never share a team.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BannedPairSet(pub BTreeSet<(PlayerId, PlayerId)>);

fn normalize_pair(a: &PlayerId, b: &PlayerId) -> (PlayerId, PlayerId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

impl BannedPairSet {
    pub fn insert(&mut self, a: &PlayerId, b: &PlayerId) {
        self.0.insert(normalize_pair(a, b));
    }

    pub fn contains(&self, a: &PlayerId, b: &PlayerId) -> bool {
        self.0.contains(&normalize_pair(a, b))
    }

    /// True iff any unordered pair drawn from `group` is banned.
    pub fn any_within(&self, group: &[PlayerId]) -> bool {
        for i in 0..group.len() {
            for j in (i + 1)..group.len() {
                if self.contains(&group[i], &group[j]) {
                    return true;
                }
            }
        }
        false
    }
}

/// A predeclared 2-player partnership that persists across all matches in
/// which either member plays (§4.4.7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedTeam {
    pub members: (PlayerId, PlayerId),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedTeams(pub Vec<LockedTeam>);

impl LockedTeams {
    /// The teammate `player` is locked to, if any.
    pub fn teammate_of(&self, player: &PlayerId) -> Option<&PlayerId> {
        self.0.iter().find_map(|t| {
            if &t.members.0 == player {
                Some(&t.members.1)
            } else if &t.members.1 == player {
                Some(&t.members.0)
            } else {
                None
            }
        })
    }

    pub fn is_locked(&self, player: &PlayerId) -> bool {
        self.teammate_of(player).is_some()
    }
}

/// Per-court variety bookkeeping for the HARD-CAP subsystem (§4.5). Court 0
/// is the synthetic waitlist court and accumulates instead of replacing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourtVarietyCourtState {
    pub last_mixed_with: BTreeSet<u32>,
    pub finish_count: u32,
    pub variety_threshold: i32,
}

impl Default for CourtVarietyCourtState {
    fn default() -> Self {
        CourtVarietyCourtState {
            last_mixed_with: BTreeSet::new(),
            finish_count: 0,
            variety_threshold: 50,
        }
    }
}

/// HARD-CAP state for the whole session: one [`CourtVarietyCourtState`] per
/// physical court plus the synthetic [`WAITLIST_COURT`]. Operations live in
/// [`crate::service::court_variety`]; this is pure data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourtVarietyTracker {
    pub courts: BTreeMap<u32, CourtVarietyCourtState>,
    pub last_mix_round: u64,
    pub total_finishes: BTreeMap<u32, u32>,
}

impl CourtVarietyTracker {
    pub fn new(court_count: u32) -> Self {
        let mut courts = BTreeMap::new();
        courts.insert(WAITLIST_COURT, CourtVarietyCourtState::default());
        for c in 1..=court_count {
            courts.insert(c, CourtVarietyCourtState::default());
        }
        CourtVarietyTracker {
            courts,
            last_mix_round: 0,
            total_finishes: BTreeMap::new(),
        }
    }
}

/// A seeded pseudo-random source carried inside [`Session`] so that every
/// shuffle and tie-break is reproducible. Serialized as `(seed,
/// draws_consumed)`; deserializing reseeds and fast-forwards so replay is
/// byte-identical to the run that produced the snapshot.
#[derive(Debug, Clone)]
pub struct PseudoRandomSource {
    seed: u64,
    draws_consumed: u64,
    rng: StdRng,
}

impl PseudoRandomSource {
    pub fn from_seed(seed: u64) -> Self {
        PseudoRandomSource {
            seed,
            draws_consumed: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.draws_consumed += 1;
        self.rng.next_u64()
    }

    pub fn next_u32(&mut self) -> u32 {
        self.draws_consumed += 1;
        self.rng.next_u32()
    }

    /// Uniform index in `0..bound`. `bound == 0` always yields `0`.
    pub fn gen_range(&mut self, bound: usize) -> usize {
        if bound == 0 {
            return 0;
        }
        (self.next_u64() % bound as u64) as usize
    }
}

impl PartialEq for PseudoRandomSource {
    fn eq(&self, other: &Self) -> bool {
        self.seed == other.seed && self.draws_consumed == other.draws_consumed
    }
}
impl Eq for PseudoRandomSource {}

impl Serialize for PseudoRandomSource {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize)]
        struct Repr {
            seed: u64,
            draws_consumed: u64,
        }
        Repr {
            seed: self.seed,
            draws_consumed: self.draws_consumed,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PseudoRandomSource {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Repr {
            seed: u64,
            draws_consumed: u64,
        }
        let repr = Repr::deserialize(deserializer)?;
        let mut rng = StdRng::seed_from_u64(repr.seed);
        for _ in 0..repr.draws_consumed {
            rng.next_u64();
        }
        Ok(PseudoRandomSource {
            seed: repr.seed,
            draws_consumed: repr.draws_consumed,
            rng,
        })
    }
}

/// Ambient (§2.2): one record per engine call, kept only for audit / test
/// assertions. Never consulted by matchmaking logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEventRecord {
    pub at: DateTime<Utc>,
    pub kind: SessionEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEventKind {
    SessionCreated,
    PlayerAdded { player: PlayerId },
    PlayerRemoved { player: PlayerId },
    MatchStarted { match_id: MatchId },
    MatchCompleted { match_id: MatchId, court: u32 },
    MatchEdited { match_id: MatchId },
    MatchForfeited { match_id: MatchId, court: u32 },
    CourtMadeManually { court: u32 },
    SessionEdited,
    ConfigUpdated,
    MatchesCreated { court_numbers: Vec<u32> },
}

/// Read-only leaderboard row (ambient, §2.2). Derived from [`PlayerStats`];
/// introduces no new stored state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingRow {
    pub player_id: PlayerId,
    pub display_name: String,
    pub rank: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
    pub games_played: u32,
    pub games_waited: u32,
}

/// A pending candidate match in the round-robin queue: not yet a [`Match`],
/// just a scored, unplaced proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMatchup {
    pub team1: Vec<PlayerId>,
    pub team2: Vec<PlayerId>,
}

pub const SCHEMA_VERSION: u32 = 1;

/// The full authoritative state for one live session. Owned exclusively by
/// the engine; mutated only through `service::session_lifecycle` operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    pub mode: SessionMode,
    pub session_type: SessionType,
    pub court_count: u32,
    pub config: Config,

    pub banned_pairs: BannedPairSet,
    pub locked_teams: LockedTeams,

    pub players: BTreeMap<PlayerId, Player>,
    pub active_players: BTreeSet<PlayerId>,
    pub waiting_players: Vec<PlayerId>,

    pub matches: Vec<Match>,
    pub stats: crate::service::stats_store::StatsStore,
    pub court_variety: CourtVarietyTracker,

    #[serde(default)]
    pub round_robin_queue: Vec<QueuedMatchup>,

    pub rng: PseudoRandomSource,

    #[serde(default)]
    pub events: Vec<SessionEventRecord>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl Session {
    pub fn players_per_match(&self) -> usize {
        self.session_type.players_per_match()
    }

    pub fn empty_courts(&self) -> Vec<u32> {
        let mut occupied: BTreeSet<u32> = BTreeSet::new();
        for m in &self.matches {
            if m.is_live() {
                occupied.insert(m.court);
            }
        }
        (1..=self.court_count)
            .filter(|c| !occupied.contains(c))
            .collect()
    }

    pub fn busy_courts(&self) -> BTreeSet<u32> {
        self.matches
            .iter()
            .filter(|m| m.is_live())
            .map(|m| m.court)
            .collect()
    }

    /// Active players not currently in an in-progress or waiting match.
    pub fn available_players(&self) -> Vec<PlayerId> {
        let busy: BTreeSet<&PlayerId> = self
            .matches
            .iter()
            .filter(|m| m.is_live())
            .flat_map(|m| m.players())
            .collect();
        self.active_players
            .iter()
            .filter(|p| !busy.contains(p))
            .cloned()
            .collect()
    }

    pub fn match_by_id(&self, id: MatchId) -> Option<&Match> {
        self.matches.iter().find(|m| m.id == id)
    }

    pub fn match_by_id_mut(&mut self, id: MatchId) -> Option<&mut Match> {
        self.matches.iter_mut().find(|m| m.id == id)
    }

    pub fn record_event(&mut self, kind: SessionEventKind, now: DateTime<Utc>) {
        self.events.push(SessionEventRecord { at: now, kind });
    }

    pub fn completed_match_count(&self) -> usize {
        self.matches
            .iter()
            .filter(|m| matches!(m.status, MatchStatus::Completed | MatchStatus::Forfeited))
            .count()
    }
}
