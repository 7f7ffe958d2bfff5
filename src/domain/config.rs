use serde::{Deserialize, Serialize};

use crate::common::error::EngineError;

/// Tunable parameters for the matcher and variety subsystems (§4.3).
/// Every field has a documented default; updates during an active session
/// are validated atomically and affect only future matchmaking decisions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub base_rating: i32,
    pub min_rating: i32,
    pub max_rating: i32,
    pub provisional_games_threshold: u32,

    pub ranking_range_percentage: f64,
    pub close_rank_threshold: u32,
    pub very_close_rank_threshold: u32,

    pub max_consecutive_waits: u32,
    pub min_completed_matches_for_waiting: u32,

    pub back_to_back_overlap_threshold: u32,
    pub recent_overlap_penalty: f64,
    pub recent_partnership_penalty: f64,
    pub partnership_repeat_penalty: f64,
    pub opponent_repeat_penalty: f64,
    pub team_balance_penalty: f64,
    pub partnership_variety_weight: f64,
    /// Number of trailing matches on a court considered "recent" for
    /// `recent_partnership_penalty` in §4.4.6 (`R` in the spec).
    pub recent_partnership_window: u32,

    pub hard_cap_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_rating: 1500,
            min_rating: 800,
            max_rating: 2200,
            provisional_games_threshold: 2,

            ranking_range_percentage: 0.5,
            close_rank_threshold: 4,
            very_close_rank_threshold: 3,

            max_consecutive_waits: 1,
            min_completed_matches_for_waiting: 6,

            back_to_back_overlap_threshold: 3,
            recent_overlap_penalty: 500.0,
            recent_partnership_penalty: 300.0,
            partnership_repeat_penalty: 80.0,
            opponent_repeat_penalty: 25.0,
            team_balance_penalty: 20.0,
            partnership_variety_weight: 100.0,
            recent_partnership_window: 3,

            hard_cap_enabled: true,
        }
    }
}

impl Config {
    fn validate(&self) -> Result<(), EngineError> {
        let checks: &[(&str, bool)] = &[
            ("min_rating", self.min_rating >= 0),
            ("max_rating", self.max_rating > self.min_rating),
            (
                "provisional_games_threshold",
                self.provisional_games_threshold >= 1,
            ),
            (
                "ranking_range_percentage",
                (0.0..=1.0).contains(&self.ranking_range_percentage),
            ),
            ("max_consecutive_waits", self.max_consecutive_waits >= 1),
            ("recent_overlap_penalty", self.recent_overlap_penalty >= 0.0),
            (
                "recent_partnership_penalty",
                self.recent_partnership_penalty >= 0.0,
            ),
            (
                "partnership_repeat_penalty",
                self.partnership_repeat_penalty >= 0.0,
            ),
            ("opponent_repeat_penalty", self.opponent_repeat_penalty >= 0.0),
            ("team_balance_penalty", self.team_balance_penalty >= 0.0),
            (
                "partnership_variety_weight",
                self.partnership_variety_weight >= 0.0,
            ),
            (
                "recent_partnership_window",
                self.recent_partnership_window >= 1,
            ),
        ];
        for (field, ok) in checks {
            if !ok {
                return Err(EngineError::ConfigOutOfRange {
                    field: field.to_string(),
                    value: String::new(),
                });
            }
        }
        Ok(())
    }
}

/// Partial update applied with deep-merge semantics: `None` means "leave as
/// configured". Used by `update_advanced_config` (§4.8).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPatch {
    pub base_rating: Option<i32>,
    pub min_rating: Option<i32>,
    pub max_rating: Option<i32>,
    pub provisional_games_threshold: Option<u32>,
    pub ranking_range_percentage: Option<f64>,
    pub close_rank_threshold: Option<u32>,
    pub very_close_rank_threshold: Option<u32>,
    pub max_consecutive_waits: Option<u32>,
    pub min_completed_matches_for_waiting: Option<u32>,
    pub back_to_back_overlap_threshold: Option<u32>,
    pub recent_overlap_penalty: Option<f64>,
    pub recent_partnership_penalty: Option<f64>,
    pub partnership_repeat_penalty: Option<f64>,
    pub opponent_repeat_penalty: Option<f64>,
    pub team_balance_penalty: Option<f64>,
    pub partnership_variety_weight: Option<f64>,
    pub recent_partnership_window: Option<u32>,
    pub hard_cap_enabled: Option<bool>,
}

impl Config {
    /// Applies `patch` on top of `self`, returning the merged config without
    /// mutating `self` unless the result validates. This is how
    /// `update_advanced_config` stays atomic: a bad patch never partially
    /// applies.
    pub fn merged(&self, patch: &ConfigPatch) -> Result<Config, EngineError> {
        let mut next = *self;
        macro_rules! apply {
            ($field:ident) => {
                if let Some(v) = patch.$field {
                    next.$field = v;
                }
            };
        }
        apply!(base_rating);
        apply!(min_rating);
        apply!(max_rating);
        apply!(provisional_games_threshold);
        apply!(ranking_range_percentage);
        apply!(close_rank_threshold);
        apply!(very_close_rank_threshold);
        apply!(max_consecutive_waits);
        apply!(min_completed_matches_for_waiting);
        apply!(back_to_back_overlap_threshold);
        apply!(recent_overlap_penalty);
        apply!(recent_partnership_penalty);
        apply!(partnership_repeat_penalty);
        apply!(opponent_repeat_penalty);
        apply!(team_balance_penalty);
        apply!(partnership_variety_weight);
        apply!(recent_partnership_window);
        apply!(hard_cap_enabled);

        next.validate()?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn negative_penalty_rejected() {
        let patch = ConfigPatch {
            partnership_repeat_penalty: Some(-1.0),
            ..Default::default()
        };
        assert!(Config::default().merged(&patch).is_err());
    }

    #[test]
    fn patch_leaves_other_fields_untouched() {
        let patch = ConfigPatch {
            max_consecutive_waits: Some(3),
            ..Default::default()
        };
        let merged = Config::default().merged(&patch).unwrap();
        assert_eq!(merged.max_consecutive_waits, 3);
        assert_eq!(merged.base_rating, Config::default().base_rating);
    }
}
