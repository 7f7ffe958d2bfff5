use std::collections::BTreeSet;

use crate::domain::model::{CourtVarietyTracker, WAITLIST_COURT};

/// Operations over [`CourtVarietyTracker`] (§4.5, the HARD-CAP subsystem).
/// The struct itself is pure data; all behavior lives here so the data
/// model stays serde-friendly and the HARD-CAP rules stay in one place.
impl CourtVarietyTracker {
    pub fn record_finish(&mut self, court: u32) {
        let entry = self.courts.entry(court).or_default();
        entry.finish_count += 1;
        *self.total_finishes.entry(court).or_insert(0) += 1;
    }

    /// After each completion: courts below the mean finish count gain
    /// variety headroom (threshold +5, capped at 100); courts well above
    /// the mean lose it (threshold -5, floored at 0); everything else
    /// drifts back toward the resting value of 50 by 2.
    pub fn update_thresholds(&mut self) {
        if self.total_finishes.is_empty() {
            return;
        }
        let total: u32 = self.total_finishes.values().sum();
        let avg = total as f64 / self.total_finishes.len() as f64;

        for (court, finishes) in &self.total_finishes {
            let entry = self.courts.entry(*court).or_default();
            let f = *finishes as f64;
            if f < avg {
                entry.variety_threshold = (entry.variety_threshold + 5).min(100);
            } else if f > avg + 1.0 {
                entry.variety_threshold = (entry.variety_threshold - 5).max(0);
            } else if entry.variety_threshold > 50 {
                entry.variety_threshold = (entry.variety_threshold - 2).max(50);
            } else if entry.variety_threshold < 50 {
                entry.variety_threshold = (entry.variety_threshold + 2).min(50);
            }
        }
    }

    /// True iff every court in `courts_involved` had, at the end of the
    /// previous round, `last_mixed_with` already containing the rest of the
    /// proposed set — i.e. the exact same set mixed last round.
    pub fn violates_hard_cap(&self, courts_involved: &BTreeSet<u32>) -> bool {
        if self.last_mix_round == 0 || courts_involved.len() <= 1 {
            return false;
        }
        courts_involved.iter().all(|c| {
            let rest: BTreeSet<u32> = courts_involved.iter().copied().filter(|x| x != c).collect();
            self.courts
                .get(c)
                .map(|state| rest.is_subset(&state.last_mixed_with))
                .unwrap_or(false)
        })
    }

    /// Soft preference layered on top of HARD-CAP: a court whose
    /// `variety_threshold > 70` additionally refuses to repeat a pairing
    /// with `other` even when HARD-CAP would allow it, unless `other`'s own
    /// threshold is `< 30` (flexible). HARD-CAP remains absolute; this is
    /// consulted only when HARD-CAP did not already reject the set.
    pub fn prefers_to_avoid(&self, court: u32, other: u32) -> bool {
        let court_strict = self
            .courts
            .get(&court)
            .map(|s| s.variety_threshold > 70)
            .unwrap_or(false);
        if !court_strict {
            return false;
        }
        let other_flexible = self
            .courts
            .get(&other)
            .map(|s| s.variety_threshold < 30)
            .unwrap_or(false);
        let already_mixed = self
            .courts
            .get(&court)
            .map(|s| s.last_mixed_with.contains(&other))
            .unwrap_or(false);
        already_mixed && !other_flexible
    }

    /// Records a mix (one evaluation round's worth of court placements,
    /// including [`WAITLIST_COURT`] when waiters remain). Returns `false`
    /// without mutating if the set violates HARD-CAP.
    pub fn record_mix(&mut self, courts_involved: &BTreeSet<u32>) -> bool {
        if courts_involved.is_empty() {
            return true;
        }
        if self.last_mix_round != 0 && self.violates_hard_cap(courts_involved) {
            return false;
        }

        for &c in courts_involved {
            let rest: BTreeSet<u32> =
                courts_involved.iter().copied().filter(|x| *x != c).collect();
            let entry = self.courts.entry(c).or_default();
            if c == WAITLIST_COURT {
                entry.last_mixed_with.extend(rest);
            } else {
                entry.last_mixed_with = rest;
            }
        }
        self.last_mix_round += 1;
        true
    }
}
