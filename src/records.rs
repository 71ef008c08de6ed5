//! Personal record detection
//!
//! The backend is authoritative for the flags stored on a logged set. This
//! module holds the shared contract so the local backend and any provisional
//! preview compute exactly the same thing.

use serde::{Deserialize, Serialize};

/// Weight/reps pair of a performed set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetSample {
    pub weight_kg: f64,
    pub reps: u32,
}

impl SetSample {
    pub fn new(weight_kg: f64, reps: u32) -> Self {
        Self { weight_kg, reps }
    }

    /// Volume of the set (weight * reps)
    pub fn volume(&self) -> f64 {
        self.weight_kg * self.reps as f64
    }

    pub fn estimated_one_rep_max(&self) -> f64 {
        estimated_one_rep_max(self.weight_kg, self.reps)
    }
}

/// Record flags, frozen on a set at log time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFlags {
    pub is_new_1rm: bool,
    pub is_vol_pr: bool,
}

impl RecordFlags {
    pub fn any(&self) -> bool {
        self.is_new_1rm || self.is_vol_pr
    }
}

/// Flags computed on the client before the backend confirms them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Provisional(pub RecordFlags);

/// Epley estimate of the one-repetition max
pub fn estimated_one_rep_max(weight_kg: f64, reps: u32) -> f64 {
    weight_kg * (1.0 + reps as f64 / 30.0)
}

/// Decide record flags for `candidate` against `history`.
///
/// `history` must hold sets of the same exercise from completed prior
/// workouts only. Sets of the in-progress workout are not part of it.
pub fn detect(candidate: SetSample, history: &[SetSample]) -> RecordFlags {
    let best_estimate = history
        .iter()
        .map(SetSample::estimated_one_rep_max)
        .fold(0.0_f64, f64::max);

    let is_new_1rm = candidate.estimated_one_rep_max() > best_estimate;

    let is_vol_pr = !history
        .iter()
        .any(|s| s.weight_kg == candidate.weight_kg && s.reps >= candidate.reps);

    RecordFlags { is_new_1rm, is_vol_pr }
}

/// Same computation as [`detect`], marked as unconfirmed
pub fn preview(candidate: SetSample, history: &[SetSample]) -> Provisional {
    Provisional(detect(candidate, history))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(weight_kg: f64, reps: u32) -> SetSample {
        SetSample::new(weight_kg, reps)
    }

    #[test]
    fn test_estimated_one_rep_max() {
        assert_eq!(estimated_one_rep_max(100.0, 0), 100.0);
        assert!((estimated_one_rep_max(100.0, 30) - 200.0).abs() < 1e-9);
        assert!((estimated_one_rep_max(90.0, 5) - 105.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_history_flags_both() {
        let flags = detect(sample(60.0, 8), &[]);
        assert!(flags.is_new_1rm);
        assert!(flags.is_vol_pr);
    }

    #[test]
    fn test_zero_weight_is_not_1rm_without_history() {
        let flags = detect(sample(0.0, 12), &[]);
        assert!(!flags.is_new_1rm);
        assert!(flags.is_vol_pr);
    }

    #[test]
    fn test_1rm_requires_strictly_higher_estimate() {
        let history = vec![sample(90.0, 5)];
        // 105.0 equals the prior estimate
        assert!(!detect(sample(90.0, 5), &history).is_new_1rm);
        assert!(detect(sample(90.0, 6), &history).is_new_1rm);
    }

    #[test]
    fn test_lighter_set_with_more_reps_can_beat_estimate() {
        let history = vec![sample(100.0, 1)];
        // 80 * (1 + 10/30) = 106.67 > 103.33
        assert!(detect(sample(80.0, 10), &history).is_new_1rm);
    }

    #[test]
    fn test_vol_pr_exact_weight_only() {
        let history = vec![sample(100.0, 8), sample(102.5, 3)];
        // No prior set at 101.0 at all
        assert!(detect(sample(101.0, 1), &history).is_vol_pr);
        // Prior 100 x 8 covers 8 reps
        assert!(!detect(sample(100.0, 8), &history).is_vol_pr);
        assert!(detect(sample(100.0, 9), &history).is_vol_pr);
    }

    #[test]
    fn test_flags_are_independent() {
        let history = vec![sample(100.0, 5)];
        let flags = detect(sample(80.0, 5), &history);
        assert_eq!(flags, RecordFlags { is_new_1rm: false, is_vol_pr: true });
        assert!(flags.any());
    }

    #[test]
    fn test_preview_matches_detect() {
        let history = vec![sample(70.0, 10)];
        let candidate = sample(72.5, 10);
        assert_eq!(preview(candidate, &history).0, detect(candidate, &history));
    }

    #[test]
    fn test_volume() {
        assert_eq!(sample(100.0, 5).volume(), 500.0);
    }
}
