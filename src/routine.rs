//! Routines ("splits") and reconciliation of a routine with what was
//! actually performed in a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::{LoggedSet, UserId};
use crate::exercises::ExerciseId;
use crate::session::QueuedExercise;

pub type RoutineId = Uuid;

/// Sets proposed for an exercise that was queued but never logged
pub const DEFAULT_TARGET_SETS: u32 = 3;
/// Reps proposed for an exercise that was queued but never logged
pub const DEFAULT_TARGET_REPS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    pub id: RoutineId,
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineExerciseTarget {
    pub exercise_id: ExerciseId,
    pub order_index: u32,
    pub target_sets: u32,
    pub target_reps: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target_weight_kg: Option<f64>,
}

/// Routine with its exercise targets in display order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineSpec {
    pub routine: Routine,
    pub exercises: Vec<RoutineExerciseTarget>,
}

impl RoutineSpec {
    /// Targets sorted by `order_index` and renumbered from 0
    pub fn ordered_targets(&self) -> Vec<RoutineExerciseTarget> {
        let mut targets = self.exercises.clone();
        targets.sort_by_key(|t| t.order_index);
        for (index, target) in targets.iter_mut().enumerate() {
            target.order_index = index as u32;
        }
        targets
    }
}

/// Candidate replacement for a routine's exercise list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineProposal {
    pub routine_id: RoutineId,
    pub routine_name: String,
    pub previous: Vec<RoutineExerciseTarget>,
    pub targets: Vec<RoutineExerciseTarget>,
}

/// Derive routine targets from the final queue and the session's sets.
///
/// Queue order fixes `order_index`. Sets are matched by exercise id, so an
/// exercise queued twice gets the same targets in both positions.
pub fn derive_targets(queue: &[QueuedExercise], sets: &[LoggedSet]) -> Vec<RoutineExerciseTarget> {
    queue
        .iter()
        .enumerate()
        .map(|(index, queued)| {
            let exercise_id = queued.exercise.id;
            let performed: Vec<&LoggedSet> =
                sets.iter().filter(|s| s.exercise_id == exercise_id).collect();

            if performed.is_empty() {
                return RoutineExerciseTarget {
                    exercise_id,
                    order_index: index as u32,
                    target_sets: DEFAULT_TARGET_SETS,
                    target_reps: DEFAULT_TARGET_REPS,
                    target_weight_kg: None,
                };
            }

            let total_reps: u64 = performed.iter().map(|s| s.reps as u64).sum();
            let mean_reps = total_reps as f64 / performed.len() as f64;
            let max_weight = performed.iter().map(|s| s.weight_kg).fold(0.0_f64, f64::max);

            RoutineExerciseTarget {
                exercise_id,
                order_index: index as u32,
                target_sets: performed.len() as u32,
                // half away from zero: 6.5 -> 7
                target_reps: mean_reps.round() as u32,
                target_weight_kg: (max_weight > 0.0).then_some(max_weight),
            }
        })
        .collect()
}

/// True when derived targets differ from the stored ones in any field,
/// including membership and order.
pub fn targets_changed(stored: &RoutineSpec, derived: &[RoutineExerciseTarget]) -> bool {
    stored.ordered_targets() != derived
}

/// Build a proposal when the workout came from `baseline` and the session
/// performed something different from its stored targets.
pub fn propose(
    baseline: Option<&RoutineSpec>,
    queue: &[QueuedExercise],
    sets: &[LoggedSet],
) -> Option<RoutineProposal> {
    let baseline = baseline?;
    let targets = derive_targets(queue, sets);
    if !targets_changed(baseline, &targets) {
        return None;
    }
    Some(RoutineProposal {
        routine_id: baseline.routine.id,
        routine_name: baseline.routine.name.clone(),
        previous: baseline.ordered_targets(),
        targets,
    })
}
