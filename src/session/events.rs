//! What the session exposes to the UI: snapshots and notifications

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::{LoggedSet, Workout, WorkoutId};
use crate::routine::{RoutineId, RoutineProposal};

use super::queue::{QueueId, QueuedExercise};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateTag {
    #[default]
    Idle,
    Active,
    Finishing,
}

impl fmt::Display for StateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StateTag::Idle => "idle",
            StateTag::Active => "active",
            StateTag::Finishing => "finishing",
        };
        f.write_str(name)
    }
}

/// Network-backed transitions; at most one is outstanding at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Start,
    LogSet,
    UpdateRoutine,
    Finish,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Start => "start",
            Operation::LogSet => "log set",
            Operation::UpdateRoutine => "routine update",
            Operation::Finish => "finish",
        };
        f.write_str(name)
    }
}

/// Read-only view the UI renders from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub state: StateTag,
    pub workout: Option<Workout>,
    pub queue: Vec<QueuedExercise>,
    pub selected: Option<QueueId>,
    /// Sets logged this session for the selected exercise
    pub current_sets: Vec<LoggedSet>,
    pub set_count: usize,
    pub total_volume_kg: f64,
    pub pending: Option<Operation>,
    /// Reconciliation waiting for a decision
    pub proposal: Option<RoutineProposal>,
}

impl SessionSnapshot {
    pub fn selected_exercise(&self) -> Option<&QueuedExercise> {
        let selected = self.selected?;
        self.queue.iter().find(|q| q.queue_id == selected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardKind {
    NewOneRepMax,
    RepRecord,
}

impl RewardKind {
    pub fn headline(&self) -> &'static str {
        match self {
            RewardKind::NewOneRepMax => "New 1RM!",
            RewardKind::RepRecord => "Rep PR!",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinishSummary {
    pub workout_id: WorkoutId,
    pub end_time: DateTime<Utc>,
    pub badges: Vec<String>,
    pub set_count: usize,
    pub total_volume_kg: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FinishOutcome {
    /// The routine changed; resolve with `Session::resolve_reconciliation`
    NeedsDecision(RoutineProposal),
    Finished(FinishSummary),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileDecision {
    Apply,
    Skip,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Reward {
        kind: RewardKind,
        exercise_name: String,
        set: LoggedSet,
    },
    ReconciliationPrompt(RoutineProposal),
    RoutineUpdated {
        routine_id: RoutineId,
    },
    BadgesEarned(Vec<String>),
    Finished(FinishSummary),
}

/// Short description of an earned badge
pub fn badge_description(badge: &str) -> Option<&'static str> {
    match badge {
        "Titan Volume" => Some("Lifted over 10,000kg in a single session!"),
        "Heavy Lifter" => Some("Lifted over 5,000kg in a single session!"),
        "Marathoner" => Some("Trained for over 90 minutes!"),
        "Speed Demon" => Some("High volume in under 30 minutes!"),
        "Volume Warrior" => Some("Completed 20+ sets!"),
        _ => None,
    }
}
