//! External collaborators of the session: backend workout API, routine
//! store and exercise catalog.

pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ClientError;
use crate::exercises::{Exercise, ExerciseId};
use crate::records::{RecordFlags, SetSample};
use crate::routine::{Routine, RoutineExerciseTarget, RoutineId, RoutineSpec};

pub use http::HttpBackend;

pub type WorkoutId = Uuid;
pub type UserId = Uuid;

pub type ClientResult<T> = Result<T, ClientError>;

/// Workout record as stored by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: WorkoutId,
    pub user_id: UserId,
    pub name: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub template_id: Option<RoutineId>,
    /// Estimated energy use, set when the workout is finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories_burned: Option<u32>,
}

/// Set row as returned by the backend, before flags are attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetRecord {
    pub id: Uuid,
    pub workout_id: WorkoutId,
    pub exercise_id: ExerciseId,
    pub weight_kg: f64,
    pub reps: u32,
    #[serde(default)]
    pub rpe: Option<f32>,
}

/// A set logged during the active workout, with its record flags frozen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedSet {
    pub id: Uuid,
    pub workout_id: WorkoutId,
    pub exercise_id: ExerciseId,
    pub weight_kg: f64,
    pub reps: u32,
    pub rpe: Option<f32>,
    pub is_new_1rm: bool,
    pub is_vol_pr: bool,
}

impl LoggedSet {
    pub fn sample(&self) -> SetSample {
        SetSample::new(self.weight_kg, self.reps)
    }

    pub fn volume(&self) -> f64 {
        self.sample().volume()
    }

    pub fn flags(&self) -> RecordFlags {
        RecordFlags { is_new_1rm: self.is_new_1rm, is_vol_pr: self.is_vol_pr }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkoutRequest {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<RoutineId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSetRequest {
    pub workout_id: WorkoutId,
    pub exercise_id: ExerciseId,
    pub weight_kg: f64,
    pub reps: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpe: Option<f32>,
}

/// Canonical set plus server-computed record flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSetResponse {
    pub set: SetRecord,
    pub is_new_1rm: bool,
    pub is_vol_pr: bool,
}

impl LogSetResponse {
    pub fn into_logged_set(self) -> LoggedSet {
        LoggedSet {
            id: self.set.id,
            workout_id: self.set.workout_id,
            exercise_id: self.set.exercise_id,
            weight_kg: self.set.weight_kg,
            reps: self.set.reps,
            rpe: self.set.rpe,
            is_new_1rm: self.is_new_1rm,
            is_vol_pr: self.is_vol_pr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishWorkoutResponse {
    pub id: WorkoutId,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub badges: Vec<String>,
}

/// Read-only exercise reference data
#[async_trait]
pub trait ExerciseCatalog: Send + Sync {
    async fn list(&self) -> ClientResult<Vec<Exercise>>;
}

/// Named routines ("splits") with ordered per-exercise targets
#[async_trait]
pub trait RoutineStore: Send + Sync {
    async fn list(&self) -> ClientResult<Vec<Routine>>;

    async fn get(&self, id: RoutineId) -> ClientResult<RoutineSpec>;

    /// Replace the routine's exercise list in full
    async fn replace_exercises(
        &self,
        routine_id: RoutineId,
        targets: &[RoutineExerciseTarget],
    ) -> ClientResult<Vec<RoutineExerciseTarget>>;

    async fn create(
        &self,
        user_id: UserId,
        name: &str,
        description: Option<&str>,
    ) -> ClientResult<Routine>;

    /// Append one target to the routine
    async fn add_exercise(
        &self,
        routine_id: RoutineId,
        target: &RoutineExerciseTarget,
    ) -> ClientResult<RoutineExerciseTarget>;
}

/// Backend workout operations the session drives
#[async_trait]
pub trait WorkoutClient: Send + Sync {
    async fn create(&self, request: CreateWorkoutRequest) -> ClientResult<Workout>;

    async fn log_set(&self, request: LogSetRequest) -> ClientResult<LogSetResponse>;

    async fn finish(&self, workout_id: WorkoutId) -> ClientResult<FinishWorkoutResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_set_response_decodes_backend_json() {
        let json = r#"{
            "set": {
                "id": "0b8a4e52-5c2f-4d4a-9d9e-1f0c2f7b6a11",
                "workout_id": "6f1c3a9e-2b7d-4c1e-8f5a-3d2e1b0c9a87",
                "exercise_id": "a3e5c7d9-1b2f-4a6c-8e0d-2f4b6d8a0c1e",
                "weight_kg": 82.5,
                "reps": 5,
                "rpe": null,
                "created_at": "2026-01-05T10:00:00Z"
            },
            "is_new_1rm": true,
            "is_vol_pr": false
        }"#;
        let response: LogSetResponse = serde_json::from_str(json).unwrap();
        let set = response.into_logged_set();
        assert_eq!(set.weight_kg, 82.5);
        assert_eq!(set.reps, 5);
        assert!(set.is_new_1rm);
        assert!(!set.is_vol_pr);
        assert_eq!(set.volume(), 412.5);
    }

    #[test]
    fn test_create_request_omits_empty_fields() {
        let request = CreateWorkoutRequest {
            user_id: Uuid::nil(),
            name: None,
            start_time: None,
            template_id: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_finish_response_without_badges() {
        let json = r#"{"id":"6f1c3a9e-2b7d-4c1e-8f5a-3d2e1b0c9a87","end_time":"2026-01-05T11:00:00Z"}"#;
        let response: FinishWorkoutResponse = serde_json::from_str(json).unwrap();
        assert!(response.badges.is_empty());
    }
}
