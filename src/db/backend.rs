//! Offline backend: serves the session from the local SQLite database

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::Database;
use crate::client::{
    ClientResult, CreateWorkoutRequest, ExerciseCatalog, FinishWorkoutResponse, LogSetRequest, LogSetResponse,
    RoutineStore, SetRecord, UserId, Workout, WorkoutClient, WorkoutId,
};
use crate::error::ClientError;
use crate::exercises::Exercise;
use crate::records::{self, SetSample};
use crate::routine::{Routine, RoutineExerciseTarget, RoutineId, RoutineSpec};

/// Badges earned by a finished workout
pub fn award_badges(total_volume_kg: f64, duration: Duration, set_count: usize) -> Vec<String> {
    let mut badges = Vec::new();
    let minutes = duration.num_seconds() as f64 / 60.0;

    if total_volume_kg >= 10_000.0 {
        badges.push("Titan Volume");
    } else if total_volume_kg >= 5_000.0 {
        badges.push("Heavy Lifter");
    }

    if minutes >= 90.0 {
        badges.push("Marathoner");
    } else if minutes <= 30.0 && total_volume_kg > 2_000.0 {
        badges.push("Speed Demon");
    }

    if set_count >= 20 {
        badges.push("Volume Warrior");
    }

    badges.into_iter().map(String::from).collect()
}

/// Body weight assumed for calorie estimates
pub const DEFAULT_BODY_WEIGHT_KG: f64 = 75.0;

/// Rough calorie estimate from a MET value that rises with volume per minute.
///
/// A workout without a start time counts as one hour. The MET is capped at 8.
pub fn estimate_calories(total_volume_kg: f64, duration: Option<Duration>, body_weight_kg: f64) -> u32 {
    let minutes = duration.map_or(60.0, |d| d.num_seconds() as f64 / 60.0);
    let intensity = if minutes > 0.0 { total_volume_kg / minutes / 100.0 } else { 1.0 };
    let met = (3.0 + intensity).min(8.0);
    (met * body_weight_kg * minutes / 60.0) as u32
}

fn storage(kind: fn(String) -> ClientError) -> impl Fn(anyhow::Error) -> ClientError {
    move |e| {
        warn!("storage error: {:#}", e);
        kind(format!("storage error: {e:#}"))
    }
}

pub struct LocalBackend {
    db: Mutex<Database>,
}

impl LocalBackend {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    pub fn open(path: &str) -> anyhow::Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }
}

#[async_trait]
impl ExerciseCatalog for LocalBackend {
    async fn list(&self) -> ClientResult<Vec<Exercise>> {
        self.db.lock().await.get_exercises().map_err(storage(ClientError::Catalog))
    }
}

#[async_trait]
impl RoutineStore for LocalBackend {
    async fn list(&self) -> ClientResult<Vec<Routine>> {
        self.db.lock().await.get_routines().map_err(storage(ClientError::Routine))
    }

    async fn get(&self, id: RoutineId) -> ClientResult<RoutineSpec> {
        self.db
            .lock()
            .await
            .get_routine(id)
            .map_err(storage(ClientError::Routine))?
            .ok_or_else(|| ClientError::Routine(format!("routine {id} not found")))
    }

    async fn replace_exercises(
        &self,
        routine_id: RoutineId,
        targets: &[RoutineExerciseTarget],
    ) -> ClientResult<Vec<RoutineExerciseTarget>> {
        let mut db = self.db.lock().await;
        if db.get_routine(routine_id).map_err(storage(ClientError::Routine))?.is_none() {
            return Err(ClientError::Routine(format!("routine {routine_id} not found")));
        }
        let stored = db
            .replace_routine_exercises(routine_id, targets)
            .map_err(storage(ClientError::Routine))?;
        info!("routine {} now has {} exercises", routine_id, stored.len());
        Ok(stored)
    }

    async fn create(&self, user_id: UserId, name: &str, description: Option<&str>) -> ClientResult<Routine> {
        let routine = Routine {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            description: description.map(String::from),
            created_at: Utc::now(),
        };
        self.db
            .lock()
            .await
            .add_routine(&routine)
            .map_err(storage(ClientError::Routine))?;
        Ok(routine)
    }

    async fn add_exercise(
        &self,
        routine_id: RoutineId,
        target: &RoutineExerciseTarget,
    ) -> ClientResult<RoutineExerciseTarget> {
        let db = self.db.lock().await;
        if db.get_routine(routine_id).map_err(storage(ClientError::Routine))?.is_none() {
            return Err(ClientError::Routine(format!("routine {routine_id} not found")));
        }
        db.add_routine_exercise(routine_id, target)
            .map_err(storage(ClientError::Routine))
    }
}

#[async_trait]
impl WorkoutClient for LocalBackend {
    async fn create(&self, request: CreateWorkoutRequest) -> ClientResult<Workout> {
        let workout = Workout {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            name: request.name,
            start_time: Some(request.start_time.unwrap_or_else(Utc::now)),
            end_time: None,
            notes: None,
            template_id: request.template_id,
            calories_burned: None,
        };
        self.db
            .lock()
            .await
            .add_workout(&workout)
            .map_err(storage(ClientError::CreateFailed))?;
        debug!("created workout {}", workout.id);
        Ok(workout)
    }

    async fn log_set(&self, request: LogSetRequest) -> ClientResult<LogSetResponse> {
        let db = self.db.lock().await;
        let workout = db
            .get_workout(request.workout_id)
            .map_err(storage(ClientError::LogFailed))?
            .ok_or_else(|| ClientError::LogFailed(format!("workout {} not found", request.workout_id)))?;
        if workout.end_time.is_some() {
            return Err(ClientError::LogFailed(format!("workout {} is already finished", workout.id)));
        }

        let history = db
            .prior_sets(workout.user_id, request.exercise_id)
            .map_err(storage(ClientError::LogFailed))?;
        let flags = records::detect(SetSample::new(request.weight_kg, request.reps), &history);

        let set = SetRecord {
            id: Uuid::new_v4(),
            workout_id: request.workout_id,
            exercise_id: request.exercise_id,
            weight_kg: request.weight_kg,
            reps: request.reps,
            rpe: request.rpe,
        };
        db.add_set(&set, Utc::now()).map_err(storage(ClientError::LogFailed))?;
        debug!(
            "logged {}kg x {} against {} prior sets: {:?}",
            set.weight_kg,
            set.reps,
            history.len(),
            flags
        );

        Ok(LogSetResponse {
            set,
            is_new_1rm: flags.is_new_1rm,
            is_vol_pr: flags.is_vol_pr,
        })
    }

    async fn finish(&self, workout_id: WorkoutId) -> ClientResult<FinishWorkoutResponse> {
        let db = self.db.lock().await;
        let workout = db
            .get_workout(workout_id)
            .map_err(storage(ClientError::FinishFailed))?
            .ok_or_else(|| ClientError::FinishFailed(format!("workout {workout_id} not found")))?;

        if let Some(end_time) = workout.end_time {
            let badges = db.get_badges(workout_id).map_err(storage(ClientError::FinishFailed))?;
            return Ok(FinishWorkoutResponse { id: workout_id, end_time, badges });
        }

        let end_time = Utc::now();
        let (volume, set_count) = db.workout_totals(workout_id).map_err(storage(ClientError::FinishFailed))?;
        let duration = workout.start_time.map(|start| end_time - start);
        let badges = award_badges(volume, duration.unwrap_or_default(), set_count);
        let calories = estimate_calories(volume, duration, DEFAULT_BODY_WEIGHT_KG);

        db.add_badges(workout.user_id, workout_id, &badges, end_time)
            .map_err(storage(ClientError::FinishFailed))?;
        db.set_workout_end(workout_id, end_time, calories)
            .map_err(storage(ClientError::FinishFailed))?;
        info!(
            "finished workout {}: {} sets, {}kg, ~{} kcal, badges {:?}",
            workout_id, set_count, volume, calories, badges
        );

        Ok(FinishWorkoutResponse { id: workout_id, end_time, badges })
    }
}
