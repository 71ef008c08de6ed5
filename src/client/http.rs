//! REST backend for the TitanLift API

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    ClientResult, CreateWorkoutRequest, ExerciseCatalog, FinishWorkoutResponse, LogSetRequest, LogSetResponse,
    RoutineStore, UserId, Workout, WorkoutClient, WorkoutId,
};
use crate::error::ClientError;
use crate::exercises::{Exercise, ExerciseId};
use crate::routine::{Routine, RoutineExerciseTarget, RoutineId, RoutineSpec};

/// Routine exercise row as returned by `GET /templates/{id}`
#[derive(Debug, Deserialize)]
struct TemplateExerciseRow {
    exercise_id: ExerciseId,
    #[serde(default)]
    order_index: Option<u32>,
    target_sets: u32,
    target_reps: u32,
    #[serde(default)]
    target_weight_kg: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TemplateWithExercises {
    template: Routine,
    exercises: Vec<TemplateExerciseRow>,
}

impl TemplateWithExercises {
    /// Rows arrive sorted; rows without an index take their position
    fn into_spec(self) -> RoutineSpec {
        let exercises = self
            .exercises
            .into_iter()
            .enumerate()
            .map(|(position, row)| RoutineExerciseTarget {
                exercise_id: row.exercise_id,
                order_index: row.order_index.unwrap_or(position as u32),
                target_sets: row.target_sets,
                target_reps: row.target_reps,
                target_weight_kg: row.target_weight_kg,
            })
            .collect();
        RoutineSpec { routine: self.template, exercises }
    }
}

#[derive(Debug, Serialize)]
struct CreateTemplateRequest<'a> {
    user_id: UserId,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct UpdateTemplateExercisesRequest<'a> {
    exercises: &'a [RoutineExerciseTarget],
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// `base_url` is the API root, e.g. `http://localhost:3000/api`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a request and decode its JSON body, mapping every failure with `err`
    async fn send<T, F>(&self, request: RequestBuilder, err: F) -> ClientResult<T>
    where
        T: DeserializeOwned,
        F: Fn(String) -> ClientError,
    {
        let response = request.send().await.map_err(|e| err(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(err(format!("status {status}: {body}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| err(format!("failed to parse response: {e}")))
    }
}

#[async_trait]
impl ExerciseCatalog for HttpBackend {
    async fn list(&self) -> ClientResult<Vec<Exercise>> {
        debug!("GET exercises");
        self.send(self.client.get(self.url("exercises")), ClientError::Catalog).await
    }
}

#[async_trait]
impl RoutineStore for HttpBackend {
    async fn list(&self) -> ClientResult<Vec<Routine>> {
        self.send(self.client.get(self.url("templates")), ClientError::Routine).await
    }

    async fn get(&self, id: RoutineId) -> ClientResult<RoutineSpec> {
        debug!("GET template {}", id);
        let template: TemplateWithExercises = self
            .send(self.client.get(self.url(&format!("templates/{id}"))), ClientError::Routine)
            .await?;
        Ok(template.into_spec())
    }

    async fn replace_exercises(
        &self,
        routine_id: RoutineId,
        targets: &[RoutineExerciseTarget],
    ) -> ClientResult<Vec<RoutineExerciseTarget>> {
        debug!("PUT {} exercises into template {}", targets.len(), routine_id);
        let request = self
            .client
            .put(self.url(&format!("templates/{routine_id}/exercises")))
            .json(&UpdateTemplateExercisesRequest { exercises: targets });
        self.send(request, ClientError::Routine).await
    }

    async fn create(&self, user_id: UserId, name: &str, description: Option<&str>) -> ClientResult<Routine> {
        let request = self
            .client
            .post(self.url("templates"))
            .json(&CreateTemplateRequest { user_id, name, description });
        self.send(request, ClientError::Routine).await
    }

    async fn add_exercise(
        &self,
        routine_id: RoutineId,
        target: &RoutineExerciseTarget,
    ) -> ClientResult<RoutineExerciseTarget> {
        let request = self
            .client
            .post(self.url(&format!("templates/{routine_id}/exercises")))
            .json(target);
        self.send(request, ClientError::Routine).await
    }
}

#[async_trait]
impl WorkoutClient for HttpBackend {
    async fn create(&self, request: CreateWorkoutRequest) -> ClientResult<Workout> {
        debug!("POST workout for user {}", request.user_id);
        let request = self.client.post(self.url("workouts")).json(&request);
        self.send(request, ClientError::CreateFailed).await
    }

    async fn log_set(&self, request: LogSetRequest) -> ClientResult<LogSetResponse> {
        debug!("POST set for workout {}", request.workout_id);
        let request = self.client.post(self.url("sets")).json(&request);
        self.send(request, ClientError::LogFailed).await
    }

    async fn finish(&self, workout_id: WorkoutId) -> ClientResult<FinishWorkoutResponse> {
        debug!("POST finish for workout {}", workout_id);
        let request = self.client.post(self.url(&format!("workouts/{workout_id}/finish")));
        self.send(request, ClientError::FinishFailed).await
    }
}
