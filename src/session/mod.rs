//! Workout session - the single owner of what is happening in the current
//! workout.
//!
//! [`Session`] is a cheap, cloneable handle. Local edits (enqueue, reorder,
//! select, remove) are synchronous; backend-backed transitions are async and
//! never hold the state lock across a network call. UI code renders from
//! [`Session::subscribe`] and reacts to [`Session::events`].

pub mod events;
pub mod queue;
pub mod state;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::client::{CreateWorkoutRequest, ExerciseCatalog, LoggedSet, RoutineStore, UserId, Workout, WorkoutClient, WorkoutId};
use crate::error::{ClientError, SessionError, SessionResult};
use crate::exercises::Exercise;
use crate::routine::{RoutineId, RoutineSpec};

pub use events::{
    FinishOutcome, FinishSummary, Operation, ReconcileDecision, RewardKind, SessionEvent, SessionSnapshot, StateTag,
    badge_description,
};
pub use queue::{QueueId, QueuedExercise};
pub use state::{FinishStep, ResolveStep, SessionState, Ticket};

/// Capacity of the notification channel
const EVENT_CAPACITY: usize = 64;

struct Inner {
    state: Mutex<SessionState>,
    user_id: UserId,
    workouts: Arc<dyn WorkoutClient>,
    routines: Arc<dyn RoutineStore>,
    catalog: Arc<dyn ExerciseCatalog>,
    snapshots: watch::Sender<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

/// Exercises of `spec` in routine order, resolved against the catalog.
/// Targets whose exercise is missing from the catalog are skipped.
fn seed_exercises(spec: &RoutineSpec, catalog: Vec<Exercise>) -> Vec<Exercise> {
    let by_id: HashMap<_, _> = catalog.into_iter().map(|e| (e.id, e)).collect();
    spec.ordered_targets()
        .iter()
        .filter_map(|target| {
            let exercise = by_id.get(&target.exercise_id).cloned();
            if exercise.is_none() {
                warn!("routine {} references unknown exercise {}", spec.routine.id, target.exercise_id);
            }
            exercise
        })
        .collect()
}

impl Session {
    pub fn new(
        user_id: UserId,
        workouts: Arc<dyn WorkoutClient>,
        routines: Arc<dyn RoutineStore>,
        catalog: Arc<dyn ExerciseCatalog>,
    ) -> Self {
        let (snapshots, _) = watch::channel(SessionSnapshot::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SessionState::new()),
                user_id,
                workouts,
                routines,
                catalog,
                snapshots,
                events,
            }),
        }
    }

    /// Session over a backend that serves all three collaborators
    pub fn with_backend<B>(user_id: UserId, backend: Arc<B>) -> Self
    where
        B: WorkoutClient + RoutineStore + ExerciseCatalog + 'static,
    {
        Self::new(user_id, backend.clone(), backend.clone(), backend)
    }

    pub fn user_id(&self) -> UserId {
        self.inner.user_id
    }

    pub fn catalog(&self) -> &Arc<dyn ExerciseCatalog> {
        &self.inner.catalog
    }

    pub fn routines(&self) -> &Arc<dyn RoutineStore> {
        &self.inner.routines
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SessionState) {
        self.inner.snapshots.send_replace(state.snapshot());
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine
        let _ = self.inner.events.send(event);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state().snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshots.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Sets logged this session for the selected exercise
    pub fn current_sets(&self) -> Vec<LoggedSet> {
        self.snapshot().current_sets
    }

    /// Create a workout, optionally seeded from a routine
    pub async fn start(&self, routine_id: Option<RoutineId>, name: Option<String>) -> SessionResult<Workout> {
        let ticket = {
            let mut state = self.state();
            let ticket = state.begin_start()?;
            self.publish(&state);
            ticket
        };
        info!("starting workout (routine: {:?})", routine_id);

        let prepared = self.prepare_start(routine_id, name).await;

        let mut state = self.state();
        let result = match prepared {
            Err(e) => {
                warn!("failed to start workout: {}", e);
                state.fail(ticket);
                Err(SessionError::from(e))
            }
            Ok((workout, baseline, exercises)) => state
                .complete_start(ticket, workout.clone(), baseline, exercises)
                .map(|_| workout),
        };
        self.publish(&state);
        result
    }

    async fn prepare_start(
        &self,
        routine_id: Option<RoutineId>,
        name: Option<String>,
    ) -> Result<(Workout, Option<RoutineSpec>, Vec<Exercise>), ClientError> {
        // Load the routine before creating anything so a failure leaves no orphan workout
        let (baseline, exercises) = match routine_id {
            Some(id) => {
                let spec = self.inner.routines.get(id).await?;
                let catalog = self.inner.catalog.list().await?;
                let exercises = seed_exercises(&spec, catalog);
                (Some(spec), exercises)
            }
            None => (None, Vec::new()),
        };

        let workout = self
            .inner
            .workouts
            .create(CreateWorkoutRequest {
                user_id: self.inner.user_id,
                name,
                start_time: Some(Utc::now()),
                template_id: routine_id,
            })
            .await?;
        Ok((workout, baseline, exercises))
    }

    /// Reset to idle without a backend call; late responses are dropped
    pub fn abandon(&self) {
        let mut state = self.state();
        state.abandon();
        self.publish(&state);
    }

    pub fn enqueue(&self, exercise: Exercise) -> SessionResult<QueueId> {
        let mut state = self.state();
        let queue_id = state.enqueue(exercise)?;
        self.publish(&state);
        Ok(queue_id)
    }

    /// Move a queue entry to `new_position`; returns its final position
    pub fn reorder(&self, queue_id: QueueId, new_position: usize) -> SessionResult<usize> {
        let mut state = self.state();
        let position = state.reorder(queue_id, new_position)?;
        self.publish(&state);
        Ok(position)
    }

    pub fn select(&self, queue_id: Option<QueueId>) -> SessionResult<()> {
        let mut state = self.state();
        state.select(queue_id)?;
        self.publish(&state);
        Ok(())
    }

    pub fn remove(&self, queue_id: QueueId) -> SessionResult<QueuedExercise> {
        let mut state = self.state();
        let removed = state.remove(queue_id)?;
        self.publish(&state);
        Ok(removed)
    }

    /// Log a set for the selected exercise. Record flags come from the backend.
    pub async fn log_set(&self, weight_kg: f64, reps: u32, rpe: Option<f32>) -> SessionResult<LoggedSet> {
        let (ticket, request) = {
            let mut state = self.state();
            let begun = state.begin_log_set(weight_kg, reps, rpe)?;
            self.publish(&state);
            begun
        };

        let response = self.inner.workouts.log_set(request).await;

        let (logged, exercise_name) = {
            let mut state = self.state();
            let result = match response {
                Err(e) => {
                    warn!("failed to log set: {}", e);
                    state.fail(ticket);
                    Err(SessionError::from(e))
                }
                Ok(response) => state.complete_log_set(ticket, response),
            };
            self.publish(&state);
            let logged = result?;
            let name = state.exercise_name(logged.exercise_id).unwrap_or_default().to_string();
            (logged, name)
        };

        if logged.is_new_1rm {
            self.emit(SessionEvent::Reward {
                kind: RewardKind::NewOneRepMax,
                exercise_name: exercise_name.clone(),
                set: logged.clone(),
            });
        }
        if logged.is_vol_pr {
            self.emit(SessionEvent::Reward {
                kind: RewardKind::RepRecord,
                exercise_name,
                set: logged.clone(),
            });
        }
        Ok(logged)
    }

    /// Finish the workout, or return the reconciliation proposal that has to
    /// be resolved first.
    pub async fn finish(&self) -> SessionResult<FinishOutcome> {
        let step = {
            let mut state = self.state();
            let step = state.begin_finish();
            self.publish(&state);
            step?
        };

        match step {
            FinishStep::Prompt(proposal) => {
                info!("routine {} changed, asking before finish", proposal.routine_id);
                self.emit(SessionEvent::ReconciliationPrompt(proposal.clone()));
                Ok(FinishOutcome::NeedsDecision(proposal))
            }
            FinishStep::Call(ticket, workout_id) => {
                self.call_finish(ticket, workout_id).await.map(FinishOutcome::Finished)
            }
        }
    }

    /// Apply or skip the pending routine update, then finish the workout
    pub async fn resolve_reconciliation(&self, decision: ReconcileDecision) -> SessionResult<FinishSummary> {
        let step = {
            let mut state = self.state();
            let step = state.begin_resolve(decision);
            self.publish(&state);
            step?
        };

        let (ticket, workout_id) = match step {
            ResolveStep::Finish(ticket, workout_id) => (ticket, workout_id),
            ResolveStep::UpdateRoutine(ticket, proposal) => {
                let result = self
                    .inner
                    .routines
                    .replace_exercises(proposal.routine_id, &proposal.targets)
                    .await;

                let next = {
                    let mut state = self.state();
                    let next = match result {
                        Err(e) => {
                            warn!("failed to update routine {}: {}", proposal.routine_id, e);
                            state.fail(ticket);
                            Err(SessionError::from(e))
                        }
                        Ok(_) => state.complete_routine_update(ticket),
                    };
                    self.publish(&state);
                    next?
                };
                info!("routine {} updated from session", proposal.routine_id);
                self.emit(SessionEvent::RoutineUpdated { routine_id: proposal.routine_id });
                next
            }
        };

        self.call_finish(ticket, workout_id).await
    }

    async fn call_finish(&self, ticket: Ticket, workout_id: WorkoutId) -> SessionResult<FinishSummary> {
        let response = self.inner.workouts.finish(workout_id).await;

        let summary = {
            let mut state = self.state();
            let result = match response {
                Err(e) => {
                    warn!("failed to finish workout {}: {}", workout_id, e);
                    state.fail(ticket);
                    Err(SessionError::from(e))
                }
                Ok(response) => state.complete_finish(ticket, response),
            };
            self.publish(&state);
            result?
        };

        if !summary.badges.is_empty() {
            self.emit(SessionEvent::BadgesEarned(summary.badges.clone()));
        }
        self.emit(SessionEvent::Finished(summary.clone()));
        Ok(summary)
    }
}
