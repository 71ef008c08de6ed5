//! In-memory workout session state machine
//!
//! Network-backed transitions are split in two phases: `begin_*` validates
//! and marks the operation in flight, `complete_*` applies the response.
//! Every begun operation carries a [`Ticket`]; a ticket issued before
//! [`SessionState::abandon`] no longer matches and its response is dropped.

use tracing::{debug, error, info, warn};

use crate::client::{FinishWorkoutResponse, LogSetRequest, LogSetResponse, LoggedSet, Workout, WorkoutId};
use crate::error::{SessionError, SessionResult, ValidationError};
use crate::exercises::Exercise;
use crate::routine::{self, RoutineProposal, RoutineSpec};

use super::events::{FinishSummary, Operation, ReconcileDecision, SessionSnapshot, StateTag};
use super::queue::{ExerciseQueue, QueueId, QueuedExercise};

/// Upper bound of the perceived-exertion scale
pub const MAX_RPE: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub operation: Operation,
    epoch: u64,
    /// Workout active when the ticket was issued; `None` for a start
    workout_id: Option<WorkoutId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
enum Reconciliation {
    #[default]
    Unresolved,
    Prompt(RoutineProposal),
    Resolved,
}

/// Next step after `begin_finish`
#[derive(Debug, Clone, PartialEq)]
pub enum FinishStep {
    Prompt(RoutineProposal),
    Call(Ticket, WorkoutId),
}

/// Next step after `begin_resolve`
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveStep {
    UpdateRoutine(Ticket, RoutineProposal),
    Finish(Ticket, WorkoutId),
}

#[derive(Debug, Default)]
pub struct SessionState {
    tag: StateTag,
    workout: Option<Workout>,
    /// Routine the workout was started from, as loaded at start
    baseline: Option<RoutineSpec>,
    queue: ExerciseQueue,
    selected: Option<QueueId>,
    sets: Vec<LoggedSet>,
    pending: Option<Operation>,
    epoch: u64,
    reconciliation: Reconciliation,
}

fn invariant(message: String) -> SessionError {
    error!("session invariant violated: {}", message);
    SessionError::InvariantViolation(message)
}

/// Check weight, reps and RPE of a set before it is sent anywhere
pub fn validate_set(weight_kg: f64, reps: u32, rpe: Option<f32>) -> Result<(), ValidationError> {
    if !weight_kg.is_finite() {
        return Err(ValidationError::NonFiniteWeight);
    }
    if weight_kg < 0.0 {
        return Err(ValidationError::NegativeWeight(weight_kg));
    }
    if reps == 0 {
        return Err(ValidationError::ZeroReps);
    }
    if let Some(rpe) = rpe
        && !(0.0..=MAX_RPE).contains(&rpe)
    {
        return Err(ValidationError::InvalidRpe(rpe));
    }
    Ok(())
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(&self) -> StateTag {
        self.tag
    }

    pub fn workout(&self) -> Option<&Workout> {
        self.workout.as_ref()
    }

    pub fn queue(&self) -> &[QueuedExercise] {
        self.queue.items()
    }

    pub fn selected(&self) -> Option<QueueId> {
        self.selected
    }

    pub fn sets(&self) -> &[LoggedSet] {
        &self.sets
    }

    pub fn pending(&self) -> Option<Operation> {
        self.pending
    }

    pub fn proposal(&self) -> Option<&RoutineProposal> {
        match &self.reconciliation {
            Reconciliation::Prompt(proposal) => Some(proposal),
            _ => None,
        }
    }

    pub fn selected_exercise(&self) -> Option<&QueuedExercise> {
        self.selected.and_then(|id| self.queue.get(id))
    }

    pub fn exercise_name(&self, exercise_id: uuid::Uuid) -> Option<&str> {
        self.queue
            .items()
            .iter()
            .find(|q| q.exercise.id == exercise_id)
            .map(|q| q.exercise.name.as_str())
    }

    pub fn total_volume_kg(&self) -> f64 {
        self.sets.iter().map(LoggedSet::volume).sum()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let current_sets = match self.selected_exercise() {
            Some(current) => self
                .sets
                .iter()
                .filter(|s| s.exercise_id == current.exercise.id)
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        SessionSnapshot {
            state: self.tag,
            workout: self.workout.clone(),
            queue: self.queue.items().to_vec(),
            selected: self.selected,
            current_sets,
            set_count: self.sets.len(),
            total_volume_kg: self.total_volume_kg(),
            pending: self.pending,
            proposal: self.proposal().cloned(),
        }
    }

    fn require(&self, action: &'static str, tag: StateTag) -> SessionResult<()> {
        if self.tag != tag {
            debug!("rejected {} in state {}", action, self.tag);
            return Err(SessionError::InvalidTransition { action, state: self.tag });
        }
        Ok(())
    }

    fn issue(&mut self, operation: Operation) -> SessionResult<Ticket> {
        if let Some(pending) = self.pending {
            return Err(SessionError::Busy(pending));
        }
        self.pending = Some(operation);
        Ok(Ticket {
            operation,
            epoch: self.epoch,
            workout_id: self.workout.as_ref().map(|w| w.id),
        })
    }

    /// Fails with `Stale` when the session was reset since `ticket` was issued
    fn redeem(&self, ticket: Ticket, workout_id: WorkoutId) -> SessionResult<()> {
        if ticket.epoch != self.epoch {
            warn!("dropping {} response for workout {}: session was reset", ticket.operation, workout_id);
            return Err(SessionError::Stale { workout_id });
        }
        Ok(())
    }

    fn active_workout_id(&self) -> SessionResult<WorkoutId> {
        self.workout
            .as_ref()
            .map(|w| w.id)
            .ok_or_else(|| invariant(format!("no workout while session is {}", self.tag)))
    }

    /// Clear the in-flight marker of a failed operation
    pub fn fail(&mut self, ticket: Ticket) {
        if ticket.epoch == self.epoch && self.pending == Some(ticket.operation) {
            self.pending = None;
        }
    }

    // === start ===

    pub fn begin_start(&mut self) -> SessionResult<Ticket> {
        self.require("start a workout", StateTag::Idle)?;
        self.issue(Operation::Start)
    }

    /// Activate `workout` and seed the queue with `exercises` in order
    pub fn complete_start(
        &mut self,
        ticket: Ticket,
        workout: Workout,
        baseline: Option<RoutineSpec>,
        exercises: Vec<Exercise>,
    ) -> SessionResult<()> {
        self.redeem(ticket, workout.id)?;

        self.queue.clear();
        for exercise in exercises {
            self.queue.push(exercise);
        }
        self.selected = self.queue.first().map(|q| q.queue_id);
        self.sets.clear();
        self.baseline = baseline;
        self.reconciliation = Reconciliation::Unresolved;
        self.pending = None;
        self.tag = StateTag::Active;

        info!(
            "workout {} started with {} queued exercises",
            workout.id,
            self.queue.len()
        );
        self.workout = Some(workout);
        Ok(())
    }

    // === local queue edits ===

    pub fn enqueue(&mut self, exercise: Exercise) -> SessionResult<QueueId> {
        self.require("add an exercise", StateTag::Active)?;
        let name = exercise.name.clone();
        let queue_id = self.queue.push(exercise);
        if self.selected.is_none() {
            self.selected = Some(queue_id);
        }
        debug!("queued {} as {}", name, queue_id);
        Ok(queue_id)
    }

    pub fn reorder(&mut self, queue_id: QueueId, new_position: usize) -> SessionResult<usize> {
        self.require("reorder the queue", StateTag::Active)?;
        self.queue
            .move_to(queue_id, new_position)
            .ok_or_else(|| invariant(format!("reorder of unknown queue entry {}", queue_id)))
    }

    pub fn select(&mut self, queue_id: Option<QueueId>) -> SessionResult<()> {
        self.require("select an exercise", StateTag::Active)?;
        if self.selected == queue_id {
            return Ok(());
        }
        if let Some(id) = queue_id
            && !self.queue.contains(id)
        {
            return Err(invariant(format!("select of unknown queue entry {}", id)));
        }
        self.selected = queue_id;
        Ok(())
    }

    pub fn remove(&mut self, queue_id: QueueId) -> SessionResult<QueuedExercise> {
        self.require("remove an exercise", StateTag::Active)?;
        let removed = self
            .queue
            .remove(queue_id)
            .ok_or_else(|| invariant(format!("remove of unknown queue entry {}", queue_id)))?;
        if self.selected == Some(queue_id) {
            self.selected = None;
        }
        Ok(removed)
    }

    // === log set ===

    pub fn begin_log_set(
        &mut self,
        weight_kg: f64,
        reps: u32,
        rpe: Option<f32>,
    ) -> SessionResult<(Ticket, LogSetRequest)> {
        self.require("log a set", StateTag::Active)?;
        let exercise_id = self
            .selected_exercise()
            .map(|q| q.exercise.id)
            .ok_or(ValidationError::NoExerciseSelected)?;
        validate_set(weight_kg, reps, rpe)?;
        let workout_id = self.active_workout_id()?;

        let ticket = self.issue(Operation::LogSet)?;
        Ok((
            ticket,
            LogSetRequest { workout_id, exercise_id, weight_kg, reps, rpe },
        ))
    }

    pub fn complete_log_set(&mut self, ticket: Ticket, response: LogSetResponse) -> SessionResult<LoggedSet> {
        let set_workout = response.set.workout_id;
        self.redeem(ticket, set_workout)?;
        self.pending = None;

        if self.workout.as_ref().map(|w| w.id) != Some(set_workout) {
            warn!("dropping set for workout {}: not the active workout", set_workout);
            return Err(SessionError::Stale { workout_id: set_workout });
        }

        let logged = response.into_logged_set();
        debug!(
            "logged {}kg x {} (1rm: {}, rep pr: {})",
            logged.weight_kg, logged.reps, logged.is_new_1rm, logged.is_vol_pr
        );
        self.sets.push(logged.clone());
        Ok(logged)
    }

    // === finish ===

    pub fn begin_finish(&mut self) -> SessionResult<FinishStep> {
        match self.tag {
            StateTag::Idle => {
                return Err(SessionError::InvalidTransition { action: "finish", state: self.tag });
            }
            StateTag::Active => {
                if let Some(pending) = self.pending {
                    return Err(SessionError::Busy(pending));
                }
                let workout_id = self.active_workout_id()?;
                self.tag = StateTag::Finishing;
                self.reconciliation =
                    match routine::propose(self.baseline.as_ref(), self.queue.items(), &self.sets) {
                        Some(proposal) => Reconciliation::Prompt(proposal),
                        None => Reconciliation::Resolved,
                    };
                info!("finishing workout {}", workout_id);
            }
            StateTag::Finishing => {}
        }

        if let Reconciliation::Prompt(proposal) = &self.reconciliation {
            return Ok(FinishStep::Prompt(proposal.clone()));
        }
        let (ticket, workout_id) = self.begin_finish_call()?;
        Ok(FinishStep::Call(ticket, workout_id))
    }

    fn begin_finish_call(&mut self) -> SessionResult<(Ticket, WorkoutId)> {
        let workout_id = self.active_workout_id()?;
        let ticket = self.issue(Operation::Finish)?;
        Ok((ticket, workout_id))
    }

    pub fn begin_resolve(&mut self, decision: ReconcileDecision) -> SessionResult<ResolveStep> {
        self.require("resolve reconciliation", StateTag::Finishing)?;
        if let Some(pending) = self.pending {
            return Err(SessionError::Busy(pending));
        }
        let Reconciliation::Prompt(proposal) = &self.reconciliation else {
            return Err(SessionError::InvalidTransition {
                action: "resolve reconciliation without a prompt",
                state: self.tag,
            });
        };

        match decision {
            ReconcileDecision::Apply => {
                let proposal = proposal.clone();
                let ticket = self.issue(Operation::UpdateRoutine)?;
                Ok(ResolveStep::UpdateRoutine(ticket, proposal))
            }
            ReconcileDecision::Skip => {
                info!("routine update skipped");
                self.reconciliation = Reconciliation::Resolved;
                let (ticket, workout_id) = self.begin_finish_call()?;
                Ok(ResolveStep::Finish(ticket, workout_id))
            }
        }
    }

    /// Mark the routine as updated and move straight on to the finish call
    pub fn complete_routine_update(&mut self, ticket: Ticket) -> SessionResult<(Ticket, WorkoutId)> {
        let workout_id = match ticket.workout_id {
            Some(id) => id,
            None => self.active_workout_id()?,
        };
        self.redeem(ticket, workout_id)?;
        self.pending = None;
        self.reconciliation = Reconciliation::Resolved;
        self.begin_finish_call()
    }

    pub fn complete_finish(&mut self, ticket: Ticket, response: FinishWorkoutResponse) -> SessionResult<FinishSummary> {
        self.redeem(ticket, response.id)?;
        self.pending = None;

        let workout_id = self.active_workout_id()?;
        if response.id != workout_id {
            warn!("dropping finish response for workout {}: active is {}", response.id, workout_id);
            return Err(SessionError::Stale { workout_id: response.id });
        }

        let summary = FinishSummary {
            workout_id,
            end_time: response.end_time,
            badges: response.badges,
            set_count: self.sets.len(),
            total_volume_kg: self.total_volume_kg(),
        };
        info!(
            "workout {} finished: {} sets, {:.1}kg, {} badges",
            workout_id,
            summary.set_count,
            summary.total_volume_kg,
            summary.badges.len()
        );
        self.clear();
        Ok(summary)
    }

    /// Drop the session without telling the backend
    pub fn abandon(&mut self) {
        if let Some(workout) = &self.workout {
            info!("abandoning workout {}", workout.id);
        }
        self.epoch += 1;
        self.clear();
    }

    fn clear(&mut self) {
        self.tag = StateTag::Idle;
        self.workout = None;
        self.baseline = None;
        self.queue.clear();
        self.selected = None;
        self.sets.clear();
        self.pending = None;
        self.reconciliation = Reconciliation::Unresolved;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SetRecord;
    use crate::routine::{Routine, RoutineExerciseTarget};
    use chrono::Utc;
    use uuid::Uuid;

    fn exercise(name: &str) -> Exercise {
        Exercise {
            id: Uuid::new_v4(),
            name: name.to_string(),
            muscle_group: "Back".to_string(),
            equipment: None,
            description: None,
            animation_url: None,
        }
    }

    fn workout(template_id: Option<Uuid>) -> Workout {
        Workout {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: Some("Pull Day".to_string()),
            start_time: Some(Utc::now()),
            end_time: None,
            notes: None,
            template_id,
            calories_burned: None,
        }
    }

    fn active(exercises: Vec<Exercise>) -> SessionState {
        let mut state = SessionState::new();
        let ticket = state.begin_start().unwrap();
        state.complete_start(ticket, workout(None), None, exercises).unwrap();
        state
    }

    fn response_for(request: &LogSetRequest, is_new_1rm: bool) -> LogSetResponse {
        LogSetResponse {
            set: SetRecord {
                id: Uuid::new_v4(),
                workout_id: request.workout_id,
                exercise_id: request.exercise_id,
                weight_kg: request.weight_kg,
                reps: request.reps,
                rpe: request.rpe,
            },
            is_new_1rm,
            is_vol_pr: false,
        }
    }

    fn finish_response(workout_id: WorkoutId) -> FinishWorkoutResponse {
        FinishWorkoutResponse { id: workout_id, end_time: Utc::now(), badges: vec![] }
    }

    #[test]
    fn test_new_state_is_idle() {
        let state = SessionState::new();
        assert_eq!(state.tag(), StateTag::Idle);
        assert!(state.workout().is_none());
        assert!(state.snapshot().queue.is_empty());
    }

    #[test]
    fn test_start_seeds_queue_and_selects_first() {
        let state = active(vec![exercise("row"), exercise("curl")]);
        assert_eq!(state.tag(), StateTag::Active);
        assert_eq!(state.queue().len(), 2);
        assert_eq!(state.selected(), Some(state.queue()[0].queue_id));
    }

    #[test]
    fn test_second_start_is_rejected() {
        let mut state = active(vec![]);
        assert!(matches!(
            state.begin_start(),
            Err(SessionError::InvalidTransition { state: StateTag::Active, .. })
        ));
    }

    #[test]
    fn test_start_while_start_in_flight_is_busy() {
        let mut state = SessionState::new();
        state.begin_start().unwrap();
        assert_eq!(state.begin_start(), Err(SessionError::Busy(Operation::Start)));
    }

    #[test]
    fn test_failed_start_returns_to_idle() {
        let mut state = SessionState::new();
        let ticket = state.begin_start().unwrap();
        state.fail(ticket);
        assert_eq!(state.tag(), StateTag::Idle);
        assert!(state.pending().is_none());
        assert!(state.begin_start().is_ok());
    }

    #[test]
    fn test_local_edits_require_active() {
        let mut state = SessionState::new();
        assert!(matches!(state.enqueue(exercise("row")), Err(SessionError::InvalidTransition { .. })));
        assert!(matches!(state.select(None), Err(SessionError::InvalidTransition { .. })));
        assert!(matches!(state.reorder(QueueId(1), 0), Err(SessionError::InvalidTransition { .. })));
    }

    #[test]
    fn test_enqueue_selects_when_nothing_selected() {
        let mut state = active(vec![]);
        let first = state.enqueue(exercise("row")).unwrap();
        let second = state.enqueue(exercise("row")).unwrap();
        assert_eq!(state.selected(), Some(first));
        assert_ne!(first, second);
    }

    #[test]
    fn test_unknown_queue_id_is_invariant_violation() {
        let mut state = active(vec![exercise("row")]);
        assert!(matches!(state.reorder(QueueId(999), 0), Err(SessionError::InvariantViolation(_))));
        assert!(matches!(state.select(Some(QueueId(999))), Err(SessionError::InvariantViolation(_))));
        assert!(matches!(state.remove(QueueId(999)), Err(SessionError::InvariantViolation(_))));
    }

    #[test]
    fn test_select_none_and_same() {
        let mut state = active(vec![exercise("row")]);
        let first = state.selected();
        state.select(first).unwrap();
        assert_eq!(state.selected(), first);
        state.select(None).unwrap();
        assert_eq!(state.selected(), None);
    }

    #[test]
    fn test_remove_selected_clears_selection() {
        let mut state = active(vec![exercise("row"), exercise("curl")]);
        let first = state.selected().unwrap();
        state.remove(first).unwrap();
        assert_eq!(state.selected(), None);
        assert_eq!(state.queue().len(), 1);
    }

    #[test]
    fn test_validate_set() {
        assert_eq!(validate_set(0.0, 1, None), Ok(()));
        assert_eq!(validate_set(-1.0, 5, None), Err(ValidationError::NegativeWeight(-1.0)));
        assert_eq!(validate_set(f64::NAN, 5, None), Err(ValidationError::NonFiniteWeight));
        assert_eq!(validate_set(f64::INFINITY, 5, None), Err(ValidationError::NonFiniteWeight));
        assert_eq!(validate_set(50.0, 0, None), Err(ValidationError::ZeroReps));
        assert_eq!(validate_set(50.0, 5, Some(11.0)), Err(ValidationError::InvalidRpe(11.0)));
        assert_eq!(validate_set(50.0, 5, Some(8.5)), Ok(()));
    }

    #[test]
    fn test_log_set_without_selection_is_rejected() {
        let mut state = active(vec![exercise("row")]);
        state.select(None).unwrap();
        assert_eq!(
            state.begin_log_set(60.0, 8, None).unwrap_err(),
            SessionError::Validation(ValidationError::NoExerciseSelected)
        );
        assert!(state.pending().is_none());
    }

    #[test]
    fn test_log_set_appends_with_backend_flags() {
        let mut state = active(vec![exercise("row")]);
        let (ticket, request) = state.begin_log_set(60.0, 8, Some(7.0)).unwrap();
        assert_eq!(state.pending(), Some(Operation::LogSet));

        let logged = state.complete_log_set(ticket, response_for(&request, true)).unwrap();
        assert!(logged.is_new_1rm);
        assert_eq!(state.sets().len(), 1);
        assert_eq!(state.snapshot().current_sets.len(), 1);
        assert!(state.pending().is_none());
    }

    #[test]
    fn test_second_log_set_while_in_flight_is_busy() {
        let mut state = active(vec![exercise("row")]);
        state.begin_log_set(60.0, 8, None).unwrap();
        assert_eq!(
            state.begin_log_set(60.0, 8, None).unwrap_err(),
            SessionError::Busy(Operation::LogSet)
        );
    }

    #[test]
    fn test_queue_edits_allowed_while_set_in_flight() {
        let mut state = active(vec![exercise("row")]);
        state.begin_log_set(60.0, 8, None).unwrap();
        let id = state.enqueue(exercise("curl")).unwrap();
        state.reorder(id, 0).unwrap();
        state.select(Some(id)).unwrap();
    }

    #[test]
    fn test_set_for_other_workout_is_dropped() {
        let mut state = active(vec![exercise("row")]);
        let (ticket, mut request) = state.begin_log_set(60.0, 8, None).unwrap();
        request.workout_id = Uuid::new_v4();
        let result = state.complete_log_set(ticket, response_for(&request, false));
        assert!(matches!(result, Err(SessionError::Stale { .. })));
        assert!(state.sets().is_empty());
        assert!(state.pending().is_none());
    }

    #[test]
    fn test_abandon_discards_late_responses() {
        let mut state = active(vec![exercise("row")]);
        let (ticket, request) = state.begin_log_set(60.0, 8, None).unwrap();
        state.abandon();
        assert_eq!(state.tag(), StateTag::Idle);

        let result = state.complete_log_set(ticket, response_for(&request, false));
        assert!(matches!(result, Err(SessionError::Stale { .. })));
        assert!(state.sets().is_empty());
    }

    #[test]
    fn test_abandoned_start_is_not_applied() {
        let mut state = SessionState::new();
        let ticket = state.begin_start().unwrap();
        state.abandon();
        let result = state.complete_start(ticket, workout(None), None, vec![exercise("row")]);
        assert!(matches!(result, Err(SessionError::Stale { .. })));
        assert_eq!(state.tag(), StateTag::Idle);
        assert!(state.queue().is_empty());
    }

    #[test]
    fn test_finish_without_routine_calls_backend() {
        let mut state = active(vec![exercise("row")]);
        let workout_id = state.workout().unwrap().id;
        let FinishStep::Call(ticket, id) = state.begin_finish().unwrap() else {
            panic!("expected backend call");
        };
        assert_eq!(id, workout_id);
        assert_eq!(state.tag(), StateTag::Finishing);

        let summary = state.complete_finish(ticket, finish_response(workout_id)).unwrap();
        assert_eq!(summary.workout_id, workout_id);
        assert_eq!(state.tag(), StateTag::Idle);
        assert!(state.queue().is_empty());
    }

    #[test]
    fn test_finish_in_idle_is_invalid() {
        let mut state = SessionState::new();
        assert!(matches!(
            state.begin_finish(),
            Err(SessionError::InvalidTransition { state: StateTag::Idle, .. })
        ));
    }

    #[test]
    fn test_failed_finish_stays_finishing_and_retries() {
        let mut state = active(vec![exercise("row")]);
        let FinishStep::Call(ticket, _) = state.begin_finish().unwrap() else {
            panic!("expected backend call");
        };
        assert_eq!(state.begin_finish(), Err(SessionError::Busy(Operation::Finish)));

        state.fail(ticket);
        assert_eq!(state.tag(), StateTag::Finishing);
        assert!(matches!(state.begin_finish(), Ok(FinishStep::Call(..))));
    }

    #[test]
    fn test_local_edits_rejected_while_finishing() {
        let mut state = active(vec![exercise("row")]);
        state.begin_finish().unwrap();
        assert!(matches!(state.enqueue(exercise("curl")), Err(SessionError::InvalidTransition { .. })));
        assert!(matches!(state.begin_log_set(10.0, 1, None), Err(SessionError::InvalidTransition { .. })));
    }

    fn routine_start(exercises: &[Exercise], targets: Vec<RoutineExerciseTarget>) -> SessionState {
        let routine = Routine {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: "Pull Day".to_string(),
            description: None,
            created_at: Utc::now(),
        };
        let mut state = SessionState::new();
        let ticket = state.begin_start().unwrap();
        let spec = RoutineSpec { routine: routine.clone(), exercises: targets };
        state
            .complete_start(ticket, workout(Some(routine.id)), Some(spec), exercises.to_vec())
            .unwrap();
        state
    }

    fn default_target(exercise: &Exercise, order_index: u32) -> RoutineExerciseTarget {
        RoutineExerciseTarget {
            exercise_id: exercise.id,
            order_index,
            target_sets: 3,
            target_reps: 10,
            target_weight_kg: None,
        }
    }

    #[test]
    fn test_finish_prompts_when_routine_changed() {
        let row = exercise("row");
        let curl = exercise("curl");
        let mut state = routine_start(
            &[row.clone(), curl.clone()],
            vec![default_target(&row, 0), default_target(&curl, 1)],
        );
        let id = state.queue()[1].queue_id;
        state.reorder(id, 0).unwrap();

        let FinishStep::Prompt(proposal) = state.begin_finish().unwrap() else {
            panic!("expected prompt");
        };
        assert_eq!(proposal.targets[0].exercise_id, curl.id);
        assert_eq!(state.snapshot().proposal, Some(proposal.clone()));

        // asking again re-exposes the same prompt
        assert_eq!(state.begin_finish().unwrap(), FinishStep::Prompt(proposal));
    }

    #[test]
    fn test_finish_skips_prompt_when_routine_unchanged() {
        let row = exercise("row");
        let mut state = routine_start(&[row.clone()], vec![default_target(&row, 0)]);
        assert!(matches!(state.begin_finish().unwrap(), FinishStep::Call(..)));
    }

    #[test]
    fn test_resolve_apply_then_finish() {
        let row = exercise("row");
        let mut state = routine_start(&[row.clone()], vec![default_target(&row, 0)]);
        state.enqueue(exercise("curl")).unwrap();
        state.begin_finish().unwrap();

        let ResolveStep::UpdateRoutine(ticket, proposal) =
            state.begin_resolve(ReconcileDecision::Apply).unwrap()
        else {
            panic!("expected routine update");
        };
        assert_eq!(proposal.targets.len(), 2);

        let (finish_ticket, _) = state.complete_routine_update(ticket).unwrap();
        assert_eq!(finish_ticket.operation, Operation::Finish);
        assert!(state.proposal().is_none());
    }

    #[test]
    fn test_failed_routine_update_keeps_prompt() {
        let row = exercise("row");
        let mut state = routine_start(&[row.clone()], vec![default_target(&row, 0)]);
        state.enqueue(exercise("curl")).unwrap();
        state.begin_finish().unwrap();

        let ResolveStep::UpdateRoutine(ticket, _) = state.begin_resolve(ReconcileDecision::Apply).unwrap() else {
            panic!("expected routine update");
        };
        state.fail(ticket);
        assert!(state.proposal().is_some());
        assert!(matches!(state.begin_resolve(ReconcileDecision::Skip), Ok(ResolveStep::Finish(..))));
    }

    #[test]
    fn test_routine_update_after_abandon_is_stale() {
        let row = exercise("row");
        let mut state = routine_start(&[row.clone()], vec![default_target(&row, 0)]);
        state.enqueue(exercise("curl")).unwrap();
        let workout_id = state.workout().unwrap().id;
        state.begin_finish().unwrap();

        let ResolveStep::UpdateRoutine(ticket, _) = state.begin_resolve(ReconcileDecision::Apply).unwrap() else {
            panic!("expected routine update");
        };
        state.abandon();

        let result = state.complete_routine_update(ticket);
        assert_eq!(result, Err(SessionError::Stale { workout_id }));
        assert_eq!(state.tag(), StateTag::Idle);
        assert!(state.pending().is_none());
    }

    #[test]
    fn test_resolve_without_prompt_is_invalid() {
        let mut state = active(vec![exercise("row")]);
        state.begin_finish().unwrap();
        assert!(matches!(
            state.begin_resolve(ReconcileDecision::Skip),
            Err(SessionError::Busy(Operation::Finish))
        ));

        let mut state = active(vec![exercise("row")]);
        assert!(matches!(
            state.begin_resolve(ReconcileDecision::Apply),
            Err(SessionError::InvalidTransition { .. })
        ));
    }
}
