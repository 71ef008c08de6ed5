//! Ordered, session-local exercise queue

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::exercises::Exercise;

/// Session-local handle of a queue entry. The same exercise may be queued
/// more than once, each time under a different id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueId(pub u64);

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedExercise {
    pub queue_id: QueueId,
    pub exercise: Exercise,
}

#[derive(Debug, Default)]
pub struct ExerciseQueue {
    items: Vec<QueuedExercise>,
    next_id: u64,
}

impl ExerciseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an exercise under a freshly minted id
    pub fn push(&mut self, exercise: Exercise) -> QueueId {
        // Ids keep counting across clear() so they never repeat in a session
        self.next_id += 1;
        let queue_id = QueueId(self.next_id);
        self.items.push(QueuedExercise { queue_id, exercise });
        queue_id
    }

    pub fn position(&self, queue_id: QueueId) -> Option<usize> {
        self.items.iter().position(|q| q.queue_id == queue_id)
    }

    pub fn contains(&self, queue_id: QueueId) -> bool {
        self.position(queue_id).is_some()
    }

    pub fn get(&self, queue_id: QueueId) -> Option<&QueuedExercise> {
        self.items.iter().find(|q| q.queue_id == queue_id)
    }

    /// Array-move: take the entry out and reinsert it at `new_position`,
    /// clamped to the last index. Returns the final position, or `None`
    /// for an unknown id.
    pub fn move_to(&mut self, queue_id: QueueId, new_position: usize) -> Option<usize> {
        let from = self.position(queue_id)?;
        let item = self.items.remove(from);
        let to = new_position.min(self.items.len());
        self.items.insert(to, item);
        Some(to)
    }

    pub fn remove(&mut self, queue_id: QueueId) -> Option<QueuedExercise> {
        let index = self.position(queue_id)?;
        Some(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[QueuedExercise] {
        &self.items
    }

    pub fn first(&self) -> Option<&QueuedExercise> {
        self.items.first()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn exercise(name: &str) -> Exercise {
        Exercise {
            id: Uuid::new_v4(),
            name: name.to_string(),
            muscle_group: "Legs".to_string(),
            equipment: None,
            description: None,
            animation_url: None,
        }
    }

    fn names(queue: &ExerciseQueue) -> Vec<&str> {
        queue.items().iter().map(|q| q.exercise.name.as_str()).collect()
    }

    #[test]
    fn test_push_preserves_insertion_order() {
        let mut queue = ExerciseQueue::new();
        for name in ["squat", "lunge", "calf raise"] {
            queue.push(exercise(name));
        }
        assert_eq!(names(&queue), vec!["squat", "lunge", "calf raise"]);
    }

    #[test]
    fn test_repeated_exercise_gets_distinct_ids() {
        let mut queue = ExerciseQueue::new();
        let squat = exercise("squat");
        let first = queue.push(squat.clone());
        let second = queue.push(squat.clone());
        assert_ne!(first, second);
        assert_eq!(queue.get(first).unwrap().exercise.id, queue.get(second).unwrap().exercise.id);
    }

    #[test]
    fn test_move_forward_and_backward() {
        let mut queue = ExerciseQueue::new();
        let a = queue.push(exercise("a"));
        queue.push(exercise("b"));
        let c = queue.push(exercise("c"));

        assert_eq!(queue.move_to(a, 2), Some(2));
        assert_eq!(names(&queue), vec!["b", "c", "a"]);

        assert_eq!(queue.move_to(c, 0), Some(0));
        assert_eq!(names(&queue), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_move_clamps_past_end() {
        let mut queue = ExerciseQueue::new();
        let a = queue.push(exercise("a"));
        queue.push(exercise("b"));
        assert_eq!(queue.move_to(a, 99), Some(1));
        assert_eq!(names(&queue), vec!["b", "a"]);
    }

    #[test]
    fn test_move_unknown_id() {
        let mut queue = ExerciseQueue::new();
        queue.push(exercise("a"));
        assert_eq!(queue.move_to(QueueId(42), 0), None);
        assert_eq!(names(&queue), vec!["a"]);
    }

    #[test]
    fn test_remove() {
        let mut queue = ExerciseQueue::new();
        let a = queue.push(exercise("a"));
        queue.push(exercise("b"));
        assert_eq!(queue.remove(a).unwrap().exercise.name, "a");
        assert!(!queue.contains(a));
        assert!(queue.remove(a).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_ids_not_reused_after_clear() {
        let mut queue = ExerciseQueue::new();
        let before = queue.push(exercise("a"));
        queue.clear();
        assert!(queue.is_empty());
        let after = queue.push(exercise("a"));
        assert_ne!(before, after);
    }
}
