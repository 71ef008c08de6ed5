//! Database module - SQLite storage for workouts, sets and routines

pub mod backend;

pub use backend::LocalBackend;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use crate::client::{SetRecord, UserId, Workout, WorkoutId};
use crate::exercises::{Exercise, ExerciseId, SEED_EXERCISES};
use crate::records::SetSample;
use crate::routine::{Routine, RoutineExerciseTarget, RoutineId, RoutineSpec};

/// Database wrapper
pub struct Database {
    conn: Connection,
}

fn uuid_at(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_uuid_at(row: &Row, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| Uuid::parse_str(&t).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))))
        .transpose()
}

fn time_at(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_time_at(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(idx)?;
    match text {
        Some(_) => time_at(row, idx).map(Some),
        None => Ok(None),
    }
}

fn workout_from_row(row: &Row) -> rusqlite::Result<Workout> {
    Ok(Workout {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        name: row.get(2)?,
        start_time: opt_time_at(row, 3)?,
        end_time: opt_time_at(row, 4)?,
        notes: row.get(5)?,
        template_id: opt_uuid_at(row, 6)?,
        calories_burned: row.get(7)?,
    })
}

fn target_from_row(row: &Row) -> rusqlite::Result<RoutineExerciseTarget> {
    Ok(RoutineExerciseTarget {
        exercise_id: uuid_at(row, 0)?,
        order_index: row.get(1)?,
        target_sets: row.get(2)?,
        target_reps: row.get(3)?,
        target_weight_kg: row.get(4)?,
    })
}

impl Database {
    /// Open or create database
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).with_context(|| format!("failed to open database {}", path))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        let db = Self { conn };
        db.init_schema()?;
        db.seed_exercises()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS exercises (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                muscle_group TEXT NOT NULL,
                equipment TEXT,
                description TEXT,
                animation_url TEXT
            );

            CREATE TABLE IF NOT EXISTS workouts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT,
                start_time TEXT,
                end_time TEXT,
                notes TEXT,
                template_id TEXT,
                calories_burned INTEGER
            );

            CREATE TABLE IF NOT EXISTS sets (
                id TEXT PRIMARY KEY,
                workout_id TEXT NOT NULL REFERENCES workouts(id),
                exercise_id TEXT NOT NULL,
                weight_kg REAL NOT NULL,
                reps INTEGER NOT NULL,
                rpe REAL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS routines (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS routine_exercises (
                routine_id TEXT NOT NULL REFERENCES routines(id),
                exercise_id TEXT NOT NULL,
                order_index INTEGER NOT NULL,
                target_sets INTEGER NOT NULL,
                target_reps INTEGER NOT NULL,
                target_weight_kg REAL,
                UNIQUE (routine_id, order_index)
            );

            CREATE TABLE IF NOT EXISTS user_badges (
                user_id TEXT NOT NULL,
                workout_id TEXT NOT NULL,
                badge_name TEXT NOT NULL,
                earned_at TEXT NOT NULL,
                UNIQUE (user_id, badge_name, workout_id)
            );",
        )?;
        Ok(())
    }

    /// Fill an empty catalog with the built-in exercises
    fn seed_exercises(&self) -> Result<()> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM exercises", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(());
        }
        for seed in SEED_EXERCISES {
            self.add_exercise(&seed.to_exercise())?;
        }
        tracing::info!("seeded {} exercises", SEED_EXERCISES.len());
        Ok(())
    }

    // === exercises ===

    pub fn add_exercise(&self, exercise: &Exercise) -> Result<()> {
        self.conn.execute(
            "INSERT INTO exercises (id, name, muscle_group, equipment, description, animation_url) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                exercise.id.to_string(),
                exercise.name,
                exercise.muscle_group,
                exercise.equipment,
                exercise.description,
                exercise.animation_url,
            ],
        )?;
        Ok(())
    }

    pub fn get_exercises(&self) -> Result<Vec<Exercise>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, muscle_group, equipment, description, animation_url FROM exercises ORDER BY name",
        )?;
        let exercises = stmt
            .query_map([], |row| {
                Ok(Exercise {
                    id: uuid_at(row, 0)?,
                    name: row.get(1)?,
                    muscle_group: row.get(2)?,
                    equipment: row.get(3)?,
                    description: row.get(4)?,
                    animation_url: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(exercises)
    }

    // === workouts ===

    pub fn add_workout(&self, workout: &Workout) -> Result<()> {
        self.conn.execute(
            "INSERT INTO workouts (id, user_id, name, start_time, end_time, notes, template_id, calories_burned) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                workout.id.to_string(),
                workout.user_id.to_string(),
                workout.name,
                workout.start_time.map(|t| t.to_rfc3339()),
                workout.end_time.map(|t| t.to_rfc3339()),
                workout.notes,
                workout.template_id.map(|id| id.to_string()),
                workout.calories_burned,
            ],
        )?;
        Ok(())
    }

    pub fn get_workout(&self, id: WorkoutId) -> Result<Option<Workout>> {
        let workout = self
            .conn
            .query_row(
                "SELECT id, user_id, name, start_time, end_time, notes, template_id, calories_burned FROM workouts WHERE id = ?1",
                params![id.to_string()],
                workout_from_row,
            )
            .optional()?;
        Ok(workout)
    }

    pub fn set_workout_end(&self, id: WorkoutId, end_time: DateTime<Utc>, calories_burned: u32) -> Result<()> {
        self.conn.execute(
            "UPDATE workouts SET end_time = ?1, calories_burned = ?2 WHERE id = ?3",
            params![end_time.to_rfc3339(), calories_burned, id.to_string()],
        )?;
        Ok(())
    }

    /// Total volume (kg) and set count of a workout
    pub fn workout_totals(&self, id: WorkoutId) -> Result<(f64, usize)> {
        let (volume, count): (f64, i64) = self.conn.query_row(
            "SELECT COALESCE(SUM(weight_kg * reps), 0.0), COUNT(*) FROM sets WHERE workout_id = ?1",
            params![id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((volume, count as usize))
    }

    // === sets ===

    pub fn add_set(&self, set: &SetRecord, created_at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sets (id, workout_id, exercise_id, weight_kg, reps, rpe, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                set.id.to_string(),
                set.workout_id.to_string(),
                set.exercise_id.to_string(),
                set.weight_kg,
                set.reps,
                set.rpe,
                created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Sets of `exercise_id` from the user's finished workouts
    pub fn prior_sets(&self, user_id: UserId, exercise_id: ExerciseId) -> Result<Vec<SetSample>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.weight_kg, s.reps FROM sets s
             JOIN workouts w ON s.workout_id = w.id
             WHERE s.exercise_id = ?1 AND w.user_id = ?2 AND w.end_time IS NOT NULL",
        )?;
        let sets = stmt
            .query_map(params![exercise_id.to_string(), user_id.to_string()], |row| {
                Ok(SetSample::new(row.get(0)?, row.get(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sets)
    }

    // === routines ===

    pub fn add_routine(&self, routine: &Routine) -> Result<()> {
        self.conn.execute(
            "INSERT INTO routines (id, user_id, name, description, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                routine.id.to_string(),
                routine.user_id.to_string(),
                routine.name,
                routine.description,
                routine.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_routines(&self) -> Result<Vec<Routine>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, user_id, name, description, created_at FROM routines ORDER BY created_at DESC")?;
        let routines = stmt
            .query_map([], |row| {
                Ok(Routine {
                    id: uuid_at(row, 0)?,
                    user_id: uuid_at(row, 1)?,
                    name: row.get(2)?,
                    description: row.get(3)?,
                    created_at: time_at(row, 4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(routines)
    }

    pub fn get_routine(&self, id: RoutineId) -> Result<Option<RoutineSpec>> {
        let Some(routine) = self.get_routines()?.into_iter().find(|r| r.id == id) else {
            return Ok(None);
        };
        let exercises = self.routine_targets(id)?;
        Ok(Some(RoutineSpec { routine, exercises }))
    }

    fn routine_targets(&self, id: RoutineId) -> Result<Vec<RoutineExerciseTarget>> {
        let mut stmt = self.conn.prepare(
            "SELECT exercise_id, order_index, target_sets, target_reps, target_weight_kg
             FROM routine_exercises WHERE routine_id = ?1 ORDER BY order_index",
        )?;
        let targets = stmt
            .query_map(params![id.to_string()], target_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(targets)
    }

    /// Append a target after the routine's last exercise
    pub fn add_routine_exercise(&self, id: RoutineId, target: &RoutineExerciseTarget) -> Result<RoutineExerciseTarget> {
        let next: u32 = self.conn.query_row(
            "SELECT COALESCE(MAX(order_index) + 1, 0) FROM routine_exercises WHERE routine_id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        let stored = RoutineExerciseTarget { order_index: next, ..target.clone() };
        insert_target(&self.conn, id, &stored)?;
        Ok(stored)
    }

    /// Replace the routine's exercise list in one transaction
    pub fn replace_routine_exercises(
        &mut self,
        id: RoutineId,
        targets: &[RoutineExerciseTarget],
    ) -> Result<Vec<RoutineExerciseTarget>> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM routine_exercises WHERE routine_id = ?1", params![id.to_string()])?;
        for target in targets {
            insert_target(&tx, id, target)?;
        }
        tx.commit()?;
        self.routine_targets(id)
    }

    // === badges ===

    pub fn add_badges(&self, user_id: UserId, workout_id: WorkoutId, badges: &[String], earned_at: DateTime<Utc>) -> Result<()> {
        for badge in badges {
            self.conn.execute(
                "INSERT OR IGNORE INTO user_badges (user_id, workout_id, badge_name, earned_at) VALUES (?1, ?2, ?3, ?4)",
                params![user_id.to_string(), workout_id.to_string(), badge, earned_at.to_rfc3339()],
            )?;
        }
        Ok(())
    }

    pub fn get_badges(&self, workout_id: WorkoutId) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT badge_name FROM user_badges WHERE workout_id = ?1 ORDER BY rowid")?;
        let badges = stmt
            .query_map(params![workout_id.to_string()], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(badges)
    }
}

fn insert_target(conn: &Connection, id: RoutineId, target: &RoutineExerciseTarget) -> Result<()> {
    conn.execute(
        "INSERT INTO routine_exercises (routine_id, exercise_id, order_index, target_sets, target_reps, target_weight_kg) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id.to_string(),
            target.exercise_id.to_string(),
            target.order_index,
            target.target_sets,
            target.target_reps,
            target.target_weight_kg,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_workout(db: &Database, user_id: UserId, finished: bool) -> Workout {
        let workout = Workout {
            id: Uuid::new_v4(),
            user_id,
            name: Some("Test".to_string()),
            start_time: Some(Utc::now()),
            end_time: finished.then(Utc::now),
            notes: None,
            template_id: None,
            calories_burned: None,
        };
        db.add_workout(&workout).unwrap();
        workout
    }

    fn create_set(db: &Database, workout: &Workout, exercise_id: ExerciseId, weight_kg: f64, reps: u32) {
        let set = SetRecord {
            id: Uuid::new_v4(),
            workout_id: workout.id,
            exercise_id,
            weight_kg,
            reps,
            rpe: None,
        };
        db.add_set(&set, Utc::now()).unwrap();
    }

    fn create_routine(db: &Database) -> Routine {
        let routine = Routine {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: "Upper".to_string(),
            description: None,
            created_at: Utc::now(),
        };
        db.add_routine(&routine).unwrap();
        routine
    }

    fn target(exercise_id: ExerciseId, order_index: u32) -> RoutineExerciseTarget {
        RoutineExerciseTarget {
            exercise_id,
            order_index,
            target_sets: 3,
            target_reps: 8,
            target_weight_kg: Some(60.0),
        }
    }

    #[test]
    fn test_open_seeds_catalog_once() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_exercises().unwrap().len(), SEED_EXERCISES.len());
        db.seed_exercises().unwrap();
        assert_eq!(db.get_exercises().unwrap().len(), SEED_EXERCISES.len());
    }

    #[test]
    fn test_workout_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let workout = create_workout(&db, Uuid::nil(), false);
        let loaded = db.get_workout(workout.id).unwrap().unwrap();
        assert_eq!(loaded.id, workout.id);
        assert!(loaded.end_time.is_none());
        assert!(db.get_workout(Uuid::new_v4()).unwrap().is_none());

        let end = Utc::now();
        db.set_workout_end(workout.id, end, 310).unwrap();
        let finished = db.get_workout(workout.id).unwrap().unwrap();
        assert!(finished.end_time.is_some());
        assert_eq!(finished.calories_burned, Some(310));
    }

    #[test]
    fn test_workout_totals() {
        let db = Database::open_in_memory().unwrap();
        let workout = create_workout(&db, Uuid::nil(), false);
        assert_eq!(db.workout_totals(workout.id).unwrap(), (0.0, 0));

        let exercise = Uuid::new_v4();
        create_set(&db, &workout, exercise, 100.0, 5);
        create_set(&db, &workout, exercise, 80.0, 10);
        assert_eq!(db.workout_totals(workout.id).unwrap(), (1300.0, 2));
    }

    #[test]
    fn test_prior_sets_only_finished_workouts_of_user() {
        let db = Database::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        let exercise = Uuid::new_v4();

        let done = create_workout(&db, user, true);
        let open = create_workout(&db, user, false);
        let other_user = create_workout(&db, Uuid::new_v4(), true);
        create_set(&db, &done, exercise, 100.0, 5);
        create_set(&db, &done, Uuid::new_v4(), 200.0, 1);
        create_set(&db, &open, exercise, 120.0, 5);
        create_set(&db, &other_user, exercise, 150.0, 5);

        assert_eq!(db.prior_sets(user, exercise).unwrap(), vec![SetSample::new(100.0, 5)]);
    }

    #[test]
    fn test_routine_add_appends_order() {
        let db = Database::open_in_memory().unwrap();
        let routine = create_routine(&db);

        let first = db.add_routine_exercise(routine.id, &target(Uuid::new_v4(), 9)).unwrap();
        let second = db.add_routine_exercise(routine.id, &target(Uuid::new_v4(), 9)).unwrap();
        assert_eq!(first.order_index, 0);
        assert_eq!(second.order_index, 1);

        let spec = db.get_routine(routine.id).unwrap().unwrap();
        assert_eq!(spec.exercises, vec![first, second]);
    }

    #[test]
    fn test_replace_routine_exercises() {
        let mut db = Database::open_in_memory().unwrap();
        let routine = create_routine(&db);
        db.add_routine_exercise(routine.id, &target(Uuid::new_v4(), 0)).unwrap();
        db.add_routine_exercise(routine.id, &target(Uuid::new_v4(), 1)).unwrap();

        let replacement = vec![target(Uuid::new_v4(), 0)];
        let stored = db.replace_routine_exercises(routine.id, &replacement).unwrap();
        assert_eq!(stored, replacement);
        assert_eq!(db.get_routine(routine.id).unwrap().unwrap().exercises, replacement);
    }

    #[test]
    fn test_missing_routine() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_routine(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_badges_are_unique_per_workout() {
        let db = Database::open_in_memory().unwrap();
        let workout = create_workout(&db, Uuid::nil(), true);
        let badges = vec!["Heavy Lifter".to_string(), "Marathoner".to_string()];
        db.add_badges(Uuid::nil(), workout.id, &badges, Utc::now()).unwrap();
        db.add_badges(Uuid::nil(), workout.id, &badges, Utc::now()).unwrap();
        assert_eq!(db.get_badges(workout.id).unwrap(), badges);
    }
}
