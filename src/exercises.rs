//! Exercise definitions - reference catalog data

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ExerciseId = Uuid;

/// Muscle groups used to label catalog entries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MuscleGroup {
    Chest,
    Back,
    Shoulders,
    Legs,
    Arms,
    Core,
}

impl MuscleGroup {
    pub fn name(&self) -> &'static str {
        match self {
            MuscleGroup::Chest => "Chest",
            MuscleGroup::Back => "Back",
            MuscleGroup::Shoulders => "Shoulders",
            MuscleGroup::Legs => "Legs",
            MuscleGroup::Arms => "Arms",
            MuscleGroup::Core => "Core",
        }
    }

    /// All muscle groups for iteration
    pub fn all() -> &'static [MuscleGroup] {
        &[
            MuscleGroup::Chest,
            MuscleGroup::Back,
            MuscleGroup::Shoulders,
            MuscleGroup::Legs,
            MuscleGroup::Arms,
            MuscleGroup::Core,
        ]
    }
}

/// Catalog exercise. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: ExerciseId,
    pub name: String,
    pub muscle_group: String,
    #[serde(default)]
    pub equipment: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub animation_url: Option<String>,
}

/// Built-in exercise used to seed an empty local catalog
#[derive(Debug, Clone)]
pub struct SeedExercise {
    pub name: &'static str,
    pub muscle_group: MuscleGroup,
    pub equipment: Option<&'static str>,
    pub description: Option<&'static str>,
}

impl SeedExercise {
    pub fn to_exercise(&self) -> Exercise {
        Exercise {
            id: Uuid::new_v4(),
            name: self.name.to_string(),
            muscle_group: self.muscle_group.name().to_string(),
            equipment: self.equipment.map(str::to_string),
            description: self.description.map(str::to_string),
            animation_url: None,
        }
    }
}

pub const SEED_EXERCISES: &[SeedExercise] = &[
    SeedExercise {
        name: "Barbell Bench Press",
        muscle_group: MuscleGroup::Chest,
        equipment: Some("Barbell"),
        description: Some("Lie on a flat bench, lower the bar to mid chest and press it back up"),
    },
    SeedExercise {
        name: "Incline Dumbbell Press",
        muscle_group: MuscleGroup::Chest,
        equipment: Some("Dumbbell"),
        description: None,
    },
    SeedExercise {
        name: "Barbell Squat",
        muscle_group: MuscleGroup::Legs,
        equipment: Some("Barbell"),
        description: Some("Bar on upper back, sit down between the heels until thighs pass parallel"),
    },
    SeedExercise {
        name: "Deadlift",
        muscle_group: MuscleGroup::Back,
        equipment: Some("Barbell"),
        description: Some("Hinge at the hips, grip the bar and stand up with a neutral spine"),
    },
    SeedExercise {
        name: "Overhead Press",
        muscle_group: MuscleGroup::Shoulders,
        equipment: Some("Barbell"),
        description: None,
    },
    SeedExercise {
        name: "Barbell Row",
        muscle_group: MuscleGroup::Back,
        equipment: Some("Barbell"),
        description: None,
    },
    SeedExercise {
        name: "Pull Up",
        muscle_group: MuscleGroup::Back,
        equipment: Some("Bodyweight"),
        description: None,
    },
    SeedExercise {
        name: "Dumbbell Curl",
        muscle_group: MuscleGroup::Arms,
        equipment: Some("Dumbbell"),
        description: None,
    },
    SeedExercise {
        name: "Triceps Pushdown",
        muscle_group: MuscleGroup::Arms,
        equipment: Some("Cable"),
        description: None,
    },
    SeedExercise {
        name: "Hanging Leg Raise",
        muscle_group: MuscleGroup::Core,
        equipment: Some("Bodyweight"),
        description: None,
    },
];

/// Distinct muscle groups present in a catalog, sorted
pub fn muscle_groups(exercises: &[Exercise]) -> Vec<&str> {
    let mut groups: Vec<&str> = exercises.iter().map(|e| e.muscle_group.as_str()).collect();
    groups.sort_unstable();
    groups.dedup();
    groups
}

/// Filter a catalog by muscle group (case-insensitive) and name fragment
pub fn filter_exercises<'a>(
    exercises: &'a [Exercise],
    muscle_group: Option<&str>,
    search: Option<&str>,
) -> Vec<&'a Exercise> {
    let search = search.map(str::to_lowercase);
    exercises
        .iter()
        .filter(|e| {
            muscle_group
                .map(|g| e.muscle_group.eq_ignore_ascii_case(g))
                .unwrap_or(true)
        })
        .filter(|e| {
            search
                .as_deref()
                .map(|s| e.name.to_lowercase().contains(s))
                .unwrap_or(true)
        })
        .collect()
}

/// Look up an exercise by id or by exact name (case-insensitive)
pub fn find_exercise<'a>(exercises: &'a [Exercise], query: &str) -> Option<&'a Exercise> {
    let query = query.trim();
    match Uuid::parse_str(query) {
        Ok(id) => exercises.iter().find(|e| e.id == id),
        Err(_) => exercises.iter().find(|e| e.name.eq_ignore_ascii_case(query)),
    }
}
