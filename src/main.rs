//! titanlift - workout session tracker

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use titanlift::client::{ExerciseCatalog, RoutineStore};
use titanlift::config::{Config, ConfigArgs};
use titanlift::exercises::{filter_exercises, find_exercise};
use titanlift::routine::{DEFAULT_TARGET_REPS, DEFAULT_TARGET_SETS, RoutineExerciseTarget};
use titanlift::session::Session;
use titanlift::tui::App;

#[derive(Parser)]
#[command(name = "titanlift")]
#[command(author, version, about = "TitanLift - workout session tracker")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the workout session screen
    Tui,

    /// List the exercise catalog
    Exercises {
        /// Only show one muscle group (e.g. "Chest", "Legs")
        #[arg(short, long)]
        muscle: Option<String>,
    },

    /// List routines
    Routines,

    /// Manage a routine
    Routine {
        #[command(subcommand)]
        command: RoutineCommands,
    },
}

#[derive(Subcommand)]
enum RoutineCommands {
    /// Show a routine's exercises and targets
    Show { id: Uuid },

    /// Create an empty routine
    Create {
        name: String,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// Append an exercise to a routine
    Add {
        id: Uuid,

        /// Exercise name or id
        exercise: String,

        #[arg(short, long, default_value_t = DEFAULT_TARGET_SETS)]
        sets: u32,

        #[arg(short, long, default_value_t = DEFAULT_TARGET_REPS)]
        reps: u32,

        /// Target weight in kg
        #[arg(short, long)]
        weight: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Logs go to stderr so they stay out of the TUI
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_args(cli.config)?;
    let session = config.open_session()?;

    match cli.command {
        Some(Commands::Exercises { muscle }) => list_exercises(&session, muscle.as_deref()).await?,
        Some(Commands::Routines) => list_routines(&session).await?,
        Some(Commands::Routine { command }) => routine_command(&session, command).await?,
        Some(Commands::Tui) | None => {
            let mut app = App::new(session).await?;
            app.run().await?;
        }
    }

    Ok(())
}

async fn list_exercises(session: &Session, muscle: Option<&str>) -> Result<()> {
    let catalog = session.catalog().list().await?;
    let exercises = filter_exercises(&catalog, muscle, None);

    println!("{:<26} | {:<10} | {}", "Exercise", "Muscle", "Equipment");
    println!("{:-<60}", "");
    for e in exercises {
        println!(
            "{:<26} | {:<10} | {}",
            e.name,
            e.muscle_group,
            e.equipment.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn list_routines(session: &Session) -> Result<()> {
    let routines = session.routines().list().await?;
    if routines.is_empty() {
        println!("No routines yet. Create one with `titanlift routine create <name>`.");
        return Ok(());
    }
    for r in routines {
        println!(
            "{} | {:20} | {}",
            r.id,
            r.name,
            r.description.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn routine_command(session: &Session, command: RoutineCommands) -> Result<()> {
    match command {
        RoutineCommands::Show { id } => {
            let spec = session.routines().get(id).await?;
            let catalog = session.catalog().list().await?;

            println!("{}", spec.routine.name);
            if let Some(description) = &spec.routine.description {
                println!("{}", description);
            }
            println!("{:-<60}", "");
            for target in spec.ordered_targets() {
                let name = catalog
                    .iter()
                    .find(|e| e.id == target.exercise_id)
                    .map(|e| e.name.as_str())
                    .unwrap_or("(unknown exercise)");
                let weight = target
                    .target_weight_kg
                    .map(|w| format!("{w}kg"))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}. {:26} | {}x{} | {}",
                    target.order_index + 1,
                    name,
                    target.target_sets,
                    target.target_reps,
                    weight
                );
            }
        }

        RoutineCommands::Create { name, description } => {
            let routine = session
                .routines()
                .create(session.user_id(), &name, description.as_deref())
                .await?;
            println!("Created routine: {} (id: {})", routine.name, routine.id);
        }

        RoutineCommands::Add { id, exercise, sets, reps, weight } => {
            let current = session.routines().get(id).await?;
            let catalog = session.catalog().list().await?;
            let found = find_exercise(&catalog, &exercise)
                .with_context(|| format!("no exercise named {exercise:?}"))?;
            let target = RoutineExerciseTarget {
                exercise_id: found.id,
                order_index: current.exercises.len() as u32,
                target_sets: sets,
                target_reps: reps,
                target_weight_kg: weight,
            };
            let stored = session.routines().add_exercise(id, &target).await?;
            println!(
                "Added: {} - {}x{} at position {}",
                found.name,
                stored.target_sets,
                stored.target_reps,
                stored.order_index + 1
            );
        }
    }
    Ok(())
}
