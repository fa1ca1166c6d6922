//! trainerdb CLI - inspect and load the training database

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use trainerdb::{schema, sync, timestamp, Config, Database};

#[derive(Parser)]
#[command(name = "trainerdb")]
#[command(about = "Document store for workouts, exercises and user profiles", long_about = None)]
struct Cli {
    /// YAML file with store settings; environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Json, global = true)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which store is in use
    Status,

    /// Create missing design documents and list the views
    Views,

    /// Print a document
    Get {
        id: String,
    },

    /// Delete a document
    Delete {
        id: String,
    },

    /// Ingest Hevy page files (*.json) from a directory
    Import {
        dir: PathBuf,

        /// Owner of the imported workouts
        #[arg(short, long)]
        user: Option<String>,
    },

    /// List workouts, optionally within a date range
    Workouts {
        #[arg(long, value_parser = parse_from)]
        from: Option<DateTime<Utc>>,
        #[arg(long, value_parser = parse_to)]
        to: Option<DateTime<Utc>>,
    },

    /// Workouts containing an exercise, oldest first
    Progression {
        /// Hevy exercise template id
        template: String,
    },

    /// Workout totals, optionally within a date range
    Stats {
        #[arg(long, value_parser = parse_from)]
        from: Option<DateTime<Utc>>,
        #[arg(long, value_parser = parse_to)]
        to: Option<DateTime<Utc>>,
    },

    /// List exercises
    Exercises {
        /// Include this user's custom list
        #[arg(short, long)]
        user: Option<String>,

        /// Synced exercises of one muscle group
        #[arg(short, long, conflicts_with = "user")]
        muscle_group: Option<String>,

        /// Leave out the custom list
        #[arg(long)]
        no_custom: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_file(path)?,
        None => Config::load(),
    };
    let db = Database::connect(&config).await;
    let out = cli.format;

    match cli.command {
        Commands::Status => show_status(&db, &config, out),
        Commands::Views => list_views(&db, out).await,
        Commands::Get { id } => match db.store().get(&id).await? {
            Some(doc) => emit(out, &doc),
            None => anyhow::bail!("Document '{}' not found", id),
        },
        Commands::Delete { id } => {
            let deleted = db.store().delete(&id).await?;
            emit(out, &json!({ "id": id, "deleted": deleted }))
        }
        Commands::Import { dir, user } => {
            let report = sync::import_dir(&db, &dir, user.as_deref()).await?;
            emit(out, &report)
        }
        Commands::Workouts { from, to } => {
            let workouts = match (from, to) {
                (Some(from), Some(to)) => db.get_workouts_by_date_range(from, to).await?,
                (None, None) => db.get_all_workouts().await?,
                _ => anyhow::bail!("--from and --to must be given together"),
            };
            emit(out, &workouts)
        }
        Commands::Progression { template } => {
            let workouts = db.get_workout_progression(&template).await?;
            emit(out, &workouts)
        }
        Commands::Stats { from, to } => {
            let stats = db.get_workout_stats(from, to).await?;
            emit(out, &stats)
        }
        Commands::Exercises {
            user,
            muscle_group,
            no_custom,
        } => {
            let exercises = match muscle_group {
                Some(group) => db.get_exercises_by_muscle_group(&group).await?,
                None => db.get_exercises(user.as_deref(), !no_custom).await?,
            };
            emit(out, &exercises)
        }
    }
}

fn emit<T: Serialize + ?Sized>(format: Format, value: &T) -> anyhow::Result<()> {
    let text = match format {
        Format::Json => serde_json::to_string_pretty(value)?,
        Format::Yaml => serde_yaml::to_string(value)?,
    };
    println!("{}", text.trim_end());
    Ok(())
}

fn show_status(db: &Database, config: &Config, out: Format) -> anyhow::Result<()> {
    emit(
        out,
        &json!({
            "backend": db.store().backend_kind().to_string(),
            "location": db.store().describe(),
            "database": config.database,
        }),
    )
}

async fn list_views(db: &Database, out: Format) -> anyhow::Result<()> {
    let created = schema::ensure_views(db.store()).await?;

    let designs: Vec<_> = schema::DESIGN_DOCS
        .iter()
        .map(|design| {
            json!({
                "design": design.id(),
                "views": design.views.iter().map(|v| v.name).collect::<Vec<_>>(),
                "created": created.contains(&design.name),
            })
        })
        .collect();
    emit(out, &designs)
}

/// Accepts RFC 3339 or a bare date (start of day)
fn parse_from(s: &str) -> Result<DateTime<Utc>, String> {
    parse_date(s, NaiveTime::MIN)
}

/// Accepts RFC 3339 or a bare date (end of day)
fn parse_to(s: &str) -> Result<DateTime<Utc>, String> {
    let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    parse_date(s, end_of_day)
}

fn parse_date(s: &str, time: NaiveTime) -> Result<DateTime<Utc>, String> {
    if let Some(ts) = timestamp::parse(s) {
        return Ok(ts);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|date| date.and_time(time).and_utc())
        .map_err(|_| format!("'{s}' is neither an RFC 3339 timestamp nor a YYYY-MM-DD date"))
}
