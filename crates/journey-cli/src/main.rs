//! Relocation journey command line
//!
//! Loads the journey configuration once and answers queries against it.
//!
//! # Usage
//!
//! ```bash
//! # Check the shipped configuration
//! journey validate
//!
//! # Which phase is someone in, ten days after arriving?
//! journey phase --arrival 2026-03-01 --today 2026-03-11
//!
//! # Task list for a user in Berlin, in Turkish
//! journey tasks --user ayse --city berlin --locale tr
//!
//! # Record progress (validated, then settled and saved)
//! journey update --user ayse --task open-bank-account provider choose_bank n26
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use journey_core::phase::arrival_start;
use journey_core::{
    ConfigLoader, FileProgressStore, Journey, JourneyView, PhaseBucket, ProgressStore,
    ProgressUpdate, TaskStatus, UserContext, UserProgress,
};

#[derive(Parser)]
#[command(name = "journey")]
#[command(version)]
#[command(about = "Task graph and journey phase engine for relocating to Germany")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config directory (journey.json, platforms.json, locales/)
    #[arg(long, global = true, env = "JOURNEY_CONFIG_DIR")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,

    /// Directory holding per-user progress files
    #[arg(
        long,
        global = true,
        env = "JOURNEY_PROGRESS_DIR",
        default_value = ".journey/progress"
    )]
    progress_dir: PathBuf,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the configuration
    Validate,

    /// Print tasks in dependency order
    Order {
        /// Only tasks that apply to this city
        #[arg(long)]
        city: Option<String>,
    },

    /// Resolve the journey phase for an arrival date
    Phase {
        /// Arrival date (YYYY-MM-DD); omit for someone not yet arrived
        #[arg(long)]
        arrival: Option<NaiveDate>,

        /// Evaluate as of this date instead of today
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Show the task list for a user
    Tasks {
        /// Load saved progress for this user
        #[arg(long)]
        user: Option<String>,

        #[arg(long)]
        city: Option<String>,

        #[arg(long)]
        locale: Option<String>,

        /// Arrival date (YYYY-MM-DD); overrides the saved one
        #[arg(long)]
        arrival: Option<NaiveDate>,

        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Resolve a translation key
    Translate {
        /// Dotted key, e.g. tasks.open-bank-account.title
        key: String,

        #[arg(long, default_value = "en")]
        locale: String,
    },

    /// Record progress for a user
    Update {
        #[arg(long)]
        user: String,

        #[arg(long)]
        task: String,

        #[command(subcommand)]
        action: UpdateAction,
    },
}

#[derive(Subcommand)]
enum UpdateAction {
    /// Flip a simple subtask
    Toggle { subtask: String },

    /// Set a form field; the value is parsed as JSON when possible
    Field {
        subtask: String,
        field: String,
        value: String,
    },

    /// Mark a provider of an external-action subtask
    Provider {
        subtask: String,
        provider: String,

        /// Clear the mark instead of setting it
        #[arg(long)]
        undo: bool,
    },

    /// Mark the whole task done
    Done {
        #[arg(long)]
        undo: bool,
    },

    /// Replace the task notes (empty clears them)
    Notes { text: String },

    /// Mark a checklist document as collected
    Document {
        document: String,

        /// Clear the mark instead of setting it
        #[arg(long)]
        undo: bool,
    },
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("journey=info,journey_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = cli.format;

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if format == OutputFormat::Json {
                let body = serde_json::json!({ "error": format!("{:#}", e) });
                println!("{}", body);
            } else {
                eprintln!("{}: {:#}", "error".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let loader = match &cli.config {
        Some(dir) => ConfigLoader::new(dir),
        None => ConfigLoader::from_env(),
    };
    let journey = loader
        .load()
        .with_context(|| format!("loading configuration from {}", loader.config_dir().display()))?;
    let store = FileProgressStore::new(&cli.progress_dir);

    match cli.command {
        Commands::Validate => cmd_validate(&journey, cli.format),
        Commands::Order { city } => cmd_order(&journey, city.as_deref(), cli.format),
        Commands::Phase { arrival, today } => cmd_phase(&journey, arrival, today, cli.format),
        Commands::Tasks {
            user,
            city,
            locale,
            arrival,
            today,
        } => {
            let mut progress = match &user {
                Some(user) => store.load(user).await?.unwrap_or_default(),
                None => UserProgress::default(),
            };
            if city.is_some() {
                progress.selected_city = city;
            }
            if locale.is_some() {
                progress.locale = locale;
            }
            if arrival.is_some() {
                progress.arrival_date = arrival;
            }
            cmd_tasks(&journey, &progress, today, cli.format)
        }
        Commands::Translate { key, locale } => {
            let text = journey.translate(&key, &locale);
            emit(cli.format, &serde_json::json!({ "key": key, "locale": locale, "text": text }), || {
                println!("{}", text);
            })
        }
        Commands::Update { user, task, action } => {
            cmd_update(&journey, &store, &user, task, action, cli.format).await
        }
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

fn emit<T: Serialize>(format: OutputFormat, value: &T, pretty: impl FnOnce()) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(value).context("serializing output")?
            );
        }
        OutputFormat::Pretty => pretty(),
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateReport {
    tasks: usize,
    cities: usize,
    phases: Vec<String>,
    locales: Vec<String>,
    warnings: Vec<String>,
    fingerprint: String,
}

fn cmd_validate(journey: &Journey, format: OutputFormat) -> Result<()> {
    let report = ValidateReport {
        tasks: journey.graph().len(),
        cities: journey.catalog().cities().len(),
        phases: journey
            .catalog()
            .phases_ordered()
            .iter()
            .map(|p| p.id.clone())
            .collect(),
        locales: journey
            .locales()
            .locales()
            .into_iter()
            .map(str::to_string)
            .collect(),
        warnings: journey
            .config()
            .warnings()
            .iter()
            .map(|w| w.to_string())
            .collect(),
        fingerprint: journey.config().fingerprint().to_string(),
    };

    emit(format, &report, || {
        println!(
            "{} {} tasks, {} cities, phases [{}], locales [{}]",
            "OK".green(),
            report.tasks,
            report.cities,
            report.phases.join(", "),
            report.locales.join(", ")
        );
        for warning in &report.warnings {
            println!("  {} {}", "warning".yellow(), warning);
        }
        println!("  fingerprint {}", report.fingerprint.dimmed());
    })
}

fn cmd_order(journey: &Journey, city: Option<&str>, format: OutputFormat) -> Result<()> {
    let tasks = match city {
        Some(city) => journey.config().visible_for(city)?,
        None => journey.config().topological_order(),
    };
    let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();

    emit(format, &ids, || {
        for (i, task) in tasks.iter().enumerate() {
            let deps = if task.dependencies.is_empty() {
                String::new()
            } else {
                format!(" <- {}", task.dependencies.join(", "))
            };
            println!(
                "{:>3}. {} [{}]{}",
                i + 1,
                task.id.bold(),
                task.time_window,
                deps.dimmed()
            );
        }
    })
}

fn now_for(today: Option<NaiveDate>) -> chrono::DateTime<Utc> {
    arrival_start(today.unwrap_or_else(|| Utc::now().date_naive()))
}

fn cmd_phase(
    journey: &Journey,
    arrival: Option<NaiveDate>,
    today: Option<NaiveDate>,
    format: OutputFormat,
) -> Result<()> {
    let ctx = UserContext::new(None, None, arrival.map(arrival_start), now_for(today));
    let phase = journey.current_phase(&ctx);

    emit(format, phase, || {
        println!("{} ({}) ordinal {}", phase.id.bold(), phase.label, phase.ordinal);
    })
}

fn cmd_tasks(
    journey: &Journey,
    progress: &UserProgress,
    today: Option<NaiveDate>,
    format: OutputFormat,
) -> Result<()> {
    let ctx = UserContext::from_progress(progress, now_for(today));
    let view = journey.task_list(&ctx, progress)?;
    emit(format, &view, || print_view(&view))
}

fn print_view(view: &JourneyView) {
    println!(
        "{} {}  ({}/{} done, locale {})",
        "Current phase:".bold(),
        view.current_phase.label,
        view.completed,
        view.total,
        view.locale
    );
    for task in &view.tasks {
        let marker = match (task.status, task.locked) {
            (TaskStatus::Done, _) => "[x]".green(),
            (_, true) => "[-]".red(),
            (TaskStatus::InProgress, _) => "[~]".yellow(),
            (TaskStatus::Todo, _) => "[ ]".normal(),
        };
        let title = match task.bucket {
            PhaseBucket::Current => task.title.bold(),
            PhaseBucket::Past => task.title.normal(),
            PhaseBucket::Future => task.title.dimmed(),
        };
        println!("{} {} {}", marker, title, format!("({})", task.id).dimmed());
        if task.locked {
            println!("      blocked by {}", task.blocked_by.join(", "));
        }
        for subtask in &task.subtasks {
            let check = if subtask.complete { "x" } else { " " };
            let required = if subtask.required { "" } else { " (optional)" };
            println!("      [{}] {}{}", check, subtask.title, required.dimmed());
        }
        for document in &task.documents {
            let check = if document.collected { "x" } else { " " };
            let optional = if document.optional { " (optional)" } else { "" };
            println!("      {} [{}] {}{}", "doc".cyan(), check, document.label, optional.dimmed());
        }
    }
}

async fn cmd_update(
    journey: &Journey,
    store: &FileProgressStore,
    user: &str,
    task_id: String,
    action: UpdateAction,
    format: OutputFormat,
) -> Result<()> {
    let update = match action {
        UpdateAction::Toggle { subtask } => ProgressUpdate::ToggleSubtask {
            task_id,
            subtask_id: subtask,
        },
        UpdateAction::Field {
            subtask,
            field,
            value,
        } => ProgressUpdate::SetCriteriaField {
            task_id,
            subtask_id: subtask,
            criteria_key: String::new(),
            field,
            value: serde_json::from_str(&value).unwrap_or(Value::String(value)),
        },
        UpdateAction::Provider {
            subtask,
            provider,
            undo,
        } => ProgressUpdate::MarkProvider {
            task_id,
            subtask_id: subtask,
            action_type: String::new(),
            provider_id: provider,
            done: !undo,
        },
        UpdateAction::Done { undo } => ProgressUpdate::SetTaskDone {
            task_id,
            done: !undo,
        },
        UpdateAction::Notes { text } => ProgressUpdate::SetNotes {
            task_id,
            notes: text,
        },
        UpdateAction::Document { document, undo } => ProgressUpdate::MarkDocument {
            task_id,
            document_id: document,
            collected: !undo,
        },
    };

    let mut progress = store
        .load(user)
        .await
        .with_context(|| format!("loading progress for '{}'", user))?
        .unwrap_or_default();
    let settled = journey.apply_update(&mut progress, update)?;
    store
        .save(user, &progress)
        .await
        .with_context(|| format!("saving progress for '{}'", user))?;
    tracing::info!(user, settled = settled.len(), "progress updated");

    emit(
        format,
        &serde_json::json!({ "user": user, "settled": settled }),
        || {
            println!("{} progress saved for {}", "OK".green(), user);
            for id in &settled {
                println!("  {} {}", "completed".green(), id);
            }
        },
    )
}
