use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use flow_core::{DEFAULT_PAGE_LIMIT, Page};
use flow_import::{Dump, ImportReport, Importer, PopulateConfig, Populator};
use flow_sqlite::{CourseQuery, DATABASE_ENV, DatabaseConfig, Migrator, StoreError, Target};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rusqlite::Connection;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "flow")]
#[command(about = "Schema, bulk loading, and queries for the course review store")]
struct Cli {
    /// SQLite database file. Overrides FLOW_DATABASE.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Move the schema along the revision chain.
    Migrate(MigrateArgs),
    /// Load a document-store dump, replacing existing rows.
    Import(ImportArgs),
    /// Fill an empty store with synthetic data.
    Populate(PopulateArgs),
    /// Read courses and course reviews as JSON.
    Courses(CoursesArgs),
}

#[derive(Debug, Args)]
struct MigrateArgs {
    #[command(subcommand)]
    operation: MigrateOperation,
}

#[derive(Debug, Subcommand)]
enum MigrateOperation {
    /// Apply revisions up to TARGET.
    Upgrade {
        /// `head` or a revision id.
        #[arg(default_value = "head")]
        target: String,
    },
    /// Revert revisions newer than TARGET.
    Downgrade {
        /// `base` or a revision id.
        target: String,
    },
    /// Print the applied revision.
    Current,
    /// List every revision, oldest first.
    History,
    /// Show applied and pending revisions and table row counts.
    Status,
}

#[derive(Debug, Args)]
struct ImportArgs {
    /// Directory holding course.bson, professor.bson, user.bson and user_course.bson.
    dump_path: PathBuf,
}

#[derive(Debug, Args)]
struct PopulateArgs {
    /// YAML file with row counts.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Seed for reproducible output.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    courses: Option<usize>,
    #[arg(long)]
    profs: Option<usize>,
    #[arg(long)]
    users: Option<usize>,
    #[arg(long)]
    course_reviews: Option<usize>,
    #[arg(long)]
    prof_reviews: Option<usize>,
    #[arg(long)]
    course_review_votes: Option<usize>,
    #[arg(long)]
    prof_review_votes: Option<usize>,
}

#[derive(Debug, Args)]
struct CoursesArgs {
    #[command(subcommand)]
    operation: CoursesOperation,
}

#[derive(Debug, Args)]
struct PageArgs {
    /// Maximum number of rows to return.
    #[arg(long, default_value_t = DEFAULT_PAGE_LIMIT)]
    limit: u32,
    /// Number of rows to skip.
    #[arg(long, default_value_t = 0)]
    offset: u32,
}

impl From<PageArgs> for Page {
    fn from(args: PageArgs) -> Self {
        Page::new(args.limit, args.offset)
    }
}

#[derive(Debug, Subcommand)]
enum CoursesOperation {
    /// List courses in id order.
    List(PageArgs),
    /// Fetch one course by code.
    Get { code: String },
    /// Fetch courses by a comma-separated id list.
    Ids { ids: String },
    /// List the reviews of one course.
    Reviews {
        code: String,
        #[command(flatten)]
        page: PageArgs,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Command::Migrate(args) => run_migrate(cli.db, args),
        Command::Import(args) => run_import(cli.db, args),
        Command::Populate(args) => run_populate(cli.db, args),
        Command::Courses(args) => run_courses(cli.db, args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

// ---------------------------------------------------------------------------
// migrate command
// ---------------------------------------------------------------------------

fn run_migrate(db: Option<PathBuf>, args: MigrateArgs) -> Result<(), String> {
    let conn = open_database(db)?;
    let mut migrator =
        Migrator::new(conn).map_err(|e| format!("Failed to initialize migrator: {e}"))?;

    match args.operation {
        MigrateOperation::Upgrade { target } => {
            let target: Target = target.parse().map_err(|e: StoreError| e.to_string())?;
            let applied = migrator
                .upgrade(&target)
                .map_err(|e| format!("Upgrade failed: {e}"))?;
            if applied.is_empty() {
                println!("Already at {target}.");
            }
            for id in applied {
                println!("Applied {id}");
            }
        }
        MigrateOperation::Downgrade { target } => {
            let target: Target = target.parse().map_err(|e: StoreError| e.to_string())?;
            let reverted = migrator
                .downgrade(&target)
                .map_err(|e| format!("Downgrade failed: {e}"))?;
            if reverted.is_empty() {
                println!("Nothing to revert.");
            }
            for id in reverted {
                println!("Reverted {id}");
            }
        }
        MigrateOperation::Current => match migrator.current().map_err(|e| e.to_string())? {
            Some(applied) => println!("{} (applied {})", applied.id, applied.applied_at),
            None => println!("base"),
        },
        MigrateOperation::History => {
            let current = migrator.current().map_err(|e| e.to_string())?;
            for revision in migrator.history() {
                let marker = match &current {
                    Some(applied) if applied.id == revision.id => " (current)",
                    _ => "",
                };
                println!(
                    "{} -> {}, {}{marker}",
                    revision.parent.unwrap_or("<base>"),
                    revision.id,
                    revision.message
                );
            }
        }
        MigrateOperation::Status => {
            let status = migrator
                .status()
                .map_err(|e| format!("Failed to get migration status: {e}"))?;
            println!("Migration Status:");
            match &status.current {
                Some(applied) => println!("  Current: {}", applied.id),
                None => println!("  Current: base"),
            }
            println!("  Head: {}", status.head);
            println!("  Pending: {}", status.pending.len());
            for (table, rows) in &status.row_counts {
                println!("  {} rows: {rows}", table.name());
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// import command
// ---------------------------------------------------------------------------

fn run_import(db: Option<PathBuf>, args: ImportArgs) -> Result<(), String> {
    // The dump is checked before the store is opened.
    let dump = Dump::open(&args.dump_path).map_err(|e| e.to_string())?;
    let conn = open_database(db)?;

    let mut importer = Importer::new(conn, dump).map_err(|e| e.to_string())?;
    let report = importer
        .run()
        .map_err(|e| format!("Import failed: {e}"))?;
    print_import_report(&report);
    Ok(())
}

fn print_import_report(report: &ImportReport) {
    println!("Import complete:");
    for stage in &report.stages {
        println!(
            "  {}: {} rows ({} unresolved references)",
            stage.stage.name(),
            stage.rows,
            stage.unresolved
        );
    }
}

// ---------------------------------------------------------------------------
// populate command
// ---------------------------------------------------------------------------

fn run_populate(db: Option<PathBuf>, args: PopulateArgs) -> Result<(), String> {
    let mut config = match &args.config {
        Some(path) => PopulateConfig::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display()))?,
        None => PopulateConfig::default(),
    };
    apply_overrides(&mut config, &args);

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let conn = open_database(db)?;
    let mut populator = Populator::new(conn, config, rng).map_err(|e| e.to_string())?;
    let report = populator
        .run()
        .map_err(|e| format!("Populate failed: {e}"))?;

    println!("Populate complete:");
    println!("  Courses: {}", report.courses);
    println!("  Profs: {}", report.profs);
    println!("  Users: {}", report.users);
    println!("  Course reviews: {}", report.course_reviews);
    println!("  Prof reviews: {}", report.prof_reviews);
    println!("  Course review votes: {}", report.course_review_votes);
    println!("  Prof review votes: {}", report.prof_review_votes);
    Ok(())
}

fn apply_overrides(config: &mut PopulateConfig, args: &PopulateArgs) {
    let overrides = [
        (&mut config.courses, args.courses),
        (&mut config.profs, args.profs),
        (&mut config.users, args.users),
        (&mut config.course_reviews, args.course_reviews),
        (&mut config.prof_reviews, args.prof_reviews),
        (&mut config.course_review_votes, args.course_review_votes),
        (&mut config.prof_review_votes, args.prof_review_votes),
    ];
    for (field, value) in overrides {
        if let Some(value) = value {
            *field = value;
        }
    }
}

// ---------------------------------------------------------------------------
// courses command
// ---------------------------------------------------------------------------

fn run_courses(db: Option<PathBuf>, args: CoursesArgs) -> Result<(), String> {
    let conn = open_database(db)?;
    let query = CourseQuery::new(&conn);

    match args.operation {
        CoursesOperation::List(page) => print_json(&query.list_courses(page.into())),
        CoursesOperation::Get { code } => print_json(&query.course_by_code(&code)),
        CoursesOperation::Ids { ids } => print_json(&query.courses_by_ids(&ids)),
        CoursesOperation::Reviews { code, page } => {
            print_json(&query.course_reviews_by_code(&code, page.into()))
        }
    }
}

/// Prints a lookup result as JSON, or its error with the HTTP status an API
/// would answer with.
fn print_json<T: Serialize>(result: &Result<T, StoreError>) -> Result<(), String> {
    match result {
        Ok(value) => {
            let json = serde_json::to_string_pretty(value)
                .map_err(|e| format!("Failed to serialize: {e}"))?;
            println!("{json}");
            Ok(())
        }
        Err(err) => Err(format!("[{}] {err}", err.status_code())),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Opens the store named by `--db`, falling back to the environment.
fn open_database(db: Option<PathBuf>) -> Result<Connection, String> {
    let config = DatabaseConfig::from_lookup(|key| match (key, &db) {
        (DATABASE_ENV, Some(path)) => Some(path.display().to_string()),
        _ => std::env::var(key).ok(),
    })
    .map_err(|e| format!("{e} (pass --db or set {DATABASE_ENV})"))?;
    config
        .open()
        .map_err(|e| format!("Failed to open database '{}': {e}", config.path.display()))
}
