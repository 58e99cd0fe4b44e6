use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use devboard::config::CONFIG;
use devboard::importer::ImportRequest;
use devboard::{Broadcaster, GitImporter, Store};

#[derive(Parser)]
#[command(name = "devboard", version, about = "Project activity dashboard backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or upgrade the database schema.
    Migrate,
    /// Import a repository's git history: sessions per day, commit events,
    /// file changes, tag milestones, daily stats.
    Import {
        /// Path to the git repository.
        #[arg(long)]
        path: PathBuf,
        /// Project display name (defaults to the directory name).
        #[arg(long)]
        name: Option<String>,
        /// Maximum number of commits to import.
        #[arg(long)]
        max_commits: Option<usize>,
        /// Only import commits since this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<NaiveDate>,
    },
    /// List recent sessions with event and active-task counts.
    Sessions {
        /// Restrict to one project.
        #[arg(long)]
        project: Option<i64>,
        /// Only sessions that are still open.
        #[arg(long)]
        active_only: bool,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level: Level = CONFIG.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let pool = devboard::store::connect(&CONFIG.database_url, CONFIG.sqlite_max_connections).await?;
    devboard::store::run_migrations(&pool).await?;
    let store = Store::new(pool);

    match cli.command {
        Command::Migrate => {
            info!(database_url = %CONFIG.database_url, "schema is up to date");
        }
        Command::Import {
            path,
            name,
            max_commits,
            since,
        } => {
            let broadcaster = Broadcaster::new(CONFIG.broadcast_capacity);
            let importer = GitImporter::from_config(store, &CONFIG);

            let summary = importer
                .import(ImportRequest {
                    path,
                    name,
                    max_commits: max_commits.unwrap_or(CONFIG.import_max_commits),
                    since,
                })
                .await?;
            broadcaster.dispatch(&summary.to_events());

            println!("Project #{} imported from git history", summary.project_id);
            println!("  Commits:      {}", summary.commits);
            println!("  Sessions:     {} (grouped by date)", summary.sessions);
            println!("  Events:       {}", summary.events);
            println!("  File changes: {}", summary.file_changes);
            println!("  Milestones:   {} (from tags)", summary.milestones);
            println!("  Daily stats:  {}", summary.daily_stats);
        }
        Command::Sessions {
            project,
            active_only,
            limit,
        } => {
            let sessions = store.list_recent_sessions(project, active_only, limit).await?;
            for overview in sessions {
                let session = &overview.session;
                let state = if session.end_time.is_none() { "open" } else { "closed" };
                println!(
                    "{}  {:6}  events={:4}  active_tasks={}  {}",
                    session.id,
                    state,
                    overview.event_count,
                    overview.active_task_count,
                    session.summary.as_deref().unwrap_or("-"),
                );
            }
        }
    }

    Ok(())
}
