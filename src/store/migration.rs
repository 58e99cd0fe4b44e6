//! SQLite schema management. Every statement is idempotent; run at startup.

use sqlx::{Executor, SqlitePool};

use crate::error::Result;

const CREATE_PROJECTS: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'active',
    path TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

const CREATE_MILESTONES: &str = r#"
CREATE TABLE IF NOT EXISTS milestones (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT,
    due_date INTEGER,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at INTEGER NOT NULL
);
"#;

const CREATE_TASKS: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    milestone_id INTEGER REFERENCES milestones(id) ON DELETE SET NULL,
    title TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'todo',
    priority TEXT NOT NULL DEFAULT 'medium',
    sort_order REAL NOT NULL DEFAULT 0,
    due_date INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

const CREATE_SESSIONS: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    project_id INTEGER REFERENCES projects(id) ON DELETE SET NULL,
    name TEXT,
    start_time INTEGER NOT NULL,
    end_time INTEGER,
    token_usage TEXT,
    summary TEXT
);
"#;

const CREATE_TASK_EXECUTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS task_executions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    started_at INTEGER NOT NULL,
    stopped_at INTEGER,
    status TEXT NOT NULL DEFAULT 'active',
    notes TEXT
);
"#;

const CREATE_EVENTS: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    event_type TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    payload TEXT
);
"#;

const CREATE_FILE_CHANGES: &str = r#"
CREATE TABLE IF NOT EXISTS file_changes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    file_path TEXT NOT NULL,
    change_type TEXT NOT NULL,
    lines_added INTEGER NOT NULL DEFAULT 0,
    lines_removed INTEGER NOT NULL DEFAULT 0,
    timestamp INTEGER NOT NULL
);
"#;

const CREATE_DAILY_STATS: &str = r#"
CREATE TABLE IF NOT EXISTS daily_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER REFERENCES projects(id) ON DELETE CASCADE,
    date TEXT NOT NULL,
    tasks_completed INTEGER NOT NULL DEFAULT 0,
    tokens_used INTEGER NOT NULL DEFAULT 0,
    session_count INTEGER NOT NULL DEFAULT 0,
    agent_calls INTEGER NOT NULL DEFAULT 0
);
"#;

// The partial unique index on active executions is the hard guarantee behind
// the one-active-execution-per-task invariant; the tracker's transactional
// check is the friendly error path in front of it.
const CREATE_INDICES: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_projects_path ON projects(path) WHERE path IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS idx_executions_active ON task_executions(task_id) WHERE status = 'active';
CREATE UNIQUE INDEX IF NOT EXISTS idx_daily_stats_project_date ON daily_stats(project_id, date);
CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
CREATE INDEX IF NOT EXISTS idx_sessions_project ON sessions(project_id);
CREATE INDEX IF NOT EXISTS idx_executions_task ON task_executions(task_id);
CREATE INDEX IF NOT EXISTS idx_executions_session ON task_executions(session_id);
CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id);
CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type);
CREATE INDEX IF NOT EXISTS idx_file_changes_session ON file_changes(session_id);
"#;

/// Run all migrations. Safe to call at every startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    pool.execute(CREATE_PROJECTS).await?;
    pool.execute(CREATE_MILESTONES).await?;
    pool.execute(CREATE_TASKS).await?;
    pool.execute(CREATE_SESSIONS).await?;
    pool.execute(CREATE_TASK_EXECUTIONS).await?;
    pool.execute(CREATE_EVENTS).await?;
    pool.execute(CREATE_FILE_CHANGES).await?;
    pool.execute(CREATE_DAILY_STATS).await?;
    pool.execute(CREATE_INDICES).await?;
    Ok(())
}
