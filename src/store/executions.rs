//! Task-execution rows: one row per continuous interval of work.

use sqlx::{Sqlite, Transaction};

use crate::domain::{ExecutionStatus, TaskExecution};
use crate::error::Result;

use super::Store;

type ExecutionRow = (
    i64,
    i64,
    String,
    i64,
    Option<i64>,
    String,
    Option<String>,
);

fn map_execution(row: ExecutionRow) -> Result<TaskExecution> {
    let (id, task_id, session_id, started_at, stopped_at, status, notes) = row;
    Ok(TaskExecution {
        id,
        task_id,
        session_id,
        started_at,
        stopped_at,
        status: status.parse()?,
        notes,
    })
}

const EXECUTION_COLUMNS: &str =
    "id, task_id, session_id, started_at, stopped_at, status, notes";

impl Store {
    /// The active execution for a task, regardless of session.
    pub async fn active_execution_for_task_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        task_id: i64,
    ) -> Result<Option<TaskExecution>> {
        let row: Option<ExecutionRow> = sqlx::query_as(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM task_executions WHERE task_id = $1 AND status = 'active'"
        ))
        .bind(task_id)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(map_execution).transpose()
    }

    /// The active execution for exactly this (task, session) pair.
    pub async fn active_execution_for_pair_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        task_id: i64,
        session_id: &str,
    ) -> Result<Option<TaskExecution>> {
        let row: Option<ExecutionRow> = sqlx::query_as(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM task_executions \
             WHERE task_id = $1 AND session_id = $2 AND status = 'active'"
        ))
        .bind(task_id)
        .bind(session_id)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(map_execution).transpose()
    }

    pub async fn insert_execution_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        task_id: i64,
        session_id: &str,
        started_at: i64,
        notes: Option<&str>,
    ) -> Result<TaskExecution> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO task_executions (task_id, session_id, started_at, status, notes)
            VALUES ($1, $2, $3, 'active', $4)
            RETURNING id
            "#,
        )
        .bind(task_id)
        .bind(session_id)
        .bind(started_at)
        .bind(notes)
        .fetch_one(&mut **tx)
        .await?;

        Ok(TaskExecution {
            id,
            task_id,
            session_id: session_id.to_string(),
            started_at,
            stopped_at: None,
            status: ExecutionStatus::Active,
            notes: notes.map(String::from),
        })
    }

    /// Terminal transition: set the final status and stopped_at, optionally
    /// overwriting notes.
    pub async fn finish_execution_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        execution_id: i64,
        status: ExecutionStatus,
        stopped_at: i64,
        notes: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE task_executions
            SET status = $1, stopped_at = $2, notes = COALESCE($3, notes)
            WHERE id = $4
            "#,
        )
        .bind(status.as_str())
        .bind(stopped_at)
        .bind(notes)
        .bind(execution_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// All executions still active in a session; the tracker abandons these
    /// when the session closes.
    pub async fn active_executions_for_session_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        session_id: &str,
    ) -> Result<Vec<TaskExecution>> {
        let rows: Vec<ExecutionRow> = sqlx::query_as(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM task_executions \
             WHERE session_id = $1 AND status = 'active'"
        ))
        .bind(session_id)
        .fetch_all(&mut **tx)
        .await?;

        rows.into_iter().map(map_execution).collect()
    }

    pub async fn executions_for_task(&self, task_id: i64) -> Result<Vec<TaskExecution>> {
        let rows: Vec<ExecutionRow> = sqlx::query_as(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM task_executions \
             WHERE task_id = $1 ORDER BY started_at DESC, id DESC"
        ))
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(map_execution).collect()
    }

    pub async fn executions_for_session(&self, session_id: &str) -> Result<Vec<TaskExecution>> {
        let rows: Vec<ExecutionRow> = sqlx::query_as(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM task_executions \
             WHERE session_id = $1 ORDER BY started_at DESC, id DESC"
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(map_execution).collect()
    }
}
