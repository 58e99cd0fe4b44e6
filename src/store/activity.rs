//! Append-only activity data: events, file changes, daily aggregates.

use std::collections::HashSet;

use sqlx::{Sqlite, Transaction};

use crate::domain::{ChangeType, DailyStats, Event, FileChange};
use crate::error::Result;

use super::Store;

impl Store {
    pub async fn insert_event_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        session_id: &str,
        event_type: &str,
        timestamp: i64,
        payload: Option<&serde_json::Value>,
    ) -> Result<()> {
        let payload = payload.map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO events (session_id, event_type, timestamp, payload)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(session_id)
        .bind(event_type)
        .bind(timestamp)
        .bind(payload)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    pub async fn insert_file_change_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        session_id: &str,
        file_path: &str,
        change_type: ChangeType,
        lines_added: i64,
        lines_removed: i64,
        timestamp: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO file_changes (session_id, file_path, change_type, lines_added, lines_removed, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(session_id)
        .bind(file_path)
        .bind(change_type.as_str())
        .bind(lines_added)
        .bind(lines_removed)
        .bind(timestamp)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Additive upsert keyed on (project_id, date); re-imports fold new
    /// counts into the existing row.
    pub async fn upsert_daily_stats_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        project_id: i64,
        date: &str,
        tasks_completed: i64,
        session_count: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO daily_stats (project_id, date, tasks_completed, session_count)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT(project_id, date) DO UPDATE SET
                tasks_completed = tasks_completed + excluded.tasks_completed,
                session_count = session_count + excluded.session_count
            "#,
        )
        .bind(project_id)
        .bind(date)
        .bind(tasks_completed)
        .bind(session_count)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Abbreviated hashes of commit events already recorded for a project.
    /// The importer drops commits found here, which makes re-imports no-ops.
    pub async fn commit_hashes_for_project(&self, project_id: i64) -> Result<HashSet<String>> {
        let rows: Vec<(Option<String>,)> = sqlx::query_as(
            r#"
            SELECT json_extract(events.payload, '$.hash')
            FROM events
            JOIN sessions ON events.session_id = sessions.id
            WHERE sessions.project_id = $1 AND events.event_type = 'commit'
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(|(hash,)| hash).collect())
    }

    pub async fn events_for_session(&self, session_id: &str) -> Result<Vec<Event>> {
        let rows: Vec<(i64, String, String, i64, Option<String>)> = sqlx::query_as(
            r#"
            SELECT id, session_id, event_type, timestamp, payload
            FROM events WHERE session_id = $1 ORDER BY timestamp, id
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, session_id, event_type, timestamp, payload)| {
                Ok(Event {
                    id,
                    session_id,
                    event_type,
                    timestamp,
                    payload: payload.as_deref().map(serde_json::from_str).transpose()?,
                })
            })
            .collect()
    }

    pub async fn file_changes_for_session(&self, session_id: &str) -> Result<Vec<FileChange>> {
        let rows: Vec<(i64, String, String, String, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT id, session_id, file_path, change_type, lines_added, lines_removed, timestamp
            FROM file_changes WHERE session_id = $1 ORDER BY timestamp, id
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(
                |(id, session_id, file_path, change_type, lines_added, lines_removed, timestamp)| {
                    Ok(FileChange {
                        id,
                        session_id,
                        file_path,
                        change_type: change_type.parse()?,
                        lines_added,
                        lines_removed,
                        timestamp,
                    })
                },
            )
            .collect()
    }

    pub async fn daily_stats_for_project(&self, project_id: i64) -> Result<Vec<DailyStats>> {
        let rows: Vec<(i64, Option<i64>, String, i64, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT id, project_id, date, tasks_completed, tokens_used, session_count, agent_calls
            FROM daily_stats WHERE project_id = $1 ORDER BY date
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, project_id, date, tasks_completed, tokens_used, session_count, agent_calls)| {
                    DailyStats {
                        id,
                        project_id,
                        date,
                        tasks_completed,
                        tokens_used,
                        session_count,
                        agent_calls,
                    }
                },
            )
            .collect())
    }
}
