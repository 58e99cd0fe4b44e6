//! Session rows. Ids are opaque strings: client-supplied for live sessions,
//! generated UUIDs for importer-synthesized ones.

use chrono::Utc;
use sqlx::{Sqlite, Transaction};

use crate::domain::Session;
use crate::error::Result;

use super::Store;

type SessionRow = (
    String,
    Option<i64>,
    Option<String>,
    i64,
    Option<i64>,
    Option<String>,
    Option<String>,
);

fn map_session(row: SessionRow) -> Result<Session> {
    let (id, project_id, name, start_time, end_time, token_usage, summary) = row;
    Ok(Session {
        id,
        project_id,
        name,
        start_time,
        end_time,
        token_usage: token_usage.as_deref().map(serde_json::from_str).transpose()?,
        summary,
    })
}

const SESSION_COLUMNS: &str = "id, project_id, name, start_time, end_time, token_usage, summary";

/// Partial update for session metadata. `None` leaves the column untouched.
/// Closing a session is not a patch; that goes through the tracker so active
/// executions are abandoned in the same transaction.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub project_id: Option<i64>,
    pub name: Option<String>,
    pub summary: Option<String>,
    pub token_usage: Option<serde_json::Value>,
}

/// Listing row for recent activity: session plus event and active-execution
/// counts.
#[derive(Debug, Clone)]
pub struct SessionOverview {
    pub session: Session,
    pub event_count: i64,
    pub active_task_count: i64,
}

impl Store {
    pub async fn create_session(
        &self,
        id: &str,
        project_id: Option<i64>,
        name: Option<&str>,
    ) -> Result<Session> {
        let session = Session {
            id: id.to_string(),
            project_id,
            name: name.map(String::from),
            start_time: Utc::now().timestamp(),
            end_time: None,
            token_usage: None,
            summary: None,
        };
        let mut tx = self.pool.begin().await?;
        self.insert_session_tx(&mut tx, &session).await?;
        tx.commit().await?;
        Ok(session)
    }

    pub async fn insert_session_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        session: &Session,
    ) -> Result<()> {
        let token_usage = session
            .token_usage
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, project_id, name, start_time, end_time, token_usage, summary)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&session.id)
        .bind(session.project_id)
        .bind(&session.name)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(token_usage)
        .bind(&session.summary)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    pub async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_session).transpose()
    }

    pub async fn update_session(&self, id: &str, patch: &SessionPatch) -> Result<Option<Session>> {
        let Some(mut session) = self.get_session(id).await? else {
            return Ok(None);
        };

        if let Some(project_id) = patch.project_id {
            session.project_id = Some(project_id);
        }
        if let Some(ref name) = patch.name {
            session.name = Some(name.clone());
        }
        if let Some(ref summary) = patch.summary {
            session.summary = Some(summary.clone());
        }
        if let Some(ref token_usage) = patch.token_usage {
            session.token_usage = Some(token_usage.clone());
        }

        let token_usage = session
            .token_usage
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            UPDATE sessions
            SET project_id = $1, name = $2, summary = $3, token_usage = $4
            WHERE id = $5
            "#,
        )
        .bind(session.project_id)
        .bind(&session.name)
        .bind(&session.summary)
        .bind(token_usage)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(Some(session))
    }

    pub async fn set_session_end_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        id: &str,
        end_time: i64,
    ) -> Result<()> {
        sqlx::query("UPDATE sessions SET end_time = $1 WHERE id = $2")
            .bind(end_time)
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Recent sessions, newest first, with per-session event and active-task
    /// counts folded in via subqueries.
    pub async fn list_recent_sessions(
        &self,
        project_id: Option<i64>,
        active_only: bool,
        limit: i64,
    ) -> Result<Vec<SessionOverview>> {
        let query = format!(
            r#"
            SELECT {SESSION_COLUMNS},
                   COALESCE(ec.event_count, 0),
                   COALESCE(ac.active_task_count, 0)
            FROM sessions
            LEFT JOIN (
                SELECT session_id, COUNT(id) AS event_count
                FROM events GROUP BY session_id
            ) ec ON sessions.id = ec.session_id
            LEFT JOIN (
                SELECT session_id, COUNT(id) AS active_task_count
                FROM task_executions WHERE status = 'active' GROUP BY session_id
            ) ac ON sessions.id = ac.session_id
            WHERE ($1 IS NULL OR sessions.project_id = $1)
              AND ($2 = 0 OR sessions.end_time IS NULL)
            ORDER BY sessions.start_time DESC
            LIMIT $3
            "#
        );

        type OverviewRow = (
            String,
            Option<i64>,
            Option<String>,
            i64,
            Option<i64>,
            Option<String>,
            Option<String>,
            i64,
            i64,
        );

        let rows: Vec<OverviewRow> = sqlx::query_as(&query)
            .bind(project_id)
            .bind(if active_only { 1 } else { 0 })
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                let (id, project_id, name, start_time, end_time, token_usage, summary, events, active) =
                    row;
                let session =
                    map_session((id, project_id, name, start_time, end_time, token_usage, summary))?;
                Ok(SessionOverview {
                    session,
                    event_count: events,
                    active_task_count: active,
                })
            })
            .collect()
    }
}
