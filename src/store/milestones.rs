//! Milestone rows. The importer materializes one per git tag.

use chrono::Utc;
use sqlx::{Sqlite, Transaction};

use crate::domain::{Milestone, MilestoneStatus};
use crate::error::Result;

use super::Store;

impl Store {
    pub async fn insert_milestone_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        project_id: i64,
        title: &str,
        due_date: Option<i64>,
        status: MilestoneStatus,
    ) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO milestones (project_id, title, due_date, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(project_id)
        .bind(title)
        .bind(due_date)
        .bind(status.as_str())
        .bind(Utc::now().timestamp())
        .fetch_one(&mut **tx)
        .await?;

        Ok(id)
    }

    /// Titles already present for a project; used to keep tag import
    /// idempotent.
    pub async fn milestone_titles(&self, project_id: i64) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT title FROM milestones WHERE project_id = $1")
                .bind(project_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(title,)| title).collect())
    }

    pub async fn milestones_for_project(&self, project_id: i64) -> Result<Vec<Milestone>> {
        let rows: Vec<(i64, i64, String, Option<String>, Option<i64>, String, i64)> =
            sqlx::query_as(
                r#"
                SELECT id, project_id, title, description, due_date, status, created_at
                FROM milestones WHERE project_id = $1 ORDER BY created_at, id
                "#,
            )
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(
                |(id, project_id, title, description, due_date, status, created_at)| {
                    Ok(Milestone {
                        id,
                        project_id,
                        title,
                        description,
                        due_date,
                        status: status.parse()?,
                        created_at,
                    })
                },
            )
            .collect()
    }
}
