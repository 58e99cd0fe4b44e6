//! Project rows. `path` doubles as the natural key for import idempotency.

use chrono::Utc;

use crate::domain::{Project, ProjectStatus};
use crate::error::Result;

use super::Store;

type ProjectRow = (
    i64,
    String,
    Option<String>,
    String,
    Option<String>,
    i64,
    i64,
);

fn map_project(row: ProjectRow) -> Result<Project> {
    let (id, name, description, status, path, created_at, updated_at) = row;
    Ok(Project {
        id,
        name,
        description,
        status: status.parse()?,
        path,
        created_at,
        updated_at,
    })
}

const PROJECT_COLUMNS: &str = "id, name, description, status, path, created_at, updated_at";

impl Store {
    pub async fn create_project(
        &self,
        name: &str,
        description: Option<&str>,
        status: ProjectStatus,
        path: Option<&str>,
    ) -> Result<Project> {
        let now = Utc::now().timestamp();

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO projects (name, description, status, path, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(status.as_str())
        .bind(path)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(Project {
            id,
            name: name.to_string(),
            description: description.map(String::from),
            status,
            path: path.map(String::from),
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_project(&self, id: i64) -> Result<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_project).transpose()
    }

    pub async fn find_project_by_path(&self, path: &str) -> Result<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE path = $1"
        ))
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_project).transpose()
    }

    pub async fn count_projects(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
