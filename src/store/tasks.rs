//! Task rows.
//!
//! Partial updates go through [`TaskPatch`]: an explicit optional-field
//! struct merged field by field, so every updatable column is visible in one
//! place. Execution-driven status changes bypass the patch path and use
//! [`Store::set_task_status_tx`] inside the tracker's transaction.

use chrono::Utc;
use sqlx::{Sqlite, Transaction};

use crate::domain::{Priority, Task, TaskStatus};
use crate::error::Result;

use super::Store;

type TaskRow = (
    i64,
    i64,
    Option<i64>,
    String,
    Option<String>,
    String,
    String,
    f64,
    Option<i64>,
    i64,
    i64,
);

fn map_task(row: TaskRow) -> Result<Task> {
    let (
        id,
        project_id,
        milestone_id,
        title,
        description,
        status,
        priority,
        sort_order,
        due_date,
        created_at,
        updated_at,
    ) = row;
    Ok(Task {
        id,
        project_id,
        milestone_id,
        title,
        description,
        status: status.parse()?,
        priority: priority.parse()?,
        sort_order,
        due_date,
        created_at,
        updated_at,
    })
}

const TASK_COLUMNS: &str = "id, project_id, milestone_id, title, description, status, priority, \
                            sort_order, due_date, created_at, updated_at";

/// Field-by-field partial update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub milestone_id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub sort_order: Option<f64>,
    pub due_date: Option<i64>,
}

impl TaskPatch {
    /// Merge into an existing task. Exhaustive over every updatable field.
    fn apply(&self, task: &mut Task) {
        if let Some(milestone_id) = self.milestone_id {
            task.milestone_id = Some(milestone_id);
        }
        if let Some(ref title) = self.title {
            task.title = title.clone();
        }
        if let Some(ref description) = self.description {
            task.description = Some(description.clone());
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(sort_order) = self.sort_order {
            task.sort_order = sort_order;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = Some(due_date);
        }
    }
}

impl Store {
    pub async fn create_task(
        &self,
        project_id: i64,
        title: &str,
        priority: Priority,
    ) -> Result<Task> {
        let now = Utc::now().timestamp();

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO tasks (project_id, title, status, priority, created_at, updated_at)
            VALUES ($1, $2, 'todo', $3, $4, $4)
            RETURNING id
            "#,
        )
        .bind(project_id)
        .bind(title)
        .bind(priority.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(Task {
            id,
            project_id,
            milestone_id: None,
            title: title.to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority,
            sort_order: 0.0,
            due_date: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_task(&self, id: i64) -> Result<Option<Task>> {
        let row: Option<TaskRow> =
            sqlx::query_as(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(map_task).transpose()
    }

    /// Apply a patch and write the merged row back. Returns the merged task,
    /// or `None` when the id does not exist.
    pub async fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<Option<Task>> {
        let Some(mut task) = self.get_task(id).await? else {
            return Ok(None);
        };

        patch.apply(&mut task);
        task.updated_at = Utc::now().timestamp();

        sqlx::query(
            r#"
            UPDATE tasks
            SET milestone_id = $1, title = $2, description = $3, status = $4,
                priority = $5, sort_order = $6, due_date = $7, updated_at = $8
            WHERE id = $9
            "#,
        )
        .bind(task.milestone_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.sort_order)
        .bind(task.due_date)
        .bind(task.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(Some(task))
    }

    /// Status write used by execution transitions; runs inside the caller's
    /// transaction.
    pub async fn set_task_status_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        task_id: i64,
        status: TaskStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE tasks SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(status.as_str())
            .bind(Utc::now().timestamp())
            .bind(task_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        Task {
            id: 1,
            project_id: 1,
            milestone_id: None,
            title: "write parser".to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority: Priority::Medium,
            sort_order: 1000.0,
            due_date: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn patch_merges_only_set_fields() {
        let mut task = sample_task();
        let patch = TaskPatch {
            title: Some("write log parser".to_string()),
            priority: Some(Priority::High),
            ..Default::default()
        };

        patch.apply(&mut task);

        assert_eq!(task.title, "write log parser");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.sort_order, 1000.0);
        assert!(task.description.is_none());
    }

    #[test]
    fn empty_patch_is_identity() {
        let mut task = sample_task();
        TaskPatch::default().apply(&mut task);
        assert_eq!(task.title, "write parser");
        assert_eq!(task.status, TaskStatus::Todo);
    }
}
