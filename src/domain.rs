//! Domain records and their status vocabularies.
//!
//! All timestamps are unix epoch seconds; calendar dates are `YYYY-MM-DD`
//! text. Statuses are stored as TEXT and round-trip through `as_str` /
//! `FromStr` so the database never sees an unknown value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

// ============================================================================
// Status enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Completed,
    Archived,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "archived" => Ok(Self::Archived),
            other => Err(Error::Validation(format!("unknown project status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
    Archived,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Archived => "archived",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "todo" => Ok(Self::Todo),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "archived" => Ok(Self::Archived),
            other => Err(Error::Validation(format!("unknown task status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(Error::Validation(format!("unknown priority: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    Pending,
    InProgress,
    Completed,
    Overdue,
}

impl MilestoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Overdue => "overdue",
        }
    }
}

impl FromStr for MilestoneStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "overdue" => Ok(Self::Overdue),
            other => Err(Error::Validation(format!("unknown milestone status: {other}"))),
        }
    }
}

/// Lifecycle of one continuous interval of work on a task within a session.
///
/// `Active` is the only state without a `stopped_at`; at most one execution
/// per task may be active at a time, across all sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Active,
    Completed,
    Paused,
    Abandoned,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Paused => "paused",
            Self::Abandoned => "abandoned",
        }
    }
}

impl FromStr for ExecutionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "paused" => Ok(Self::Paused),
            "abandoned" => Ok(Self::Abandoned),
            other => Err(Error::Validation(format!("unknown execution status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    Modified,
    Deleted,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }

    /// Classify a numstat line: pure additions create, pure removals delete,
    /// anything else is a modification.
    pub fn classify(added: i64, removed: i64) -> Self {
        if added > 0 && removed == 0 {
            Self::Created
        } else if removed > 0 && added == 0 {
            Self::Deleted
        } else {
            Self::Modified
        }
    }
}

impl FromStr for ChangeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "created" => Ok(Self::Created),
            "modified" => Ok(Self::Modified),
            "deleted" => Ok(Self::Deleted),
            other => Err(Error::Validation(format!("unknown change type: {other}"))),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    /// Filesystem location; natural key for git-import idempotency.
    pub path: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: i64,
    pub project_id: i64,
    pub milestone_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub sort_order: f64,
    pub due_date: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Milestone {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<i64>,
    pub status: MilestoneStatus,
    pub created_at: i64,
}

/// A bounded period of development activity. The id is an opaque string
/// supplied by the client, or a fresh UUID when synthesized by the importer.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub project_id: Option<i64>,
    pub name: Option<String>,
    pub start_time: i64,
    /// Null while the session is open.
    pub end_time: Option<i64>,
    pub token_usage: Option<serde_json::Value>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskExecution {
    pub id: i64,
    pub task_id: i64,
    pub session_id: String,
    pub started_at: i64,
    /// Set iff status != active.
    pub stopped_at: Option<i64>,
    pub status: ExecutionStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: i64,
    pub session_id: String,
    pub event_type: String,
    pub timestamp: i64,
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileChange {
    pub id: i64,
    pub session_id: String,
    pub file_path: String,
    pub change_type: ChangeType,
    pub lines_added: i64,
    pub lines_removed: i64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyStats {
    pub id: i64,
    pub project_id: Option<i64>,
    pub date: String,
    pub tasks_completed: i64,
    pub tokens_used: i64,
    pub session_count: i64,
    pub agent_calls: i64,
}

// ============================================================================
// Domain events
// ============================================================================

/// A logical notification produced by a core operation. Operations return
/// these in order; the caller hands them to the broadcaster, which keeps the
/// core free of transport concerns.
#[derive(Debug, Clone, Serialize)]
pub struct DomainEvent {
    pub category: String,
    pub action: String,
    pub data: serde_json::Value,
}

impl DomainEvent {
    pub fn new(category: &str, action: &str, data: serde_json::Value) -> Self {
        Self {
            category: category.to_string(),
            action: action.to_string(),
            data,
        }
    }
}

impl fmt::Display for DomainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for s in ["todo", "in_progress", "done", "archived"] {
            assert_eq!(s.parse::<TaskStatus>().unwrap().as_str(), s);
        }
        for s in ["active", "completed", "paused", "abandoned"] {
            assert_eq!(s.parse::<ExecutionStatus>().unwrap().as_str(), s);
        }
        assert!("running".parse::<ExecutionStatus>().is_err());
    }

    #[test]
    fn change_classification() {
        assert_eq!(ChangeType::classify(3, 0), ChangeType::Created);
        assert_eq!(ChangeType::classify(0, 4), ChangeType::Deleted);
        assert_eq!(ChangeType::classify(2, 1), ChangeType::Modified);
        // A zero/zero line (e.g. mode change) still counts as a modification.
        assert_eq!(ChangeType::classify(0, 0), ChangeType::Modified);
    }
}
