//! Task-execution lifecycle tracking.
//!
//! Owns the "who is working on what, where" relation: starting work claims a
//! task for a session, stopping releases it, and closing a session abandons
//! whatever it still held. Task status follows the execution transitions and
//! is never set to in_progress/done/todo directly by callers.
//!
//! Every mutating operation runs as one transaction and returns the domain
//! events it produced, in order. Dispatching them to the broadcaster is the
//! caller's job, so the state machine stays testable without a transport.
//!
//! Exclusivity: at most one active execution per task, across all sessions.
//! The transactional check gives the friendly conflict message; the partial
//! unique index on (task_id) WHERE status = 'active' closes the window two
//! concurrent starts could otherwise slip through, and a violation there is
//! reported as the same conflict.

use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::domain::{
    DomainEvent, ExecutionStatus, Session, TaskExecution, TaskStatus,
};
use crate::error::{Error, Result};
use crate::store::Store;

/// Requested terminal state for an explicit stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Completed,
    Paused,
}

impl StopOutcome {
    fn execution_status(self) -> ExecutionStatus {
        match self {
            Self::Completed => ExecutionStatus::Completed,
            Self::Paused => ExecutionStatus::Paused,
        }
    }

    /// Task status after the stop: done when completed, back to todo when
    /// paused.
    fn task_status(self) -> TaskStatus {
        match self {
            Self::Completed => TaskStatus::Done,
            Self::Paused => TaskStatus::Todo,
        }
    }
}

impl std::str::FromStr for StopOutcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "completed" => Ok(Self::Completed),
            "paused" => Ok(Self::Paused),
            other => Err(Error::Validation(format!(
                "stop status must be 'completed' or 'paused', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug)]
pub struct WorkStarted {
    pub execution: TaskExecution,
    pub events: Vec<DomainEvent>,
}

#[derive(Debug)]
pub struct WorkStopped {
    pub execution: TaskExecution,
    pub events: Vec<DomainEvent>,
}

#[derive(Debug)]
pub struct SessionClosed {
    pub session: Session,
    pub abandoned: Vec<TaskExecution>,
    pub events: Vec<DomainEvent>,
}

#[derive(Clone)]
pub struct Tracker {
    store: Store,
}

impl Tracker {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Claim a task for a session.
    pub async fn start_work(
        &self,
        session_id: &str,
        task_id: i64,
        notes: Option<&str>,
    ) -> Result<WorkStarted> {
        self.store
            .get_session(session_id)
            .await?
            .ok_or_else(|| Error::not_found("session", session_id))?;
        let task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or_else(|| Error::not_found("task", task_id))?;

        let now = Utc::now().timestamp();
        let mut tx = self.store.pool().begin().await?;

        if let Some(holder) = self.store.active_execution_for_task_tx(&mut tx, task_id).await? {
            return Err(Error::Conflict(format!(
                "task #{task_id} is already active in session {}",
                holder.session_id
            )));
        }

        let execution = match self
            .store
            .insert_execution_tx(&mut tx, task_id, session_id, now, notes)
            .await
        {
            Ok(execution) => execution,
            // Lost a race to another start between the check and the insert.
            Err(err) if err.is_unique_violation() => {
                return Err(Error::Conflict(format!(
                    "task #{task_id} is already active in another session"
                )));
            }
            Err(err) => return Err(err),
        };

        self.store
            .set_task_status_tx(&mut tx, task_id, TaskStatus::InProgress)
            .await?;
        tx.commit().await?;

        info!(task_id, session_id, execution_id = execution.id, "task work started");

        let events = vec![DomainEvent::new(
            "task_execution",
            "started",
            json!({
                "execution_id": execution.id,
                "task_id": task_id,
                "session_id": session_id,
                "task_title": task.title,
            }),
        )];

        Ok(WorkStarted { execution, events })
    }

    /// Release a task claimed by this session. Only the owning session can
    /// stop its own execution; an active claim elsewhere is still not-found
    /// from the caller's point of view.
    pub async fn stop_work(
        &self,
        session_id: &str,
        task_id: i64,
        outcome: StopOutcome,
        notes: Option<&str>,
    ) -> Result<WorkStopped> {
        let now = Utc::now().timestamp();
        let mut tx = self.store.pool().begin().await?;

        let mut execution = self
            .store
            .active_execution_for_pair_tx(&mut tx, task_id, session_id)
            .await?
            .ok_or_else(|| {
                Error::not_found(
                    "active execution",
                    format!("task #{task_id} in session {session_id}"),
                )
            })?;

        let status = outcome.execution_status();
        self.store
            .finish_execution_tx(&mut tx, execution.id, status, now, notes)
            .await?;
        self.store
            .set_task_status_tx(&mut tx, task_id, outcome.task_status())
            .await?;
        tx.commit().await?;

        execution.status = status;
        execution.stopped_at = Some(now);
        if let Some(notes) = notes {
            execution.notes = Some(notes.to_string());
        }

        info!(
            task_id,
            session_id,
            execution_id = execution.id,
            status = status.as_str(),
            "task work stopped"
        );

        let events = vec![DomainEvent::new(
            "task_execution",
            "stopped",
            json!({
                "execution_id": execution.id,
                "task_id": task_id,
                "session_id": session_id,
                "status": status.as_str(),
            }),
        )];

        Ok(WorkStopped { execution, events })
    }

    /// End a session. Every execution it still holds is force-transitioned
    /// to abandoned in the same transaction that sets end_time, so a closed
    /// session can never keep a task claimed.
    pub async fn close_session(
        &self,
        session_id: &str,
        end_time: Option<i64>,
    ) -> Result<SessionClosed> {
        let mut session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| Error::not_found("session", session_id))?;

        let now = end_time.unwrap_or_else(|| Utc::now().timestamp());
        let mut tx = self.store.pool().begin().await?;

        let mut abandoned = self
            .store
            .active_executions_for_session_tx(&mut tx, session_id)
            .await?;
        for execution in &abandoned {
            self.store
                .finish_execution_tx(&mut tx, execution.id, ExecutionStatus::Abandoned, now, None)
                .await?;
        }
        self.store.set_session_end_tx(&mut tx, session_id, now).await?;
        tx.commit().await?;

        session.end_time = Some(now);
        for execution in &mut abandoned {
            execution.status = ExecutionStatus::Abandoned;
            execution.stopped_at = Some(now);
        }

        info!(
            session_id,
            abandoned = abandoned.len(),
            "session closed"
        );

        let mut events = vec![DomainEvent::new(
            "session",
            "closed",
            json!({
                "id": session_id,
                "project_id": session.project_id,
            }),
        )];
        for execution in &abandoned {
            events.push(DomainEvent::new(
                "task_execution",
                "abandoned",
                json!({
                    "execution_id": execution.id,
                    "task_id": execution.task_id,
                    "session_id": session_id,
                }),
            ));
        }

        Ok(SessionClosed {
            session,
            abandoned,
            events,
        })
    }

    /// Execution history for a task, most recent first.
    pub async fn executions_for_task(&self, task_id: i64) -> Result<Vec<TaskExecution>> {
        self.store.executions_for_task(task_id).await
    }

    /// Execution history for a session, most recent first.
    pub async fn executions_for_session(&self, session_id: &str) -> Result<Vec<TaskExecution>> {
        self.store.executions_for_session(session_id).await
    }
}
