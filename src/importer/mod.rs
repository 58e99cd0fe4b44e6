//! Git-history import pipeline.
//!
//! Reconstructs dashboard data from a repository's log: one session per
//! calendar day of commit activity, one commit event per commit, file-level
//! changes from numstat diffs, one completed milestone per tag, and a daily
//! aggregate row per active day. Re-running against the same path is a
//! no-op: the project row is resolved by path and commits whose hashes are
//! already recorded are dropped up front.
//!
//! The project row is written before anything else and survives a failed
//! import; everything downstream of the log lands in a single transaction.

mod git;

pub use git::{CommitLine, GitCli, NumstatLine, TagLine, EMPTY_TREE};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{ChangeType, DomainEvent, MilestoneStatus, ProjectStatus, Session};
use crate::error::{Error, Result};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub path: PathBuf,
    /// Display name for a newly created project; defaults to the directory
    /// name.
    pub name: Option<String>,
    pub max_commits: usize,
    pub since: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub project_id: i64,
    pub commits: usize,
    pub sessions: usize,
    pub events: usize,
    pub file_changes: usize,
    pub milestones: usize,
    pub daily_stats: usize,
}

impl ImportSummary {
    /// The notification the caller hands to the broadcaster once the import
    /// has committed.
    pub fn to_events(&self) -> Vec<DomainEvent> {
        vec![DomainEvent::new(
            "project",
            "imported",
            json!({
                "project_id": self.project_id,
                "commits": self.commits,
                "sessions": self.sessions,
                "events": self.events,
                "file_changes": self.file_changes,
                "milestones": self.milestones,
                "daily_stats": self.daily_stats,
            }),
        )]
    }
}

/// Per-commit file changes, resolved before the write transaction opens.
struct CommitChanges {
    commit_index: usize,
    lines: Vec<NumstatLine>,
}

#[derive(Clone)]
pub struct GitImporter {
    store: Store,
    git: GitCli,
}

impl GitImporter {
    pub fn new(store: Store, git: GitCli) -> Self {
        Self { store, git }
    }

    /// Importer wired from config timeouts.
    pub fn from_config(store: Store, config: &Config) -> Self {
        let git = GitCli::new(
            Duration::from_secs(config.git_log_timeout_secs),
            Duration::from_secs(config.git_diff_timeout_secs),
        );
        Self::new(store, git)
    }

    pub async fn import(&self, request: ImportRequest) -> Result<ImportSummary> {
        if !request.path.is_dir() {
            return Err(Error::Validation(format!(
                "import path does not exist or is not a directory: {}",
                request.path.display()
            )));
        }
        let path_str = request.path.to_string_lossy().into_owned();

        // The idempotency anchor: one project per path, created up front and
        // kept even if the rest of the import fails.
        let project = match self.store.find_project_by_path(&path_str).await? {
            Some(project) => project,
            None => {
                let name = request.name.clone().unwrap_or_else(|| {
                    request
                        .path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path_str.clone())
                });
                self.store
                    .create_project(&name, None, ProjectStatus::Active, Some(&path_str))
                    .await?
            }
        };

        if !self.git.is_repository(&request.path).await {
            return Err(Error::NotARepository(path_str));
        }

        let mut commits = self
            .git
            .log(&request.path, request.max_commits, request.since)
            .await?;
        commits.sort_by_key(|c| c.timestamp);

        // Commits already recorded for this project are skipped, but stay in
        // the retrieved list so later commits still diff against their true
        // predecessor.
        let seen = self.store.commit_hashes_for_project(project.id).await?;
        let new_indices: Vec<usize> = commits
            .iter()
            .enumerate()
            .filter(|(_, c)| !seen.contains(c.short_hash()))
            .map(|(index, _)| index)
            .collect();

        info!(
            project_id = project.id,
            commits = new_indices.len(),
            skipped = commits.len() - new_indices.len(),
            path = %path_str,
            "importing git history"
        );

        // Resolve diffs before opening the transaction: each commit against
        // the previous retrieved one, the oldest against the empty tree.
        let mut changes: Vec<CommitChanges> = Vec::new();
        for &index in &new_indices {
            let commit = &commits[index];
            let base = if index == 0 {
                EMPTY_TREE
            } else {
                commits[index - 1].hash.as_str()
            };
            match self.git.numstat(&request.path, base, &commit.hash).await {
                Ok(lines) => changes.push(CommitChanges {
                    commit_index: index,
                    lines,
                }),
                Err(err) => {
                    // Per-commit diff failures lose that commit's file
                    // changes, nothing else.
                    warn!(hash = commit.short_hash(), %err, "skipping file changes for commit");
                }
            }
        }

        let tags = self.git.tags(&request.path).await?;
        let known_titles = self.store.milestone_titles(project.id).await?;

        // Group new commits by the author-local calendar date.
        let mut by_date: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
        for &index in &new_indices {
            by_date
                .entry(commits[index].timestamp.date_naive())
                .or_default()
                .push(index);
        }

        let mut summary = ImportSummary {
            project_id: project.id,
            commits: new_indices.len(),
            events: new_indices.len(),
            sessions: by_date.len(),
            daily_stats: by_date.len(),
            ..Default::default()
        };

        let mut tx = self.store.pool().begin().await?;

        // Sessions first; events and file changes reference them.
        let mut session_ids: BTreeMap<NaiveDate, String> = BTreeMap::new();
        for (date, indices) in &by_date {
            let start = indices
                .iter()
                .map(|&i| commits[i].timestamp.timestamp())
                .min()
                .unwrap_or_default();
            let end = indices
                .iter()
                .map(|&i| commits[i].timestamp.timestamp())
                .max()
                .unwrap_or_default();

            let session = Session {
                id: Uuid::new_v4().to_string(),
                project_id: Some(project.id),
                name: None,
                start_time: start,
                end_time: Some(end),
                token_usage: None,
                summary: Some(format!("{} commits imported from git on {date}", indices.len())),
            };
            self.store.insert_session_tx(&mut tx, &session).await?;
            session_ids.insert(*date, session.id);
        }

        for &index in &new_indices {
            let commit = &commits[index];
            let date = commit.timestamp.date_naive();
            let session_id = &session_ids[&date];
            let payload = json!({
                "hash": commit.short_hash(),
                "subject": commit.subject,
                "author": commit.author,
            });
            self.store
                .insert_event_tx(
                    &mut tx,
                    session_id,
                    "commit",
                    commit.timestamp.timestamp(),
                    Some(&payload),
                )
                .await?;
        }

        for change in &changes {
            let commit = &commits[change.commit_index];
            let session_id = &session_ids[&commit.timestamp.date_naive()];
            for line in &change.lines {
                self.store
                    .insert_file_change_tx(
                        &mut tx,
                        session_id,
                        &line.path,
                        ChangeType::classify(line.added, line.removed),
                        line.added,
                        line.removed,
                        commit.timestamp.timestamp(),
                    )
                    .await?;
                summary.file_changes += 1;
            }
        }

        for tag in &tags {
            if known_titles.iter().any(|title| title == &tag.name) {
                debug!(tag = %tag.name, "tag already imported as milestone");
                continue;
            }
            self.store
                .insert_milestone_tx(
                    &mut tx,
                    project.id,
                    &tag.name,
                    tag.created_at.map(|t| t.timestamp()),
                    MilestoneStatus::Completed,
                )
                .await?;
            summary.milestones += 1;
        }

        // Commit count stands in for tasks completed; one synthesized
        // session per day.
        for (date, indices) in &by_date {
            self.store
                .upsert_daily_stats_tx(
                    &mut tx,
                    project.id,
                    &date.to_string(),
                    indices.len() as i64,
                    1,
                )
                .await?;
        }

        tx.commit().await?;

        info!(
            project_id = summary.project_id,
            commits = summary.commits,
            sessions = summary.sessions,
            file_changes = summary.file_changes,
            milestones = summary.milestones,
            "git import finished"
        );

        Ok(summary)
    }
}
