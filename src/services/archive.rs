use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::db::tasks;
use crate::error::AppError;
use crate::models::{Task, TaskStatus};

/// How long a task stays on the board after completion.
pub const ARCHIVE_AFTER_MONTHS: u32 = 2;

/// Completion timestamps at or before this instant are old enough to archive.
pub fn archive_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(ARCHIVE_AFTER_MONTHS))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub fn is_archivable(task: &Task, now: DateTime<Utc>) -> bool {
    if task.status != TaskStatus::Completed || task.archived {
        return false;
    }
    match task.completed_at {
        Some(completed_at) => completed_at <= archive_cutoff(now),
        None => false,
    }
}

pub fn select_archivable(tasks: &[Task], now: DateTime<Utc>) -> Vec<&Task> {
    tasks.iter().filter(|t| is_archivable(t, now)).collect()
}

/// Applies `{archived: true, archivedAt}` to one task.
#[async_trait]
pub trait TaskArchiver: Send + Sync {
    /// Returns false when the task no longer exists or was already archived.
    async fn archive(&self, task: &Task, archived_at: DateTime<Utc>) -> Result<bool, AppError>;
}

pub struct DbArchiver {
    db: SqlitePool,
}

impl DbArchiver {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TaskArchiver for DbArchiver {
    async fn archive(&self, task: &Task, archived_at: DateTime<Utc>) -> Result<bool, AppError> {
        Ok(tasks::mark_archived(&self.db, &task.user_id, &task.id, archived_at).await?)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub scanned: usize,
    pub archived: usize,
    pub failed: usize,
}

pub struct ArchiveManager {
    archiver: Arc<dyn TaskArchiver>,
}

impl ArchiveManager {
    pub fn new(archiver: Arc<dyn TaskArchiver>) -> Self {
        Self { archiver }
    }

    /// Archives every eligible task once. Failed updates are logged and left
    /// for the next sweep.
    pub async fn sweep(&self, tasks: &[Task], now: DateTime<Utc>) -> SweepStats {
        let mut stats = SweepStats {
            scanned: tasks.len(),
            ..Default::default()
        };

        for task in select_archivable(tasks, now) {
            match self.archiver.archive(task, now).await {
                Ok(true) => {
                    debug!("archived task {} for user {}", task.id, task.user_id);
                    stats.archived += 1;
                }
                Ok(false) => {
                    debug!("task {} was already archived or removed", task.id);
                }
                Err(e) => {
                    warn!("failed to archive task {}: {}", task.id, e);
                    stats.failed += 1;
                }
            }
        }

        stats
    }

    /// Sweeps a raw JSON task list. Anything other than an array is ignored
    /// with a warning, as are elements that are not tasks.
    pub async fn sweep_value(&self, payload: &serde_json::Value, now: DateTime<Utc>) -> SweepStats {
        let Some(items) = payload.as_array() else {
            warn!("archive sweep expected a task list, got {}", json_kind(payload));
            return SweepStats::default();
        };

        let tasks: Vec<Task> = items
            .iter()
            .filter_map(|item| match serde_json::from_value::<Task>(item.clone()) {
                Ok(task) => Some(task),
                Err(e) => {
                    warn!("skipping malformed task in archive sweep: {}", e);
                    None
                }
            })
            .collect();

        self.sweep(&tasks, now).await
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Runs the archive sweep once at start and then on a fixed interval.
pub struct ArchiveScheduler {
    db: SqlitePool,
    manager: ArchiveManager,
    interval: Duration,
}

impl ArchiveScheduler {
    pub fn new(db: SqlitePool, interval: Duration) -> Self {
        let archiver = Arc::new(DbArchiver::new(db.clone()));
        Self {
            db,
            manager: ArchiveManager::new(archiver),
            interval,
        }
    }

    pub async fn start(self) {
        info!("Starting archive scheduler (interval: {:?})", self.interval);
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            // The first tick completes immediately.
            ticker.tick().await;

            match self.run_once(Utc::now()).await {
                Ok(stats) => {
                    info!(
                        "Archive sweep completed - scanned: {}, archived: {}, failed: {}",
                        stats.scanned, stats.archived, stats.failed
                    );
                }
                Err(e) => {
                    warn!("Archive sweep failed: {:?}", e);
                }
            }
        }
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepStats, AppError> {
        let candidates = tasks::fetch_archive_candidates(&self.db).await?;
        Ok(self.manager.sweep(&candidates, now).await)
    }
}
