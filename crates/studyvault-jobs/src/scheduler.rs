//! Backup scheduler: daily, weekly and monthly backups plus periodic cleanup.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument};

use studyvault_backup::BackupService;
use studyvault_core::{Error, Result};

use crate::config::ScheduleConfig;
use crate::schedule::{next_daily, next_monthly, next_weekly, ScheduledTask};

/// Event emitted by the scheduler.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    SchedulerStarted,
    BackupCreated {
        task: Option<ScheduledTask>,
        path: PathBuf,
    },
    BackupFailed {
        task: Option<ScheduledTask>,
        error: String,
    },
    CleanupCompleted { deleted: usize },
    CleanupFailed { error: String },
    SchedulerStopped,
}

/// Snapshot directory figures plus the schedule settings that govern it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleStatus {
    pub enabled: bool,
    pub backup_count: usize,
    pub total_size_bytes: u64,
    pub max_backups: usize,
}

/// Handle for controlling a running scheduler.
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<SchedulerEvent>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the scheduler to stop after the task in progress, if any.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for scheduler events.
    pub fn events(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.event_rx.resubscribe()
    }

    /// Wait for the scheduler task to finish.
    pub async fn join(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| Error::Internal(format!("Scheduler task failed: {}", e)))
    }
}

/// Runs scheduled backups against a [`BackupService`].
///
/// Tasks run one at a time in a single tokio task, so they never overlap.
/// A failing task is logged and reported as an event; the schedule goes on.
#[derive(Clone)]
pub struct BackupScheduler {
    service: BackupService,
    config: ScheduleConfig,
    event_tx: broadcast::Sender<SchedulerEvent>,
}

impl BackupScheduler {
    pub fn new(service: BackupService, config: ScheduleConfig) -> Self {
        let (event_tx, _) = broadcast::channel(studyvault_core::defaults::EVENT_BUS_CAPACITY);
        Self {
            service,
            config,
            event_tx,
        }
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Get a receiver for scheduler events.
    pub fn events(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.event_tx.subscribe()
    }

    /// Start the scheduler and return a handle for control.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        let task = tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        SchedulerHandle {
            shutdown_tx,
            event_rx,
            task,
        }
    }

    /// Current backup directory figures.
    pub async fn status(&self) -> Result<ScheduleStatus> {
        let stats = self.service.backup_stats().await?;
        Ok(ScheduleStatus {
            enabled: self.config.enabled,
            backup_count: stats.backup_count,
            total_size_bytes: stats.total_size_bytes,
            max_backups: self.config.max_backups,
        })
    }

    /// Create a full backup now, outside the schedule. No cleanup runs.
    pub async fn trigger_backup(&self) -> Result<PathBuf> {
        info!(subsystem = "jobs", component = "scheduler", op = "trigger", "Manual backup requested");
        self.backup(None).await
    }

    /// Fire time of `task` strictly after `now`.
    fn next_fire(&self, task: ScheduledTask, now: NaiveDateTime) -> NaiveDateTime {
        match task {
            ScheduledTask::DailyBackup => next_daily(now, self.config.daily_at),
            ScheduledTask::WeeklyBackup => {
                next_weekly(now, self.config.weekly_on, self.config.weekly_at)
            }
            ScheduledTask::MonthlyBackup => {
                next_monthly(now, self.config.monthly_day, self.config.monthly_at)
            }
            ScheduledTask::Cleanup => {
                now + chrono::Duration::from_std(self.config.cleanup_interval)
                    .unwrap_or_else(|_| chrono::Duration::hours(6))
            }
        }
    }

    #[instrument(skip(self, shutdown_rx))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Backup scheduler is disabled, not starting");
            return;
        }

        let now = Local::now().naive_local();
        let mut due: HashMap<ScheduledTask, NaiveDateTime> = ScheduledTask::ALL
            .into_iter()
            .map(|task| (task, self.next_fire(task, now)))
            .collect();

        info!(
            daily_at = %self.config.daily_at,
            weekly_on = ?self.config.weekly_on,
            weekly_at = %self.config.weekly_at,
            monthly_day = self.config.monthly_day,
            monthly_at = %self.config.monthly_at,
            cleanup_interval_secs = self.config.cleanup_interval.as_secs(),
            max_backups = self.config.max_backups,
            "Backup scheduler started"
        );
        let _ = self.event_tx.send(SchedulerEvent::SchedulerStarted);

        loop {
            let Some(wake_at) = due.values().min().copied() else {
                break;
            };
            let wait = (wake_at - Local::now().naive_local())
                .to_std()
                .unwrap_or_default();
            debug!(wake_at = %wake_at, wait_secs = wait.as_secs(), "Scheduler sleeping");

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Backup scheduler received shutdown signal");
                    break;
                }
                _ = sleep(wait) => {}
            }

            let now = Local::now().naive_local();
            let fired: Vec<ScheduledTask> = ScheduledTask::ALL
                .into_iter()
                .filter(|task| due.get(task).is_some_and(|at| *at <= now))
                .collect();
            for task in &fired {
                due.insert(*task, self.next_fire(*task, now));
            }
            self.run_tasks(&fired).await;
        }

        let _ = self.event_tx.send(SchedulerEvent::SchedulerStopped);
        info!("Backup scheduler stopped");
    }

    /// Run the tasks that came due together.
    ///
    /// Backup tasks due at the same moment share one snapshot. The daily
    /// backup and the periodic cleanup both prune to `max_backups`, once.
    pub async fn run_tasks(&self, fired: &[ScheduledTask]) {
        if let Some(task) = fired.iter().find(|t| t.creates_backup()) {
            let _ = self.backup(Some(*task)).await;
        }
        let cleanup = fired
            .iter()
            .any(|t| matches!(t, ScheduledTask::DailyBackup | ScheduledTask::Cleanup));
        if cleanup {
            let _ = self.cleanup().await;
        }
    }

    async fn backup(&self, task: Option<ScheduledTask>) -> Result<PathBuf> {
        let start = Instant::now();
        match self.service.create_backup().await {
            Ok(path) => {
                info!(
                    subsystem = "jobs",
                    component = "scheduler",
                    op = "backup",
                    task = task.map(|t| t.as_str()).unwrap_or("manual"),
                    file_path = %path.display(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Scheduled backup created"
                );
                let _ = self.event_tx.send(SchedulerEvent::BackupCreated {
                    task,
                    path: path.clone(),
                });
                Ok(path)
            }
            Err(e) => {
                error!(
                    subsystem = "jobs",
                    component = "scheduler",
                    op = "backup",
                    task = task.map(|t| t.as_str()).unwrap_or("manual"),
                    error = %e,
                    "Backup failed"
                );
                let _ = self.event_tx.send(SchedulerEvent::BackupFailed {
                    task,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn cleanup(&self) -> Result<usize> {
        match self.service.cleanup_old_backups(self.config.max_backups).await {
            Ok(deleted) => {
                let _ = self
                    .event_tx
                    .send(SchedulerEvent::CleanupCompleted { deleted });
                Ok(deleted)
            }
            Err(e) => {
                error!(subsystem = "jobs", component = "scheduler", op = "cleanup", error = %e, "Cleanup failed");
                let _ = self.event_tx.send(SchedulerEvent::CleanupFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }
}
