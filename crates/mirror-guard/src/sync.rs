use std::sync::Arc;

use crate::backup::BackupOutcome;
use crate::guard::{GuardReport, SyncGuard, SyncOptions, Verdict};
use crate::repository::{
    ActivityEntry, ActivitySink, BackupConfigSource, Repository, RepositoryError,
    RepositoryStatus, RepositoryStore,
};

/// Errors that end a sync attempt.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("pre-sync backup failed: {0}")]
    Backup(String),

    #[error("mirror transport failed: {0}")]
    Transport(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Performs the actual mirror push. Lives outside this crate.
#[async_trait::async_trait]
pub trait MirrorTransport: Send + Sync {
    async fn mirror(&self, repository: &Repository) -> Result<(), String>;
}

/// How a sync attempt ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced(GuardReport),
    /// Held for approval; nothing was pushed.
    Blocked(GuardReport),
}

/// Runs one guarded sync: guard, state transitions, transport, audit.
pub struct MirrorSyncer {
    guard: Arc<SyncGuard>,
    store: Arc<dyn RepositoryStore>,
    activity: Arc<dyn ActivitySink>,
    configs: Arc<dyn BackupConfigSource>,
    transport: Arc<dyn MirrorTransport>,
}

impl MirrorSyncer {
    pub fn new(
        guard: Arc<SyncGuard>,
        store: Arc<dyn RepositoryStore>,
        activity: Arc<dyn ActivitySink>,
        configs: Arc<dyn BackupConfigSource>,
        transport: Arc<dyn MirrorTransport>,
    ) -> Self {
        Self {
            guard,
            store,
            activity,
            configs,
            transport,
        }
    }

    pub fn guard(&self) -> &SyncGuard {
        &self.guard
    }

    /// Sync one repository.
    ///
    /// Nothing is written to the store until the guard has finished, so a
    /// cancelled attempt leaves the repository as it was.
    pub async fn run(
        &self,
        repository: &Repository,
        options: SyncOptions,
    ) -> Result<SyncOutcome, SyncError> {
        let config = self.configs.backup_config(&repository.user_id).await;
        let report = self
            .guard
            .evaluate(repository, config.as_ref(), options)
            .await;

        self.store
            .update_status(&repository.id, RepositoryStatus::Syncing, None)
            .await?;

        if let Some(detection) = report.detection.as_ref().filter(|d| d.is_skipped()) {
            self.activity
                .record(ActivityEntry::for_repository(
                    repository,
                    RepositoryStatus::Syncing,
                    format!("{}; syncing without force-push protection", detection.summary()),
                ))
                .await;
        }

        match report.verdict {
            Verdict::Block => return self.block(repository, report).await,
            Verdict::BackupFailed => {
                let reason = match &report.backup {
                    BackupOutcome::Failed(msg) => msg.clone(),
                    _ => "unknown error".to_owned(),
                };
                let message = format!("Sync blocked: pre-sync backup failed: {reason}");
                self.store
                    .update_status(&repository.id, RepositoryStatus::Error, Some(&message))
                    .await?;
                self.activity
                    .record(ActivityEntry::for_repository(
                        repository,
                        RepositoryStatus::Error,
                        message,
                    ))
                    .await;
                return Err(SyncError::Backup(reason));
            }
            Verdict::Proceed => {}
        }

        if let BackupOutcome::Failed(msg) = &report.backup {
            self.activity
                .record(ActivityEntry::for_repository(
                    repository,
                    RepositoryStatus::Syncing,
                    format!("Pre-sync backup failed, continuing sync: {msg}"),
                ))
                .await;
        }

        match self.transport.mirror(repository).await {
            Ok(()) => {
                self.store
                    .update_status(&repository.id, RepositoryStatus::Synced, None)
                    .await?;
                self.activity
                    .record(ActivityEntry::for_repository(
                        repository,
                        RepositoryStatus::Synced,
                        format!("Synced {}", repository.full_name()),
                    ))
                    .await;
                tracing::info!(repo = %repository.full_name(), "sync complete");
                Ok(SyncOutcome::Synced(report))
            }
            Err(e) => {
                self.store
                    .update_status(&repository.id, RepositoryStatus::Error, Some(&e))
                    .await?;
                self.activity
                    .record(ActivityEntry::for_repository(
                        repository,
                        RepositoryStatus::Error,
                        format!("Sync failed for {}: {e}", repository.full_name()),
                    ))
                    .await;
                tracing::warn!(repo = %repository.full_name(), error = %e, "sync failed");
                Err(SyncError::Transport(e))
            }
        }
    }

    async fn block(
        &self,
        repository: &Repository,
        report: GuardReport,
    ) -> Result<SyncOutcome, SyncError> {
        let summary = report
            .detection
            .as_ref()
            .map(|d| d.summary())
            .unwrap_or_default();
        let details = report
            .detection
            .as_ref()
            .and_then(|d| serde_json::to_string(d).ok());

        self.store
            .update_status(
                &repository.id,
                RepositoryStatus::PendingApproval,
                Some(&summary),
            )
            .await?;

        if let BackupOutcome::Failed(msg) = &report.backup {
            self.activity
                .record(ActivityEntry::for_repository(
                    repository,
                    RepositoryStatus::PendingApproval,
                    format!("Pre-sync backup failed, sync held without a snapshot: {msg}"),
                ))
                .await;
            tracing::warn!(repo = %repository.full_name(), error = %msg, "snapshot failed for held sync");
        }

        let mut entry = ActivityEntry::for_repository(
            repository,
            RepositoryStatus::PendingApproval,
            format!("Sync blocked, awaiting approval: {summary}"),
        );
        if let Some(details) = details {
            entry = entry.with_details(details);
        }
        self.activity.record(entry).await;

        tracing::warn!(repo = %repository.full_name(), %summary, "sync blocked pending approval");
        Ok(SyncOutcome::Blocked(report))
    }
}
