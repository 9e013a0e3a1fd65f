use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backup::{BackupManager, BackupOutcome, BackupRequest};
use crate::branch::DetectionResult;
use crate::guard::SyncOptions;
use crate::repository::{
    ActivityEntry, ActivitySink, BackupConfigSource, Repository, RepositoryStatus,
    RepositoryStore,
};
use crate::sync::{MirrorSyncer, SyncOutcome};

/// What to do with repositories held for approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalAction {
    /// Snapshot, then sync despite the detected force-push.
    Approve,
    /// Drop the alert and return to the normal schedule without syncing.
    Dismiss,
}

impl ApprovalAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approve" => Some(Self::Approve),
            "dismiss" => Some(Self::Dismiss),
            _ => None,
        }
    }
}

impl fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => write!(f, "approve"),
            Self::Dismiss => write!(f, "dismiss"),
        }
    }
}

/// Client-side mistakes in an approval request.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("repositoryIds must be a non-empty list")]
    MissingRepositoryIds,

    #[error("action must be \"approve\" or \"dismiss\", got {0:?}")]
    InvalidAction(String),
}

/// Body of an `approve-sync` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveSyncRequest {
    #[serde(default)]
    pub repository_ids: Vec<String>,
    #[serde(default)]
    pub action: Option<String>,
}

impl ApproveSyncRequest {
    pub fn new(repository_ids: Vec<String>, action: ApprovalAction) -> Self {
        Self {
            repository_ids,
            action: Some(action.to_string()),
        }
    }

    /// Check the request. Blank and repeated ids are dropped.
    pub fn validate(&self) -> Result<(Vec<String>, ApprovalAction), ValidationError> {
        let mut ids: Vec<String> = Vec::with_capacity(self.repository_ids.len());
        for id in &self.repository_ids {
            let id = id.trim();
            if !id.is_empty() && !ids.iter().any(|seen| seen == id) {
                ids.push(id.to_owned());
            }
        }
        if ids.is_empty() {
            return Err(ValidationError::MissingRepositoryIds);
        }

        let raw = self.action.as_deref().unwrap_or_default();
        let action =
            ApprovalAction::parse(raw).ok_or_else(|| ValidationError::InvalidAction(raw.to_owned()))?;

        Ok((ids, action))
    }
}

/// New status of one repository acted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryStatusUpdate {
    pub id: String,
    pub status: RepositoryStatus,
}

/// Response of an `approve-sync` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveSyncResponse {
    pub success: bool,
    pub message: String,
    pub repositories: Vec<RepositoryStatusUpdate>,
}

/// Applies approve / dismiss decisions to repositories in `pending-approval`.
pub struct ApprovalWorkflow {
    store: Arc<dyn RepositoryStore>,
    activity: Arc<dyn ActivitySink>,
    configs: Arc<dyn BackupConfigSource>,
    backups: Arc<BackupManager>,
    syncer: Arc<MirrorSyncer>,
}

impl ApprovalWorkflow {
    pub fn new(
        store: Arc<dyn RepositoryStore>,
        activity: Arc<dyn ActivitySink>,
        configs: Arc<dyn BackupConfigSource>,
        backups: Arc<BackupManager>,
        syncer: Arc<MirrorSyncer>,
    ) -> Self {
        Self {
            store,
            activity,
            configs,
            backups,
            syncer,
        }
    }

    /// Handle an `approve-sync` request.
    ///
    /// Ids that do not name a repository in `pending-approval` are left out;
    /// a failure on one repository never stops the others.
    pub async fn handle(
        &self,
        request: &ApproveSyncRequest,
    ) -> Result<ApproveSyncResponse, ValidationError> {
        let (ids, action) = request.validate()?;

        let mut updates = Vec::new();
        for id in &ids {
            let repository = match self.store.get(id).await {
                Ok(Some(repo)) if repo.status == RepositoryStatus::PendingApproval => repo,
                Ok(Some(repo)) => {
                    tracing::debug!(id = %id, status = %repo.status, "not pending approval, skipping");
                    continue;
                }
                Ok(None) => {
                    tracing::debug!(id = %id, "unknown repository, skipping");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "could not load repository");
                    continue;
                }
            };

            let status = match action {
                ApprovalAction::Approve => self.approve(&repository).await,
                ApprovalAction::Dismiss => self.dismiss(&repository).await,
            };

            if let Some(status) = status {
                updates.push(RepositoryStatusUpdate {
                    id: repository.id.clone(),
                    status,
                });
            }
        }

        let verb = match action {
            ApprovalAction::Approve => "Approved sync for",
            ApprovalAction::Dismiss => "Dismissed force-push alert for",
        };

        Ok(ApproveSyncResponse {
            success: true,
            message: format!("{verb} {} repository(ies)", updates.len()),
            repositories: updates,
        })
    }

    async fn approve(&self, repository: &Repository) -> Option<RepositoryStatus> {
        let config = self.configs.backup_config(&repository.user_id).await;
        let detection = DetectionResult::skipped("sync approved by user");

        let backup = self
            .backups
            .maybe_backup(
                config.as_ref(),
                BackupRequest {
                    user_id: &repository.user_id,
                    owner: &repository.mirror_owner,
                    repo_name: &repository.name,
                    clone_url: &repository.clone_url,
                    detection: &detection,
                    force: true,
                },
            )
            .await;

        let backup_note = match backup {
            Ok(BackupOutcome::Created(descriptor)) => {
                format!("backup saved to {}", descriptor.bundle_path.display())
            }
            Ok(BackupOutcome::NotNeeded) => "no backup taken".to_owned(),
            Ok(BackupOutcome::Failed(msg)) => {
                tracing::warn!(repo = %repository.full_name(), error = %msg, "backup before approved sync failed");
                format!("backup failed: {msg}")
            }
            Err(e) => {
                tracing::warn!(repo = %repository.full_name(), error = %e, "backup before approved sync failed");
                format!("backup failed: {e}")
            }
        };

        if let Err(e) = self
            .store
            .update_status(&repository.id, RepositoryStatus::Syncing, None)
            .await
        {
            tracing::warn!(repo = %repository.full_name(), error = %e, "could not mark repository as syncing");
            return None;
        }

        self.activity
            .record(ActivityEntry::for_repository(
                repository,
                RepositoryStatus::Syncing,
                format!("Force-push sync approved by user ({backup_note})"),
            ))
            .await;

        match self.syncer.run(repository, SyncOptions::approved()).await {
            Ok(SyncOutcome::Synced(_)) => Some(RepositoryStatus::Synced),
            Ok(SyncOutcome::Blocked(_)) => Some(RepositoryStatus::PendingApproval),
            Err(e) => {
                tracing::warn!(repo = %repository.full_name(), error = %e, "approved sync failed");
                Some(RepositoryStatus::Error)
            }
        }
    }

    async fn dismiss(&self, repository: &Repository) -> Option<RepositoryStatus> {
        if let Err(e) = self
            .store
            .update_status(&repository.id, RepositoryStatus::Synced, None)
            .await
        {
            tracing::warn!(repo = %repository.full_name(), error = %e, "could not dismiss alert");
            return None;
        }

        self.activity
            .record(ActivityEntry::for_repository(
                repository,
                RepositoryStatus::Synced,
                "Force-push alert dismissed by user",
            ))
            .await;

        Some(RepositoryStatus::Synced)
    }
}
