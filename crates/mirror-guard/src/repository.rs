use std::fmt;

use serde::{Deserialize, Serialize};

use crate::detect::DetectionTarget;
use crate::strategy::BackupConfig;

/// Lifecycle state of a mirrored repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepositoryStatus {
    /// Registered but never mirrored.
    Imported,
    /// Reserved for a mirror created but never synced. Nothing sets it yet;
    /// stored rows may still carry it, and it stays schedulable.
    Mirrored,
    Syncing,
    Synced,
    /// Held back until someone approves or dismisses a force-push alert.
    PendingApproval,
    Error,
}

impl RepositoryStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "imported" => Some(Self::Imported),
            "mirrored" => Some(Self::Mirrored),
            "syncing" => Some(Self::Syncing),
            "synced" => Some(Self::Synced),
            "pending-approval" => Some(Self::PendingApproval),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Imported => "imported",
            Self::Mirrored => "mirrored",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::PendingApproval => "pending-approval",
            Self::Error => "error",
        }
    }

    /// Whether the scheduler may start a sync from this state.
    pub fn is_schedulable(self) -> bool {
        !matches!(self, Self::PendingApproval | Self::Syncing)
    }
}

impl fmt::Display for RepositoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A repository mirrored from the source host to the mirror host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub id: String,
    pub user_id: String,
    /// Owner on the source host.
    pub owner: String,
    pub name: String,
    /// Owner (user or organization) on the mirror host.
    pub mirror_owner: String,
    /// Clone URL of the mirror, used to snapshot its current history.
    pub clone_url: String,
    pub status: RepositoryStatus,
    pub error_message: Option<String>,
}

impl Repository {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn detection_target(&self) -> DetectionTarget {
        DetectionTarget {
            source_owner: self.owner.clone(),
            mirror_owner: self.mirror_owner.clone(),
            repo: self.name.clone(),
        }
    }
}

/// Errors from the repository store.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Read and write access to repository rows.
#[async_trait::async_trait]
pub trait RepositoryStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Repository>, RepositoryError>;

    /// Set the status of a repository. `error_message` replaces the stored
    /// message; `None` clears it.
    async fn update_status(
        &self,
        id: &str,
        status: RepositoryStatus,
        error_message: Option<&str>,
    ) -> Result<(), RepositoryError>;
}

/// One entry of the activity log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    pub user_id: String,
    pub repository_id: String,
    pub message: String,
    pub details: Option<String>,
    pub status: RepositoryStatus,
}

impl ActivityEntry {
    pub fn for_repository(
        repository: &Repository,
        status: RepositoryStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id: repository.user_id.clone(),
            repository_id: repository.id.clone(),
            message: message.into(),
            details: None,
            status,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Where audit entries go. Recording never fails from the caller's view.
#[async_trait::async_trait]
pub trait ActivitySink: Send + Sync {
    async fn record(&self, entry: ActivityEntry);
}

/// Supplies the backup configuration of a user.
#[async_trait::async_trait]
pub trait BackupConfigSource: Send + Sync {
    async fn backup_config(&self, user_id: &str) -> Option<BackupConfig>;
}

/// A single configuration shared by every user.
#[async_trait::async_trait]
impl BackupConfigSource for BackupConfig {
    async fn backup_config(&self, _user_id: &str) -> Option<BackupConfig> {
        Some(self.clone())
    }
}
