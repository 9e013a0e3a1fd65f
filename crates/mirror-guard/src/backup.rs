use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use time::OffsetDateTime;

use crate::branch::DetectionResult;
use crate::path::{
    bundle_file_name, is_bundle_file, parse_bundle_file_name, repository_backup_dir,
    resolve_backup_root,
};
use crate::strategy::{
    BackupConfig, EnvOverrides, ProtectionStrategy, resolve_strategy, retention_count,
};

/// Errors that can occur while taking a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("bundle creation failed: {0}")]
    Bundle(String),
}

impl From<std::io::Error> for BackupError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Writes a self-contained bundle of every ref of a repository.
#[async_trait::async_trait]
pub trait BundleWriter: Send + Sync {
    /// Create `dest` from the repository at `clone_url`. The parent
    /// directory of `dest` already exists.
    async fn write_bundle(&self, clone_url: &str, dest: &Path) -> Result<(), BackupError>;
}

/// A snapshot on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupDescriptor {
    pub bundle_path: PathBuf,
    pub created_at: OffsetDateTime,
}

/// Everything needed to decide on, and take, one snapshot.
#[derive(Debug, Clone, Copy)]
pub struct BackupRequest<'a> {
    pub user_id: &'a str,
    pub owner: &'a str,
    pub repo_name: &'a str,
    pub clone_url: &'a str,
    pub detection: &'a DetectionResult,
    /// Take the snapshot whatever the strategy says.
    pub force: bool,
}

/// What happened when a snapshot was considered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    Created(BackupDescriptor),
    /// The strategy did not call for a snapshot.
    NotNeeded,
    /// The snapshot failed but the sync may continue.
    Failed(String),
}

/// Decides whether to snapshot a repository and takes the snapshot.
pub struct BackupManager {
    writer: Arc<dyn BundleWriter>,
    env: EnvOverrides,
    cwd: PathBuf,
}

impl BackupManager {
    pub fn new(writer: Arc<dyn BundleWriter>, env: EnvOverrides, cwd: impl Into<PathBuf>) -> Self {
        Self {
            writer,
            env,
            cwd: cwd.into(),
        }
    }

    pub fn env(&self) -> &EnvOverrides {
        &self.env
    }

    /// Directory holding the snapshots of one repository under `config`.
    pub fn repository_dir(
        &self,
        config: Option<&BackupConfig>,
        user_id: &str,
        owner: &str,
        repo_name: &str,
    ) -> PathBuf {
        let root = resolve_backup_root(
            config.and_then(|c| c.backup_directory.as_deref()),
            &self.env,
            &self.cwd,
        );
        repository_backup_dir(&root, user_id, owner, repo_name)
    }

    /// Snapshot the repository if the strategy (or `force`) asks for it.
    ///
    /// A failed snapshot is returned as an error only when the configuration
    /// blocks syncs on backup failure and the strategy is `always` or
    /// `on-force-push`. Otherwise it is logged and reported as
    /// [`BackupOutcome::Failed`].
    pub async fn maybe_backup(
        &self,
        config: Option<&BackupConfig>,
        request: BackupRequest<'_>,
    ) -> Result<BackupOutcome, BackupError> {
        let strategy = resolve_strategy(config, &self.env);

        if !request.force && !strategy.should_backup(request.detection.detected()) {
            return Ok(BackupOutcome::NotNeeded);
        }

        match self.snapshot(config, &request).await {
            Ok(descriptor) => Ok(BackupOutcome::Created(descriptor)),
            Err(e) => {
                let block_on_failure = config.map_or(true, BackupConfig::block_on_backup_failure);
                let blocking_strategy = matches!(
                    strategy,
                    ProtectionStrategy::Always | ProtectionStrategy::OnForcePush
                );

                if block_on_failure && blocking_strategy {
                    tracing::error!(
                        owner = request.owner,
                        repo = request.repo_name,
                        error = %e,
                        "snapshot failed, sync will be blocked"
                    );
                    return Err(e);
                }

                tracing::warn!(
                    owner = request.owner,
                    repo = request.repo_name,
                    error = %e,
                    "snapshot failed, continuing without backup"
                );
                Ok(BackupOutcome::Failed(e.to_string()))
            }
        }
    }

    async fn snapshot(
        &self,
        config: Option<&BackupConfig>,
        request: &BackupRequest<'_>,
    ) -> Result<BackupDescriptor, BackupError> {
        let dir = self.repository_dir(config, request.user_id, request.owner, request.repo_name);
        tokio::fs::create_dir_all(&dir).await?;

        let created_at = OffsetDateTime::now_utc();
        let bundle_path = dir.join(bundle_file_name(created_at));

        self.writer
            .write_bundle(request.clone_url, &bundle_path)
            .await?;

        tracing::info!(path = %bundle_path.display(), "snapshot created");

        let keep = retention_count(config, &self.env);
        let prune_dir = dir.clone();
        match tokio::task::spawn_blocking(move || prune_backups(&prune_dir, keep)).await {
            Ok(Ok(removed)) if !removed.is_empty() => {
                tracing::debug!(removed = removed.len(), keep, "pruned old snapshots");
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::warn!(dir = %dir.display(), error = %e, "could not prune old snapshots")
            }
            Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "snapshot pruning task failed"),
        }

        Ok(BackupDescriptor {
            bundle_path,
            created_at,
        })
    }
}

/// Snapshots in `dir`, oldest first. A missing directory has no snapshots.
///
/// Ordered by the creation time in the file name, ties broken by file name.
/// Bundles whose name carries no timestamp fall back to modification time.
pub fn list_backups(dir: &Path) -> std::io::Result<Vec<BackupDescriptor>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry?;
        let bundle_path = entry.path();
        if !is_bundle_file(&bundle_path) {
            continue;
        }
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let created_at = bundle_path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(parse_bundle_file_name)
            .unwrap_or_else(|| {
                OffsetDateTime::from(metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH))
            });
        found.push(BackupDescriptor {
            bundle_path,
            created_at,
        });
    }

    found.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.bundle_path.file_name().cmp(&b.bundle_path.file_name()))
    });
    Ok(found)
}

/// Delete the oldest snapshots in `dir` so that at most `keep` remain.
/// Returns the removed paths.
pub fn prune_backups(dir: &Path, keep: usize) -> std::io::Result<Vec<PathBuf>> {
    let backups = list_backups(dir)?;
    let excess = backups.len().saturating_sub(keep.max(1));

    let mut removed = Vec::with_capacity(excess);
    for backup in backups.into_iter().take(excess) {
        std::fs::remove_file(&backup.bundle_path)?;
        removed.push(backup.bundle_path);
    }
    Ok(removed)
}
