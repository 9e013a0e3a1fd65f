use std::sync::Arc;

use crate::backup::{BackupManager, BackupOutcome, BackupRequest};
use crate::branch::DetectionResult;
use crate::detect::{DetectionSettings, Detector};
use crate::host::{BranchLister, CommitComparer};
use crate::repository::Repository;
use crate::strategy::{BackupConfig, ProtectionStrategy, resolve_strategy};

/// Per-attempt switches for a sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Do not run force-push detection (the change was already approved).
    pub skip_detection: bool,
    /// Do not consider a snapshot (one was already taken for this attempt).
    pub skip_backup: bool,
}

impl SyncOptions {
    /// Options for a sync a user explicitly approved after a snapshot.
    pub fn approved() -> Self {
        Self {
            skip_detection: true,
            skip_backup: true,
        }
    }
}

/// What the guard decided about a sync attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The sync may push to the mirror.
    Proceed,
    /// Force-push detected under a blocking strategy; wait for approval.
    Block,
    /// The snapshot failed and the configuration forbids syncing without one.
    BackupFailed,
}

/// Everything the guard found out before a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardReport {
    pub strategy: ProtectionStrategy,
    /// `None` when detection was not needed or was skipped on request.
    pub detection: Option<DetectionResult>,
    pub backup: BackupOutcome,
    pub verdict: Verdict,
}

impl GuardReport {
    pub fn detected(&self) -> bool {
        self.detection.as_ref().is_some_and(DetectionResult::detected)
    }
}

/// The host capabilities detection needs.
#[derive(Clone)]
pub struct Hosts {
    pub source: Arc<dyn BranchLister>,
    pub comparer: Arc<dyn CommitComparer>,
    pub mirror: Arc<dyn BranchLister>,
}

/// Decides, before a mirror sync, whether to snapshot and whether to block.
pub struct SyncGuard {
    hosts: Hosts,
    backups: Arc<BackupManager>,
    settings: DetectionSettings,
}

impl SyncGuard {
    pub fn new(hosts: Hosts, backups: Arc<BackupManager>) -> Self {
        Self {
            hosts,
            backups,
            settings: DetectionSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: DetectionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    /// Run detection if needed and compare the mirror with the source.
    pub async fn detect(&self, repository: &Repository) -> DetectionResult {
        Detector::new(
            self.hosts.source.as_ref(),
            self.hosts.comparer.as_ref(),
            self.hosts.mirror.as_ref(),
        )
        .with_settings(self.settings)
        .detect(&repository.detection_target())
        .await
    }

    /// Evaluate one sync attempt. Writes nothing but the snapshot itself.
    pub async fn evaluate(
        &self,
        repository: &Repository,
        config: Option<&BackupConfig>,
        options: SyncOptions,
    ) -> GuardReport {
        let strategy = resolve_strategy(config, self.backups.env());

        let detection = if strategy.needs_detection() && !options.skip_detection {
            Some(self.detect(repository).await)
        } else {
            None
        };

        let detected = detection.as_ref().is_some_and(DetectionResult::detected);
        if let Some(result) = &detection {
            tracing::info!(
                repo = %repository.full_name(),
                strategy = %strategy,
                detected,
                skipped = result.is_skipped(),
                "force-push detection finished"
            );
        }

        let not_run = DetectionResult::clean();
        let backup = if options.skip_backup {
            Ok(BackupOutcome::NotNeeded)
        } else {
            self.backups
                .maybe_backup(
                    config,
                    BackupRequest {
                        user_id: &repository.user_id,
                        owner: &repository.mirror_owner,
                        repo_name: &repository.name,
                        clone_url: &repository.clone_url,
                        detection: detection.as_ref().unwrap_or(&not_run),
                        force: false,
                    },
                )
                .await
        };

        let (backup, verdict) = match backup {
            Err(e) => (BackupOutcome::Failed(e.to_string()), Verdict::BackupFailed),
            Ok(backup) if strategy.should_block_sync(detected) => (backup, Verdict::Block),
            Ok(backup) => (backup, Verdict::Proceed),
        };

        GuardReport {
            strategy,
            detection,
            backup,
            verdict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryStatus;
    use crate::strategy::EnvOverrides;
    use crate::test_support::{InMemoryHost, RecordingBundleWriter};

    struct Fixture {
        source: Arc<InMemoryHost>,
        mirror: Arc<InMemoryHost>,
        writer: Arc<RecordingBundleWriter>,
        guard: SyncGuard,
        dir: std::path::PathBuf,
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    fn fixture(name: &str, writer: RecordingBundleWriter) -> Fixture {
        let dir = std::env::temp_dir().join(format!("mirror-guard-test-guard-{name}"));
        let _ = std::fs::remove_dir_all(&dir);

        let source = Arc::new(InMemoryHost::new("github").with_repo("acme", "web", &[("main", "new")]));
        let mirror = Arc::new(InMemoryHost::new("gitea").with_repo("mirror", "web", &[("main", "old")]));
        let writer = Arc::new(writer);
        let backups = Arc::new(BackupManager::new(writer.clone(), EnvOverrides::default(), &dir));
        let guard = SyncGuard::new(
            Hosts {
                source: source.clone(),
                comparer: source.clone(),
                mirror: mirror.clone(),
            },
            backups,
        );

        Fixture {
            source,
            mirror,
            writer,
            guard,
            dir,
        }
    }

    fn repository() -> Repository {
        Repository {
            id: "r1".into(),
            user_id: "u1".into(),
            owner: "acme".into(),
            name: "web".into(),
            mirror_owner: "mirror".into(),
            clone_url: "https://mirror.example/mirror/web.git".into(),
            status: RepositoryStatus::Synced,
            error_message: None,
        }
    }

    fn config(strategy: ProtectionStrategy) -> BackupConfig {
        BackupConfig::with_strategy(strategy)
    }

    #[tokio::test]
    async fn disabled_strategy_skips_everything() {
        let f = fixture("disabled", RecordingBundleWriter::default());
        f.source.set_fast_forward("old", "new", false);

        let report = f
            .guard
            .evaluate(&repository(), Some(&config(ProtectionStrategy::Disabled)), SyncOptions::default())
            .await;

        assert_eq!(report.verdict, Verdict::Proceed);
        assert_eq!(report.detection, None);
        assert_eq!(report.backup, BackupOutcome::NotNeeded);
        assert_eq!(f.mirror.list_calls(), 0, "disabled strategy must not query hosts");
    }

    #[tokio::test]
    async fn always_strategy_backs_up_without_detecting() {
        let f = fixture("always", RecordingBundleWriter::default());

        let report = f
            .guard
            .evaluate(&repository(), Some(&config(ProtectionStrategy::Always)), SyncOptions::default())
            .await;

        assert_eq!(report.verdict, Verdict::Proceed);
        assert_eq!(report.detection, None);
        assert!(matches!(report.backup, BackupOutcome::Created(_)));
        assert_eq!(f.mirror.list_calls(), 0);
    }

    #[tokio::test]
    async fn on_force_push_fast_forward_proceeds_without_backup() {
        let f = fixture("ff", RecordingBundleWriter::default());
        f.source.set_fast_forward("old", "new", true);

        let report = f
            .guard
            .evaluate(&repository(), Some(&config(ProtectionStrategy::OnForcePush)), SyncOptions::default())
            .await;

        assert_eq!(report.verdict, Verdict::Proceed);
        assert!(!report.detected());
        assert_eq!(report.backup, BackupOutcome::NotNeeded);
        assert!(f.writer.written().is_empty());
    }

    #[tokio::test]
    async fn on_force_push_rewrite_backs_up_and_proceeds() {
        let f = fixture("rewrite", RecordingBundleWriter::default());
        f.source.set_fast_forward("old", "new", false);

        let report = f
            .guard
            .evaluate(&repository(), Some(&config(ProtectionStrategy::OnForcePush)), SyncOptions::default())
            .await;

        assert_eq!(report.verdict, Verdict::Proceed);
        assert!(report.detected());
        let BackupOutcome::Created(descriptor) = &report.backup else {
            panic!("expected snapshot, got {:?}", report.backup);
        };
        assert!(descriptor.bundle_path.starts_with(f.dir.join("data/repo-backups/u1/mirror/web")));
    }

    #[tokio::test]
    async fn block_strategy_rewrite_blocks_after_backup() {
        let f = fixture("block", RecordingBundleWriter::default());
        f.source.set_fast_forward("old", "new", false);

        let report = f
            .guard
            .evaluate(
                &repository(),
                Some(&config(ProtectionStrategy::BlockOnForcePush)),
                SyncOptions::default(),
            )
            .await;

        assert_eq!(report.verdict, Verdict::Block);
        assert!(matches!(report.backup, BackupOutcome::Created(_)));
    }

    #[tokio::test]
    async fn skipped_detection_never_blocks() {
        let f = fixture("skipped", RecordingBundleWriter::default());
        f.mirror.remove_repo("mirror", "web");

        let report = f
            .guard
            .evaluate(
                &repository(),
                Some(&config(ProtectionStrategy::BlockOnForcePush)),
                SyncOptions::default(),
            )
            .await;

        assert_eq!(report.verdict, Verdict::Proceed);
        assert!(report.detection.as_ref().unwrap().is_skipped());
        assert_eq!(report.backup, BackupOutcome::NotNeeded);
    }

    #[tokio::test]
    async fn approved_sync_skips_detection_and_backup() {
        let f = fixture("approved", RecordingBundleWriter::default());
        f.source.set_fast_forward("old", "new", false);

        let report = f
            .guard
            .evaluate(
                &repository(),
                Some(&config(ProtectionStrategy::BlockOnForcePush)),
                SyncOptions::approved(),
            )
            .await;

        assert_eq!(report.verdict, Verdict::Proceed);
        assert_eq!(report.detection, None);
        assert_eq!(report.backup, BackupOutcome::NotNeeded);
        assert_eq!(f.mirror.list_calls(), 0);
    }

    #[tokio::test]
    async fn failing_backup_blocks_when_configured() {
        let f = fixture("backup-fails", RecordingBundleWriter::failing("disk full"));
        f.source.set_fast_forward("old", "new", false);

        let report = f
            .guard
            .evaluate(&repository(), Some(&config(ProtectionStrategy::OnForcePush)), SyncOptions::default())
            .await;

        assert_eq!(report.verdict, Verdict::BackupFailed);
        assert!(matches!(&report.backup, BackupOutcome::Failed(msg) if msg.contains("disk full")));
    }
}
