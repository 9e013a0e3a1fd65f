use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use mirror_guard::{
    ApprovalAction, ApprovalWorkflow, BackupConfigSource, BackupManager, EnvOverrides, Hosts,
    MirrorSyncer, MirrorTransport, SyncGuard,
};
use mirror_guard_hosts::{GitHubClient, GiteaClient};
use mirror_guard_store::MirrorStore;

use crate::bundle::GitBundleWriter;
use crate::config::AppConfig;
use crate::transport::{CommandTransport, UnconfiguredTransport};

/// Everything a command needs, wired from the configuration.
pub struct App {
    pub config: AppConfig,
    pub store: Arc<MirrorStore>,
    pub backups: Arc<BackupManager>,
    pub guard: Arc<SyncGuard>,
}

fn cache_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir().context("could not determine cache directory")?;
    let dir = base.join("mirror-guard");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create cache directory: {}", dir.display()))?;
    Ok(dir)
}

fn db_path() -> Result<PathBuf> {
    Ok(cache_dir()?.join("mirror-guard.db"))
}

impl App {
    pub fn build(config: AppConfig) -> Result<Self> {
        let path = db_path()?;
        let store = MirrorStore::open(&path)
            .with_context(|| format!("failed to open store at {}", path.display()))?;

        let cwd = std::env::current_dir().context("could not determine working directory")?;
        let backups = Arc::new(BackupManager::new(
            Arc::new(GitBundleWriter::new()),
            EnvOverrides::from_env(),
            cwd,
        ));

        let github = Arc::new(GitHubClient::new(config.github()));
        let hosts = Hosts {
            source: github.clone(),
            comparer: github,
            mirror: Arc::new(GiteaClient::new(config.gitea())),
        };
        let guard = Arc::new(
            SyncGuard::new(hosts, backups.clone()).with_settings(config.detection_settings()),
        );

        Ok(Self {
            config,
            store: Arc::new(store),
            backups,
            guard,
        })
    }

    fn configs(&self) -> Arc<dyn BackupConfigSource> {
        Arc::new(self.config.backup.clone())
    }

    fn transport(&self) -> Result<CommandTransport> {
        let argv = self
            .config
            .mirror_command
            .clone()
            .context("mirror_command is not set in the configuration")?;
        CommandTransport::new(argv).context("mirror_command must name a program")
    }

    fn syncer_with(&self, transport: Arc<dyn MirrorTransport>) -> Arc<MirrorSyncer> {
        Arc::new(MirrorSyncer::new(
            self.guard.clone(),
            self.store.clone(),
            self.store.clone(),
            self.configs(),
            transport,
        ))
    }

    /// A syncer pushing through the configured `mirror_command`.
    pub fn syncer(&self) -> Result<Arc<MirrorSyncer>> {
        Ok(self.syncer_with(Arc::new(self.transport()?)))
    }

    /// The approval workflow. Dismissing never syncs, so it works without
    /// a `mirror_command`.
    pub fn approval(&self, action: ApprovalAction) -> Result<ApprovalWorkflow> {
        let syncer = match action {
            ApprovalAction::Approve => self.syncer()?,
            ApprovalAction::Dismiss => self.syncer_with(Arc::new(UnconfiguredTransport)),
        };

        Ok(ApprovalWorkflow::new(
            self.store.clone(),
            self.store.clone(),
            self.configs(),
            self.backups.clone(),
            syncer,
        ))
    }
}
