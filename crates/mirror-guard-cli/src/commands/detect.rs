use anyhow::{Context, Result};
use mirror_guard::{ProtectionStrategy, SyncGuard, resolve_strategy};
use mirror_guard_store::MirrorStore;

use super::format;
use crate::config::AppConfig;

/// Run detection for one repository without syncing or snapshotting.
pub async fn run(store: &MirrorStore, guard: &SyncGuard, config: &AppConfig, id: &str) -> Result<()> {
    let repo = store
        .get_repository(id)?
        .with_context(|| format!("no repository with id {id}"))?;

    let strategy = resolve_strategy(Some(&config.backup), guard.backups().env());
    println!("{} (strategy: {strategy})", repo.full_name());
    if strategy == ProtectionStrategy::Disabled || strategy == ProtectionStrategy::Always {
        println!("note: detection does not run during syncs with this strategy");
    }

    let result = guard.detect(&repo).await;
    format::print_detection(&result);
    Ok(())
}
