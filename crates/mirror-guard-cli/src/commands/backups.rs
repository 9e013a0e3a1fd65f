use anyhow::{Context, Result};
use mirror_guard::{BackupManager, list_backups};
use mirror_guard_store::MirrorStore;

use super::format;
use crate::config::AppConfig;

/// List the snapshots of one repository, newest first.
pub fn run(store: &MirrorStore, backups: &BackupManager, config: &AppConfig, id: &str) -> Result<()> {
    let repo = store
        .get_repository(id)?
        .with_context(|| format!("no repository with id {id}"))?;

    let dir = backups.repository_dir(
        Some(&config.backup),
        &repo.user_id,
        &repo.mirror_owner,
        &repo.name,
    );
    let mut found = list_backups(&dir)
        .with_context(|| format!("failed to read {}", dir.display()))?;

    if found.is_empty() {
        println!("No snapshots for {} in {}", repo.full_name(), dir.display());
        return Ok(());
    }

    found.reverse();
    for backup in &found {
        let size = std::fs::metadata(&backup.bundle_path)
            .map(|m| format::size(m.len()))
            .unwrap_or_else(|_| "?".into());
        println!(
            "{}  {:>10}  {}",
            format::datetime(backup.created_at),
            size,
            backup.bundle_path.display()
        );
    }
    println!("\n{} snapshot(s)", found.len());
    Ok(())
}
