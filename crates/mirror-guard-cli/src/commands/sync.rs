use anyhow::{Context, Result};
use mirror_guard::{BackupOutcome, MirrorSyncer, SyncOptions, SyncOutcome};
use mirror_guard_store::MirrorStore;

/// Sync the given repositories, or every schedulable one when none are given.
pub async fn run(store: &MirrorStore, syncer: &MirrorSyncer, ids: &[String]) -> Result<()> {
    let repos = if ids.is_empty() {
        store.list_schedulable()?
    } else {
        let mut repos = Vec::with_capacity(ids.len());
        for id in ids {
            let repo = store
                .get_repository(id)?
                .with_context(|| format!("no repository with id {id}"))?;
            repos.push(repo);
        }
        repos
    };

    if repos.is_empty() {
        println!("Nothing to sync.");
        return Ok(());
    }

    let total = repos.len();
    let mut synced = 0usize;
    let mut failed = 0usize;
    let mut blocked = 0usize;

    for repo in &repos {
        if !repo.status.is_schedulable() {
            eprintln!(
                "skipping {}: repository is {}",
                repo.full_name(),
                repo.status
            );
            continue;
        }

        println!("Syncing {}...", repo.full_name());
        match syncer.run(repo, SyncOptions::default()).await {
            Ok(SyncOutcome::Synced(report)) => {
                if let BackupOutcome::Created(backup) = &report.backup {
                    println!("  snapshot: {}", backup.bundle_path.display());
                }
                synced += 1;
                println!("  synced");
            }
            Ok(SyncOutcome::Blocked(report)) => {
                blocked += 1;
                if let Some(detection) = &report.detection {
                    super::format::print_detection(detection);
                }
                println!(
                    "  blocked: run `mirror-guard approve {}` or `mirror-guard dismiss {}`",
                    repo.id, repo.id
                );
            }
            Err(e) => {
                failed += 1;
                eprintln!("warning: sync failed for {}: {e}", repo.full_name());
            }
        }
    }

    if failed == total {
        anyhow::bail!("all {total} repositories failed to sync");
    }
    if synced < total {
        eprintln!("{synced} synced, {blocked} blocked, {failed} failed");
    }
    Ok(())
}
