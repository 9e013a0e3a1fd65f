use anyhow::{Context, Result};
use mirror_guard_store::{MirrorStore, NewRepository};

use crate::config::AppConfig;

/// Register `owner/name` for mirroring.
pub fn add(
    store: &MirrorStore,
    config: &AppConfig,
    full_name: &str,
    mirror_owner: Option<String>,
    clone_url: Option<String>,
) -> Result<()> {
    let (owner, name) = full_name
        .split_once('/')
        .filter(|(o, n)| !o.is_empty() && !n.is_empty() && !n.contains('/'))
        .with_context(|| format!("expected <owner>/<name>, got {full_name:?}"))?;

    let mirror_owner = mirror_owner
        .or_else(|| config.mirror.default_owner.clone())
        .unwrap_or_else(|| owner.to_owned());
    let clone_url = clone_url.unwrap_or_else(|| config.mirror_clone_url(&mirror_owner, name));

    let repo = store.add_repository(&NewRepository {
        user_id: config.user_id.clone(),
        owner: owner.to_owned(),
        name: name.to_owned(),
        mirror_owner,
        clone_url,
    })?;

    println!(
        "Added {} as #{} (mirror: {}/{})",
        repo.full_name(),
        repo.id,
        repo.mirror_owner,
        repo.name
    );
    Ok(())
}

pub fn list(store: &MirrorStore) -> Result<()> {
    let repos = store.list_repositories()?;
    if repos.is_empty() {
        println!("No repositories registered.");
        return Ok(());
    }

    let name_width = repos
        .iter()
        .map(|r| r.full_name().chars().count())
        .max()
        .unwrap_or(0);

    for repo in &repos {
        let note = repo
            .error_message
            .as_deref()
            .map(|m| format!("  {m}"))
            .unwrap_or_default();
        println!(
            "{:>4}  {:<width$}  {:<16}{note}",
            repo.id,
            repo.full_name(),
            repo.status.as_str(),
            width = name_width
        );
    }
    Ok(())
}
