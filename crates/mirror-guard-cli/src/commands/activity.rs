use anyhow::Result;
use mirror_guard_store::MirrorStore;

use super::format;

/// Print recent activity, newest first.
pub fn run(store: &MirrorStore, repository_id: Option<&str>, limit: usize, details: bool) -> Result<()> {
    let records = store.list_activities(repository_id, limit)?;
    if records.is_empty() {
        println!("No activity recorded.");
        return Ok(());
    }

    for record in &records {
        println!(
            "{}  #{:<4} {:<16} {}",
            format::timestamp(record.created_at),
            record.repository_id,
            record.status.as_str(),
            record.message
        );
        if details && let Some(json) = &record.details {
            println!("      {json}");
        }
    }
    Ok(())
}
