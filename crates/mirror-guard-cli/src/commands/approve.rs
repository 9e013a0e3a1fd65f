use anyhow::Result;
use mirror_guard::{ApprovalAction, ApprovalWorkflow, ApproveSyncRequest};

/// Approve or dismiss held repositories.
pub async fn run(workflow: &ApprovalWorkflow, ids: Vec<String>, action: ApprovalAction) -> Result<()> {
    let response = workflow
        .handle(&ApproveSyncRequest::new(ids, action))
        .await?;

    println!("{}", response.message);
    for update in &response.repositories {
        println!("  #{}: {}", update.id, update.status);
    }
    Ok(())
}
