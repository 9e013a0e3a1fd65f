use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::backup::{BackupError, BundleWriter};
use crate::branch::BranchSnapshot;
use crate::host::{BranchLister, CommitComparer, CompareStatus, HostError};
use crate::repository::{
    ActivityEntry, ActivitySink, Repository, RepositoryError, RepositoryStatus, RepositoryStore,
};
use crate::sync::MirrorTransport;

/// In-memory git host for testing. Lists branches and answers compares.
///
/// Unless told otherwise, a compare of two different commits reports
/// `ahead` and a compare of a commit with itself reports `identical`.
pub struct InMemoryHost {
    label: String,
    repos: Mutex<HashMap<(String, String), Vec<BranchSnapshot>>>,
    answers: Mutex<HashMap<(String, String), Result<CompareStatus, HostError>>>,
    listing_failure: Mutex<Option<HostError>>,
    list_calls: AtomicUsize,
}

impl InMemoryHost {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            repos: Mutex::new(HashMap::new()),
            answers: Mutex::new(HashMap::new()),
            listing_failure: Mutex::new(None),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Add a repository with `(branch, commit)` pairs, in listing order.
    pub fn with_repo(self, owner: &str, repo: &str, branches: &[(&str, &str)]) -> Self {
        self.set_branches(owner, repo, branches);
        self
    }

    pub fn set_branches(&self, owner: &str, repo: &str, branches: &[(&str, &str)]) {
        let snapshots = branches
            .iter()
            .map(|(name, commit)| BranchSnapshot::new(*name, *commit))
            .collect();
        self.repos
            .lock()
            .unwrap()
            .insert((owner.to_owned(), repo.to_owned()), snapshots);
    }

    pub fn remove_repo(&self, owner: &str, repo: &str) {
        self.repos
            .lock()
            .unwrap()
            .remove(&(owner.to_owned(), repo.to_owned()));
    }

    /// Answer compares of `base...head` as a fast-forward or a rewrite.
    pub fn set_fast_forward(&self, base: &str, head: &str, fast_forward: bool) {
        let status = if fast_forward {
            CompareStatus::Ahead
        } else {
            CompareStatus::Diverged
        };
        self.answers
            .lock()
            .unwrap()
            .insert((base.to_owned(), head.to_owned()), Ok(status));
    }

    pub fn fail_compare(&self, base: &str, head: &str, error: HostError) {
        self.answers
            .lock()
            .unwrap()
            .insert((base.to_owned(), head.to_owned()), Err(error));
    }

    /// Make every subsequent listing fail with `error`.
    pub fn fail_listing(&self, error: HostError) {
        *self.listing_failure.lock().unwrap() = Some(error);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BranchLister for InMemoryHost {
    fn label(&self) -> &str {
        &self.label
    }

    async fn list_branches(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<BranchSnapshot>, HostError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.listing_failure.lock().unwrap().clone() {
            return Err(error);
        }
        self.repos
            .lock()
            .unwrap()
            .get(&(owner.to_owned(), repo.to_owned()))
            .cloned()
            .ok_or_else(|| HostError::NotFound(format!("{owner}/{repo}")))
    }
}

#[async_trait::async_trait]
impl CommitComparer for InMemoryHost {
    async fn compare(
        &self,
        _owner: &str,
        _repo: &str,
        base: &str,
        head: &str,
    ) -> Result<CompareStatus, HostError> {
        if let Some(answer) = self
            .answers
            .lock()
            .unwrap()
            .get(&(base.to_owned(), head.to_owned()))
        {
            return answer.clone();
        }
        if base == head {
            Ok(CompareStatus::Identical)
        } else {
            Ok(CompareStatus::Ahead)
        }
    }
}

/// A host that takes `delay` to list anything.
pub struct SlowHost {
    delay: Duration,
}

impl SlowHost {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait::async_trait]
impl BranchLister for SlowHost {
    fn label(&self) -> &str {
        "slow"
    }

    async fn list_branches(
        &self,
        _owner: &str,
        _repo: &str,
    ) -> Result<Vec<BranchSnapshot>, HostError> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }
}

/// Bundle writer that writes a placeholder file and remembers each call.
#[derive(Default)]
pub struct RecordingBundleWriter {
    failure: Option<String>,
    written: Mutex<Vec<(String, PathBuf)>>,
}

impl RecordingBundleWriter {
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            written: Mutex::new(Vec::new()),
        }
    }

    /// `(clone_url, bundle_path)` of every successful write, in order.
    pub fn written(&self) -> Vec<(String, PathBuf)> {
        self.written.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl BundleWriter for RecordingBundleWriter {
    async fn write_bundle(&self, clone_url: &str, dest: &Path) -> Result<(), BackupError> {
        if let Some(message) = &self.failure {
            return Err(BackupError::Bundle(message.clone()));
        }
        tokio::fs::write(dest, format!("bundle of {clone_url}\n")).await?;
        self.written
            .lock()
            .unwrap()
            .push((clone_url.to_owned(), dest.to_path_buf()));
        Ok(())
    }
}

/// Repository store backed by a map. Remembers every status written.
#[derive(Default)]
pub struct InMemoryRepositoryStore {
    repos: Mutex<HashMap<String, Repository>>,
    history: Mutex<Vec<(String, RepositoryStatus)>>,
    update_failure: Mutex<Option<String>>,
}

impl InMemoryRepositoryStore {
    pub fn insert(&self, repository: Repository) {
        self.repos
            .lock()
            .unwrap()
            .insert(repository.id.clone(), repository);
    }

    pub fn repository(&self, id: &str) -> Option<Repository> {
        self.repos.lock().unwrap().get(id).cloned()
    }

    pub fn status(&self, id: &str) -> Option<RepositoryStatus> {
        self.repository(id).map(|r| r.status)
    }

    /// Make every subsequent status write fail with a storage error.
    pub fn fail_updates(&self, message: impl Into<String>) {
        *self.update_failure.lock().unwrap() = Some(message.into());
    }

    /// Statuses written for `id`, in order.
    pub fn history(&self, id: &str) -> Vec<RepositoryStatus> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|(repo_id, _)| repo_id == id)
            .map(|(_, status)| *status)
            .collect()
    }
}

#[async_trait::async_trait]
impl RepositoryStore for InMemoryRepositoryStore {
    async fn get(&self, id: &str) -> Result<Option<Repository>, RepositoryError> {
        Ok(self.repository(id))
    }

    async fn update_status(
        &self,
        id: &str,
        status: RepositoryStatus,
        error_message: Option<&str>,
    ) -> Result<(), RepositoryError> {
        if let Some(message) = self.update_failure.lock().unwrap().clone() {
            return Err(RepositoryError::Storage(message));
        }
        let mut repos = self.repos.lock().unwrap();
        let repo = repos
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_owned()))?;
        repo.status = status;
        repo.error_message = error_message.map(str::to_owned);
        self.history.lock().unwrap().push((id.to_owned(), status));
        Ok(())
    }
}

/// Activity sink that keeps entries in memory.
#[derive(Default)]
pub struct RecordingActivitySink {
    entries: Mutex<Vec<ActivityEntry>>,
}

impl RecordingActivitySink {
    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.message).collect()
    }
}

#[async_trait::async_trait]
impl ActivitySink for RecordingActivitySink {
    async fn record(&self, entry: ActivityEntry) {
        self.entries.lock().unwrap().push(entry);
    }
}

/// Mirror transport that remembers which repositories it pushed.
#[derive(Default)]
pub struct RecordingTransport {
    failure: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl RecordingTransport {
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Ids of the repositories passed to the transport, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MirrorTransport for RecordingTransport {
    async fn mirror(&self, repository: &Repository) -> Result<(), String> {
        self.calls.lock().unwrap().push(repository.id.clone());
        match &self.failure {
            Some(message) => Err(message.clone()),
            None => Ok(()),
        }
    }
}

/// A repository mirrored from `acme/<name>` to `mirror/<name>`.
pub fn sample_repository(id: &str, name: &str, status: RepositoryStatus) -> Repository {
    Repository {
        id: id.to_owned(),
        user_id: "u1".to_owned(),
        owner: "acme".to_owned(),
        name: name.to_owned(),
        mirror_owner: "mirror".to_owned(),
        clone_url: format!("https://mirror.example/mirror/{name}.git"),
        status,
        error_message: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_branches_in_insertion_order() {
        let host = InMemoryHost::new("test").with_repo("o", "r", &[("main", "a"), ("dev", "b")]);

        let branches = host.list_branches("o", "r").await.unwrap();
        assert_eq!(
            branches,
            vec![BranchSnapshot::new("main", "a"), BranchSnapshot::new("dev", "b")]
        );
        assert_eq!(host.list_calls(), 1);
    }

    #[tokio::test]
    async fn unknown_repository_is_not_found() {
        let host = InMemoryHost::new("test");
        assert!(matches!(
            host.list_branches("o", "r").await,
            Err(HostError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn compare_defaults_and_overrides() {
        let host = InMemoryHost::new("test");
        assert_eq!(host.compare("o", "r", "a", "a").await, Ok(CompareStatus::Identical));
        assert_eq!(host.compare("o", "r", "a", "b").await, Ok(CompareStatus::Ahead));

        host.set_fast_forward("a", "b", false);
        assert_eq!(host.compare("o", "r", "a", "b").await, Ok(CompareStatus::Diverged));
    }

    #[tokio::test]
    async fn store_tracks_status_history() {
        let store = InMemoryRepositoryStore::default();
        store.insert(sample_repository("r1", "web", RepositoryStatus::Synced));

        store
            .update_status("r1", RepositoryStatus::Error, Some("boom"))
            .await
            .unwrap();
        assert_eq!(store.history("r1"), vec![RepositoryStatus::Error]);
        assert_eq!(store.repository("r1").unwrap().error_message.as_deref(), Some("boom"));

        assert!(matches!(
            store.update_status("nope", RepositoryStatus::Synced, None).await,
            Err(RepositoryError::NotFound(_))
        ));
    }
}
