use std::sync::Arc;

use crate::branch::BranchSnapshot;

/// Errors that can occur when talking to a git host.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The repository (or commit) does not exist on the host.
    #[error("not found: {0}")]
    NotFound(String),

    /// The host understood the request but cannot process it,
    /// e.g. a compare against a commit that no longer exists.
    #[error("unprocessable: {0}")]
    Unprocessable(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl HostError {
    /// True when the host says the referenced object does not exist.
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Unprocessable(_))
    }
}

/// Relationship of `head` to `base` as reported by a compare endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareStatus {
    Ahead,
    Behind,
    Diverged,
    Identical,
}

impl CompareStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ahead" => Some(Self::Ahead),
            "behind" => Some(Self::Behind),
            "diverged" => Some(Self::Diverged),
            "identical" => Some(Self::Identical),
            _ => None,
        }
    }

    /// True when moving from `base` to `head` loses no commits.
    pub fn is_fast_forward(self) -> bool {
        matches!(self, Self::Ahead | Self::Identical)
    }
}

/// A host that can enumerate the branches of a repository.
#[async_trait::async_trait]
pub trait BranchLister: Send + Sync {
    /// Human-readable label identifying this host.
    fn label(&self) -> &str;

    /// Every branch of `owner/repo`, following pagination to the end.
    /// Returns `HostError::NotFound` when the repository does not exist.
    async fn list_branches(&self, owner: &str, repo: &str)
    -> Result<Vec<BranchSnapshot>, HostError>;
}

/// A host that can compare two commits of a repository.
#[async_trait::async_trait]
pub trait CommitComparer: Send + Sync {
    async fn compare(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> Result<CompareStatus, HostError>;
}

#[async_trait::async_trait]
impl<T: BranchLister + ?Sized> BranchLister for Arc<T> {
    fn label(&self) -> &str {
        (**self).label()
    }

    async fn list_branches(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<BranchSnapshot>, HostError> {
        (**self).list_branches(owner, repo).await
    }
}

#[async_trait::async_trait]
impl<T: CommitComparer + ?Sized> CommitComparer for Arc<T> {
    async fn compare(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> Result<CompareStatus, HostError> {
        (**self).compare(owner, repo, base, head).await
    }
}
