use crate::host::{CommitComparer, HostError};

/// Answers whether `head` is a fast-forward of `base` for one repository.
#[async_trait::async_trait]
pub trait AncestryOracle: Send + Sync {
    async fn is_fast_forward(&self, base: &str, head: &str) -> Result<bool, HostError>;
}

/// Ancestry oracle backed by the source host's compare endpoint.
pub struct CompareOracle<'a> {
    host: &'a dyn CommitComparer,
    owner: &'a str,
    repo: &'a str,
}

impl<'a> CompareOracle<'a> {
    pub fn new(host: &'a dyn CommitComparer, owner: &'a str, repo: &'a str) -> Self {
        Self { host, owner, repo }
    }
}

#[async_trait::async_trait]
impl AncestryOracle for CompareOracle<'_> {
    async fn is_fast_forward(&self, base: &str, head: &str) -> Result<bool, HostError> {
        is_fast_forward(self.host, self.owner, self.repo, base, head).await
    }
}

/// Compare `base...head` on the source host.
///
/// A missing base commit means it was garbage-collected after a rewrite,
/// so not-found and unprocessable answers are a confirmed non-fast-forward.
/// Every other failure is returned to the caller.
pub async fn is_fast_forward(
    host: &dyn CommitComparer,
    owner: &str,
    repo: &str,
    base: &str,
    head: &str,
) -> Result<bool, HostError> {
    match host.compare(owner, repo, base, head).await {
        Ok(status) => Ok(status.is_fast_forward()),
        Err(e) if e.is_missing() => {
            tracing::debug!(owner, repo, base, head, error = %e, "base commit no longer resolvable");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Classification of a single branch whose head moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchVerdict {
    /// Ordinary advance, nothing is lost.
    Safe,
    /// History was rewritten.
    Diverged,
    /// The ancestry check failed; the branch is left out of the findings.
    Undetermined(HostError),
}

impl From<Result<bool, HostError>> for BranchVerdict {
    fn from(result: Result<bool, HostError>) -> Self {
        match result {
            Ok(true) => Self::Safe,
            Ok(false) => Self::Diverged,
            Err(e) => Self::Undetermined(e),
        }
    }
}
