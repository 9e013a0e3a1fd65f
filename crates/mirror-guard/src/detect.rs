use std::time::Duration;

use crate::ancestry::CompareOracle;
use crate::branch::DetectionResult;
use crate::compare::{DEFAULT_ANCESTRY_CONCURRENCY, compare_snapshots};
use crate::host::{BranchLister, CommitComparer, HostError};

/// Default bound on a whole detection run.
pub const DEFAULT_DETECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunables for a detection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionSettings {
    pub timeout: Duration,
    pub ancestry_concurrency: usize,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_DETECTION_TIMEOUT,
            ancestry_concurrency: DEFAULT_ANCESTRY_CONCURRENCY,
        }
    }
}

/// Where a repository lives on each host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionTarget {
    pub source_owner: String,
    pub mirror_owner: String,
    pub repo: String,
}

/// Runs force-push detection for one repository against both hosts.
pub struct Detector<'a> {
    source: &'a dyn BranchLister,
    comparer: &'a dyn CommitComparer,
    mirror: &'a dyn BranchLister,
    settings: DetectionSettings,
}

impl<'a> Detector<'a> {
    pub fn new(
        source: &'a dyn BranchLister,
        comparer: &'a dyn CommitComparer,
        mirror: &'a dyn BranchLister,
    ) -> Self {
        Self {
            source,
            comparer,
            mirror,
            settings: DetectionSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: DetectionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Detect whether syncing would rewrite mirrored history.
    ///
    /// Never fails: any problem fetching either snapshot, or running out of
    /// time, produces a skipped result so the sync can proceed unguarded.
    pub async fn detect(&self, target: &DetectionTarget) -> DetectionResult {
        match tokio::time::timeout(self.settings.timeout, self.run(target)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    repo = %target.repo,
                    timeout_secs = self.settings.timeout.as_secs(),
                    "force-push detection timed out"
                );
                DetectionResult::skipped(format!(
                    "detection timed out after {}s",
                    self.settings.timeout.as_secs()
                ))
            }
        }
    }

    async fn run(&self, target: &DetectionTarget) -> DetectionResult {
        let (mirror, source) = futures::join!(
            self.mirror.list_branches(&target.mirror_owner, &target.repo),
            self.source.list_branches(&target.source_owner, &target.repo),
        );

        let mirror = match mirror {
            Ok(branches) => branches,
            Err(HostError::NotFound(_)) => {
                return DetectionResult::skipped("repository not yet mirrored");
            }
            Err(e) => {
                tracing::warn!(host = self.mirror.label(), repo = %target.repo, error = %e, "could not list mirror branches");
                return DetectionResult::skipped(format!(
                    "failed to fetch branches from {}: {e}",
                    self.mirror.label()
                ));
            }
        };

        let source = match source {
            Ok(branches) => branches,
            Err(HostError::NotFound(_)) => {
                return DetectionResult::skipped("repository not found on source");
            }
            Err(e) => {
                tracing::warn!(host = self.source.label(), repo = %target.repo, error = %e, "could not list source branches");
                return DetectionResult::skipped(format!(
                    "failed to fetch branches from {}: {e}",
                    self.source.label()
                ));
            }
        };

        tracing::debug!(
            repo = %target.repo,
            mirror_branches = mirror.len(),
            source_branches = source.len(),
            "comparing branch snapshots"
        );

        let oracle = CompareOracle::new(self.comparer, &target.source_owner, &target.repo);
        match compare_snapshots(&mirror, &source, &oracle, self.settings.ancestry_concurrency).await
        {
            Ok(result) => result,
            Err(e) => DetectionResult::skipped(format!("invalid branch data: {e}")),
        }
    }
}
