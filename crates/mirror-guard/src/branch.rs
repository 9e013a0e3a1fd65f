use std::fmt;

use serde::Serialize;

/// A branch head as reported by one host at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchSnapshot {
    pub name: String,
    pub commit_id: String,
}

impl BranchSnapshot {
    pub fn new(name: impl Into<String>, commit_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commit_id: commit_id.into(),
        }
    }
}

/// Why a mirrored branch would lose history if the mirror were overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DivergenceReason {
    /// Present on the mirror, gone from the source.
    Deleted,
    /// The source head is not a descendant of the mirror head.
    Diverged,
    /// Reserved. Nothing produces it yet; rewrites are reported as `Diverged`.
    NonFastForward,
}

impl fmt::Display for DivergenceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deleted => write!(f, "deleted"),
            Self::Diverged => write!(f, "diverged"),
            Self::NonFastForward => write!(f, "non-fast-forward"),
        }
    }
}

/// One finding of a detection run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedBranch {
    pub name: String,
    pub reason: DivergenceReason,
    pub mirror_commit_id: String,
    /// `None` exactly when the branch was deleted upstream.
    pub source_commit_id: Option<String>,
}

impl AffectedBranch {
    pub fn deleted(name: impl Into<String>, mirror_commit_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: DivergenceReason::Deleted,
            mirror_commit_id: mirror_commit_id.into(),
            source_commit_id: None,
        }
    }

    pub fn diverged(
        name: impl Into<String>,
        mirror_commit_id: impl Into<String>,
        source_commit_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            reason: DivergenceReason::Diverged,
            mirror_commit_id: mirror_commit_id.into(),
            source_commit_id: Some(source_commit_id.into()),
        }
    }
}

impl fmt::Display for AffectedBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source_commit_id {
            Some(source) => write!(
                f,
                "{} ({}: {} -> {})",
                self.name,
                self.reason,
                short_id(&self.mirror_commit_id),
                short_id(source)
            ),
            None => write!(
                f,
                "{} ({}: was {})",
                self.name,
                self.reason,
                short_id(&self.mirror_commit_id)
            ),
        }
    }
}

fn short_id(id: &str) -> &str {
    id.get(..7).unwrap_or(id)
}

/// Outcome of comparing the mirror against the source for one sync attempt.
///
/// Fields are private so the invariants hold for every value:
/// a skipped result has no findings, and `detected()` is true exactly
/// when there is at least one affected branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    detected: bool,
    affected_branches: Vec<AffectedBranch>,
    skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    skip_reason: Option<String>,
}

impl DetectionResult {
    pub fn from_findings(affected_branches: Vec<AffectedBranch>) -> Self {
        Self {
            detected: !affected_branches.is_empty(),
            affected_branches,
            skipped: false,
            skip_reason: None,
        }
    }

    pub fn clean() -> Self {
        Self::from_findings(Vec::new())
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            detected: false,
            affected_branches: Vec::new(),
            skipped: true,
            skip_reason: Some(reason.into()),
        }
    }

    pub fn detected(&self) -> bool {
        self.detected
    }

    pub fn affected_branches(&self) -> &[AffectedBranch] {
        &self.affected_branches
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    pub fn skip_reason(&self) -> Option<&str> {
        self.skip_reason.as_deref()
    }

    /// One-line human summary, used for activity messages and CLI output.
    pub fn summary(&self) -> String {
        if let Some(reason) = &self.skip_reason {
            return format!("force-push detection skipped: {reason}");
        }
        if !self.detected {
            return "no force-push detected".to_owned();
        }
        let branches: Vec<String> = self.affected_branches.iter().map(|b| b.to_string()).collect();
        format!(
            "force-push detected on {} branch(es): {}",
            self.affected_branches.len(),
            branches.join(", ")
        )
    }
}
