use std::collections::HashMap;

use futures::stream::{self, StreamExt};

use crate::ancestry::{AncestryOracle, BranchVerdict};
use crate::branch::{AffectedBranch, BranchSnapshot, DetectionResult};

/// Default bound on concurrent ancestry checks, kept small for host rate limits.
pub const DEFAULT_ANCESTRY_CONCURRENCY: usize = 4;

/// Contract violations in comparator input.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ComparisonError {
    #[error("duplicate branch `{name}` in {side} snapshot")]
    DuplicateBranch { name: String, side: &'static str },
}

/// Diff the mirror's branches against the source's.
///
/// Every mirror branch is classified independently: missing upstream is a
/// deletion, an unchanged head is ignored, a moved head is checked with the
/// oracle. A failing oracle call leaves that branch out of the findings.
/// Branches that exist only on the source are never examined.
pub async fn compare_snapshots(
    mirror: &[BranchSnapshot],
    source: &[BranchSnapshot],
    oracle: &dyn AncestryOracle,
    concurrency: usize,
) -> Result<DetectionResult, ComparisonError> {
    ensure_unique(mirror, "mirror")?;
    let source_index = index_by_name(source, "source")?;

    let mut findings: Vec<Option<AffectedBranch>> = Vec::with_capacity(mirror.len());
    let mut moved = Vec::new();

    for branch in mirror {
        match source_index.get(branch.name.as_str()) {
            None => findings.push(Some(AffectedBranch::deleted(&branch.name, &branch.commit_id))),
            Some(source_commit) if *source_commit == branch.commit_id => findings.push(None),
            Some(source_commit) => {
                moved.push((findings.len(), branch, *source_commit));
                findings.push(None);
            }
        }
    }

    let verdicts: Vec<(usize, &BranchSnapshot, &str, BranchVerdict)> = stream::iter(moved)
        .map(move |(slot, branch, source_commit)| async move {
            let verdict = BranchVerdict::from(
                oracle
                    .is_fast_forward(&branch.commit_id, source_commit)
                    .await,
            );
            (slot, branch, source_commit, verdict)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    for (slot, branch, source_commit, verdict) in verdicts {
        match verdict {
            BranchVerdict::Safe => {}
            BranchVerdict::Diverged => {
                findings[slot] = Some(AffectedBranch::diverged(
                    &branch.name,
                    &branch.commit_id,
                    source_commit,
                ));
            }
            BranchVerdict::Undetermined(e) => {
                tracing::warn!(
                    branch = %branch.name,
                    error = %e,
                    "ancestry check failed, skipping branch"
                );
            }
        }
    }

    Ok(DetectionResult::from_findings(
        findings.into_iter().flatten().collect(),
    ))
}

fn ensure_unique(branches: &[BranchSnapshot], side: &'static str) -> Result<(), ComparisonError> {
    index_by_name(branches, side).map(|_| ())
}

fn index_by_name<'a>(
    branches: &'a [BranchSnapshot],
    side: &'static str,
) -> Result<HashMap<&'a str, &'a str>, ComparisonError> {
    let mut index = HashMap::with_capacity(branches.len());
    for branch in branches {
        if index
            .insert(branch.name.as_str(), branch.commit_id.as_str())
            .is_some()
        {
            return Err(ComparisonError::DuplicateBranch {
                name: branch.name.clone(),
                side,
            });
        }
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::branch::DivergenceReason;
    use crate::host::HostError;

    /// Oracle with a scripted answer per `(base, head)` pair; unknown pairs
    /// count as fast-forward.
    #[derive(Default)]
    struct ScriptedOracle {
        answers: HashMap<(String, String), Result<bool, HostError>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedOracle {
        fn answer(mut self, base: &str, head: &str, answer: Result<bool, HostError>) -> Self {
            self.answers.insert((base.into(), head.into()), answer);
            self
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl AncestryOracle for ScriptedOracle {
        async fn is_fast_forward(&self, base: &str, head: &str) -> Result<bool, HostError> {
            self.calls.lock().unwrap().push((base.into(), head.into()));
            self.answers
                .get(&(base.to_owned(), head.to_owned()))
                .cloned()
                .unwrap_or(Ok(true))
        }
    }

    fn branches(pairs: &[(&str, &str)]) -> Vec<BranchSnapshot> {
        pairs
            .iter()
            .map(|(name, id)| BranchSnapshot::new(*name, *id))
            .collect()
    }

    async fn run(
        mirror: &[(&str, &str)],
        source: &[(&str, &str)],
        oracle: &ScriptedOracle,
    ) -> DetectionResult {
        compare_snapshots(
            &branches(mirror),
            &branches(source),
            oracle,
            DEFAULT_ANCESTRY_CONCURRENCY,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn identical_snapshots_have_no_findings() {
        let oracle = ScriptedOracle::default();
        let result = run(
            &[("main", "aaa"), ("dev", "bbb")],
            &[("main", "aaa"), ("dev", "bbb")],
            &oracle,
        )
        .await;

        assert!(!result.detected());
        assert!(!result.is_skipped());
        assert!(result.affected_branches().is_empty());
        assert!(oracle.calls().is_empty(), "equal heads need no ancestry check");
    }

    #[tokio::test]
    async fn branch_missing_upstream_is_deleted() {
        let oracle = ScriptedOracle::default();
        let result = run(&[("main", "aaa"), ("old", "ccc")], &[("main", "aaa")], &oracle).await;

        assert!(result.detected());
        assert_eq!(
            result.affected_branches(),
            &[AffectedBranch {
                name: "old".into(),
                reason: DivergenceReason::Deleted,
                mirror_commit_id: "ccc".into(),
                source_commit_id: None,
            }]
        );
    }

    #[tokio::test]
    async fn fast_forward_is_not_a_finding() {
        let oracle = ScriptedOracle::default().answer("old", "new", Ok(true));
        let result = run(&[("main", "old")], &[("main", "new")], &oracle).await;

        assert!(!result.detected());
        assert_eq!(oracle.calls(), vec![("old".to_owned(), "new".to_owned())]);
    }

    #[tokio::test]
    async fn non_fast_forward_is_diverged() {
        let oracle = ScriptedOracle::default().answer("old", "new", Ok(false));
        let result = run(&[("main", "old")], &[("main", "new")], &oracle).await;

        assert!(result.detected());
        assert_eq!(
            result.affected_branches(),
            &[AffectedBranch {
                name: "main".into(),
                reason: DivergenceReason::Diverged,
                mirror_commit_id: "old".into(),
                source_commit_id: Some("new".into()),
            }]
        );
    }

    #[tokio::test]
    async fn failing_oracle_skips_only_that_branch() {
        let oracle = ScriptedOracle::default()
            .answer(
                "m1",
                "s1",
                Err(HostError::Http {
                    status: 500,
                    message: "boom".into(),
                }),
            )
            .answer("m2", "s2", Ok(false));
        let result = run(
            &[("flaky", "m1"), ("rewritten", "m2"), ("gone", "m3")],
            &[("flaky", "s1"), ("rewritten", "s2")],
            &oracle,
        )
        .await;

        let names: Vec<&str> = result
            .affected_branches()
            .iter()
            .map(|b| b.name.as_str())
            .collect();
        assert_eq!(names, vec!["rewritten", "gone"]);
    }

    #[tokio::test]
    async fn source_only_branches_are_ignored() {
        let oracle = ScriptedOracle::default();
        let result = run(&[("main", "aaa")], &[("main", "aaa"), ("feature", "fff")], &oracle).await;
        assert!(!result.detected());
    }

    #[tokio::test]
    async fn findings_follow_mirror_order() {
        let oracle = ScriptedOracle::default()
            .answer("a1", "a2", Ok(false))
            .answer("c1", "c2", Ok(false));
        let result = run(
            &[("a", "a1"), ("b", "b1"), ("c", "c1")],
            &[("a", "a2"), ("c", "c2")],
            &oracle,
        )
        .await;

        let names: Vec<&str> = result
            .affected_branches()
            .iter()
            .map(|b| b.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn empty_mirror_has_no_findings() {
        let oracle = ScriptedOracle::default();
        let result = run(&[], &[("main", "aaa")], &oracle).await;
        assert!(!result.detected());
    }

    #[tokio::test]
    async fn duplicate_branch_names_are_rejected() {
        let oracle = ScriptedOracle::default();
        let result = compare_snapshots(
            &branches(&[("main", "aaa"), ("main", "bbb")]),
            &branches(&[("main", "aaa")]),
            &oracle,
            1,
        )
        .await;
        assert_eq!(
            result,
            Err(ComparisonError::DuplicateBranch {
                name: "main".into(),
                side: "mirror",
            })
        );
    }

    #[tokio::test]
    async fn zero_concurrency_still_runs() {
        let oracle = ScriptedOracle::default().answer("old", "new", Ok(false));
        let result = compare_snapshots(
            &branches(&[("main", "old")]),
            &branches(&[("main", "new")]),
            &oracle,
            0,
        )
        .await
        .unwrap();
        assert!(result.detected());
    }
}
