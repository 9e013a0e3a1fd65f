pub mod ancestry;
pub mod approval;
pub mod backup;
pub mod branch;
pub mod compare;
pub mod detect;
pub mod guard;
pub mod host;
pub mod path;
pub mod repository;
pub mod strategy;
pub mod sync;

pub use ancestry::{AncestryOracle, BranchVerdict, CompareOracle, is_fast_forward};
pub use approval::{
    ApprovalAction, ApprovalWorkflow, ApproveSyncRequest, ApproveSyncResponse,
    RepositoryStatusUpdate, ValidationError,
};
pub use backup::{
    BackupDescriptor, BackupError, BackupManager, BackupOutcome, BackupRequest, BundleWriter,
    list_backups, prune_backups,
};
pub use branch::{AffectedBranch, BranchSnapshot, DetectionResult, DivergenceReason};
pub use compare::{ComparisonError, compare_snapshots};
pub use detect::{DetectionSettings, DetectionTarget, Detector};
pub use guard::{GuardReport, Hosts, SyncGuard, SyncOptions, Verdict};
pub use host::{BranchLister, CommitComparer, CompareStatus, HostError};
pub use repository::{
    ActivityEntry, ActivitySink, BackupConfigSource, Repository, RepositoryError,
    RepositoryStatus, RepositoryStore,
};
pub use strategy::{BackupConfig, EnvOverrides, ProtectionStrategy, resolve_strategy};
pub use sync::{MirrorSyncer, MirrorTransport, SyncError, SyncOutcome};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
