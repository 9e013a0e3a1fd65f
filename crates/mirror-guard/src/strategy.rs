use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable naming a strategy override.
pub const ENV_STRATEGY: &str = "PRE_SYNC_BACKUP_STRATEGY";
/// Legacy environment switch; `false` disables backups entirely.
pub const ENV_ENABLED: &str = "PRE_SYNC_BACKUP_ENABLED";
/// Environment override for the backup root directory.
pub const ENV_DIRECTORY: &str = "PRE_SYNC_BACKUP_DIR";
/// Environment override for the retention count.
pub const ENV_KEEP_COUNT: &str = "PRE_SYNC_BACKUP_KEEP_COUNT";

/// Number of snapshots kept per repository when nothing else is configured.
pub const DEFAULT_RETENTION_COUNT: usize = 20;

/// What to do about possible history loss before a mirror sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtectionStrategy {
    /// Never snapshot, never block.
    Disabled,
    /// Snapshot before every sync.
    Always,
    /// Snapshot only when a force-push is detected.
    OnForcePush,
    /// Snapshot and hold the sync for approval when a force-push is detected.
    BlockOnForcePush,
}

impl ProtectionStrategy {
    pub const DEFAULT: Self = Self::OnForcePush;

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "disabled" => Some(Self::Disabled),
            "always" => Some(Self::Always),
            "on-force-push" => Some(Self::OnForcePush),
            "block-on-force-push" => Some(Self::BlockOnForcePush),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Always => "always",
            Self::OnForcePush => "on-force-push",
            Self::BlockOnForcePush => "block-on-force-push",
        }
    }

    /// Whether the backup decision depends on a detection run.
    pub fn needs_detection(self) -> bool {
        matches!(self, Self::OnForcePush | Self::BlockOnForcePush)
    }

    pub fn should_backup(self, detected: bool) -> bool {
        match self {
            Self::Disabled => false,
            Self::Always => true,
            Self::OnForcePush | Self::BlockOnForcePush => detected,
        }
    }

    pub fn should_block_sync(self, detected: bool) -> bool {
        self == Self::BlockOnForcePush && detected
    }
}

impl fmt::Display for ProtectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-user backup configuration, as stored by the configuration layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Raw strategy name; unknown values are ignored during resolution.
    #[serde(default)]
    pub backup_strategy: Option<String>,
    /// Legacy switch predating `backup_strategy`.
    #[serde(default)]
    pub backup_before_sync: Option<bool>,
    #[serde(default)]
    pub backup_directory: Option<String>,
    #[serde(default)]
    pub backup_retention_count: Option<u32>,
    #[serde(default)]
    pub block_sync_on_backup_failure: Option<bool>,
}

impl BackupConfig {
    pub fn with_strategy(strategy: ProtectionStrategy) -> Self {
        Self {
            backup_strategy: Some(strategy.as_str().to_owned()),
            ..Self::default()
        }
    }

    /// Whether a failed snapshot should stop the sync. Defaults to true.
    pub fn block_on_backup_failure(&self) -> bool {
        self.block_sync_on_backup_failure.unwrap_or(true)
    }
}

/// Process-level overrides, captured once and passed in explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub strategy: Option<String>,
    pub backup_enabled: Option<bool>,
    pub backup_directory: Option<PathBuf>,
    pub retention_count: Option<u32>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build overrides from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            strategy: get(ENV_STRATEGY),
            backup_enabled: get(ENV_ENABLED).and_then(|v| parse_bool(&v)),
            backup_directory: get(ENV_DIRECTORY).map(PathBuf::from),
            retention_count: get(ENV_KEEP_COUNT).and_then(|v| v.trim().parse().ok()),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Effective strategy for a repository.
///
/// Precedence: explicit strategy, legacy per-user switch, environment
/// strategy, legacy environment switch, then the default.
pub fn resolve_strategy(config: Option<&BackupConfig>, env: &EnvOverrides) -> ProtectionStrategy {
    if let Some(config) = config {
        if let Some(strategy) = config
            .backup_strategy
            .as_deref()
            .and_then(ProtectionStrategy::parse)
        {
            return strategy;
        }
        match config.backup_before_sync {
            Some(true) => return ProtectionStrategy::Always,
            Some(false) => return ProtectionStrategy::Disabled,
            None => {}
        }
    }

    if let Some(strategy) = env.strategy.as_deref().and_then(ProtectionStrategy::parse) {
        return strategy;
    }

    if env.backup_enabled == Some(false) {
        return ProtectionStrategy::Disabled;
    }

    ProtectionStrategy::DEFAULT
}

/// Snapshots to keep per repository; never below one.
pub fn retention_count(config: Option<&BackupConfig>, env: &EnvOverrides) -> usize {
    config
        .and_then(|c| c.backup_retention_count)
        .or(env.retention_count)
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_RETENTION_COUNT)
        .max(1)
}
