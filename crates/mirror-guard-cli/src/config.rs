use std::path::PathBuf;
use std::time::Duration;

use mirror_guard::{BackupConfig, DetectionSettings};
use mirror_guard_hosts::{GitHubConfig, GiteaConfig};
use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Owner of every repository registered from this machine.
    #[serde(default = "default_user_id")]
    pub user_id: String,
    /// Program and arguments that push one repository to the mirror.
    /// `{owner}`, `{name}`, `{mirror_owner}` and `{clone_url}` are expanded.
    #[serde(default)]
    pub mirror_command: Option<Vec<String>>,
    #[serde(default)]
    pub source: SourceHost,
    #[serde(default)]
    pub mirror: MirrorHost,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
}

/// The host repositories are mirrored from (GitHub).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SourceHost {
    pub api_base_url: Option<String>,
    pub token: Option<String>,
}

/// The host repositories are mirrored to (Gitea).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MirrorHost {
    #[serde(default = "default_mirror_url")]
    pub base_url: String,
    pub token: Option<String>,
    /// Owner used on the mirror when a repository does not name one.
    pub default_owner: Option<String>,
}

impl Default for MirrorHost {
    fn default() -> Self {
        Self {
            base_url: default_mirror_url(),
            token: None,
            default_owner: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetectionConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_concurrency")]
    pub ancestry_concurrency: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            ancestry_concurrency: default_concurrency(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            mirror_command: None,
            source: SourceHost::default(),
            mirror: MirrorHost::default(),
            backup: BackupConfig::default(),
            detection: DetectionConfig::default(),
        }
    }
}

impl AppConfig {
    /// GitHub client settings. `GITHUB_TOKEN` fills in a missing token.
    pub fn github(&self) -> GitHubConfig {
        GitHubConfig {
            token: self
                .source
                .token
                .clone()
                .or_else(|| std::env::var("GITHUB_TOKEN").ok()),
            api_base_url: self.source.api_base_url.clone(),
        }
    }

    /// Gitea client settings. `GITEA_TOKEN` fills in a missing token.
    pub fn gitea(&self) -> GiteaConfig {
        GiteaConfig {
            base_url: self.mirror.base_url.clone(),
            token: self
                .mirror
                .token
                .clone()
                .or_else(|| std::env::var("GITEA_TOKEN").ok()),
        }
    }

    pub fn detection_settings(&self) -> DetectionSettings {
        DetectionSettings {
            timeout: Duration::from_secs(self.detection.timeout_secs.max(1)),
            ancestry_concurrency: self.detection.ancestry_concurrency.max(1),
        }
    }

    /// Clone URL of `mirror_owner/name` on the mirror host.
    pub fn mirror_clone_url(&self, mirror_owner: &str, name: &str) -> String {
        format!(
            "{}/{mirror_owner}/{name}.git",
            self.mirror.base_url.trim_end_matches('/')
        )
    }
}

fn default_user_id() -> String {
    "local".into()
}

fn default_mirror_url() -> String {
    "http://localhost:3000".into()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_concurrency() -> usize {
    4
}

/// Config file path: `~/.config/mirror-guard/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mirror-guard").join("config.toml"))
}

/// Load config from file, falling back to defaults if missing.
pub fn load_config() -> AppConfig {
    if let Some(path) = config_path()
        && let Ok(contents) = std::fs::read_to_string(&path)
    {
        match toml::from_str::<AppConfig>(&contents) {
            Ok(config) => return config,
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to parse config, using defaults"
            ),
        }
    }

    AppConfig::default()
}
