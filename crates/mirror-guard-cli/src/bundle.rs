use std::ffi::OsStr;
use std::path::Path;

use mirror_guard::{BackupError, BundleWriter};

/// Snapshots a repository with `git clone --mirror` and `git bundle create --all`.
pub struct GitBundleWriter {
    git: String,
}

impl GitBundleWriter {
    pub fn new() -> Self {
        Self { git: "git".into() }
    }
}

impl Default for GitBundleWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl BundleWriter for GitBundleWriter {
    async fn write_bundle(&self, clone_url: &str, dest: &Path) -> Result<(), BackupError> {
        let work = tempfile::Builder::new().prefix("mirror-guard-").tempdir()?;
        let clone_dir = work.path().join("repo.git");

        self.run("clone", &[
            OsStr::new("clone"),
            OsStr::new("--mirror"),
            OsStr::new("--quiet"),
            OsStr::new(clone_url),
            clone_dir.as_os_str(),
        ])
        .await?;

        self.run("bundle", &[
            OsStr::new("-C"),
            clone_dir.as_os_str(),
            OsStr::new("bundle"),
            OsStr::new("create"),
            OsStr::new("--quiet"),
            dest.as_os_str(),
            OsStr::new("--all"),
        ])
        .await?;

        tracing::debug!(clone_url, dest = %dest.display(), "bundle written");
        Ok(())
    }
}

impl GitBundleWriter {
    async fn run(&self, step: &str, args: &[&OsStr]) -> Result<(), BackupError> {
        let output = tokio::process::Command::new(&self.git)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await
            .map_err(|e| BackupError::Bundle(format!("failed to run {}: {e}", self.git)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackupError::Bundle(format!(
                "git {step} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::process::Command;

    use super::*;

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok_and(|o| o.status.success())
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mirror-guard-test-bundle-{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .current_dir(dir)
            .args(["-c", "user.name=test", "-c", "user.email=test@example.com"])
            .args(args)
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    #[tokio::test]
    async fn missing_repository_is_bundle_error() {
        let dir = scratch_dir("missing");
        let dest = dir.join("out.bundle");

        let result = GitBundleWriter::new()
            .write_bundle(&dir.join("does-not-exist").to_string_lossy(), &dest)
            .await;

        assert!(matches!(result, Err(BackupError::Bundle(_))));
        assert!(!dest.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn bundles_every_ref_of_a_local_repository() {
        if !git_available() {
            return;
        }
        let dir = scratch_dir("local");
        let repo = dir.join("origin");
        std::fs::create_dir_all(&repo).unwrap();
        git(&repo, &["init", "--quiet", "--initial-branch=main"]);
        std::fs::write(repo.join("README"), "hello\n").unwrap();
        git(&repo, &["add", "README"]);
        git(&repo, &["commit", "--quiet", "-m", "init"]);
        git(&repo, &["branch", "feature"]);

        let dest = dir.join("snapshot.bundle");
        GitBundleWriter::new()
            .write_bundle(&repo.to_string_lossy(), &dest)
            .await
            .unwrap();

        let output = Command::new("git")
            .args(["bundle", "list-heads"])
            .arg(&dest)
            .output()
            .unwrap();
        let heads = String::from_utf8_lossy(&output.stdout);
        assert!(heads.contains("refs/heads/main"), "heads: {heads}");
        assert!(heads.contains("refs/heads/feature"), "heads: {heads}");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
