use mirror_guard::{MirrorTransport, Repository};

/// Pushes a repository to the mirror by running the configured command.
pub struct CommandTransport {
    argv: Vec<String>,
}

impl CommandTransport {
    /// `argv` must hold at least the program name.
    pub fn new(argv: Vec<String>) -> Option<Self> {
        if argv.first().is_none_or(|program| program.trim().is_empty()) {
            return None;
        }
        Some(Self { argv })
    }
}

/// Stands in when no `mirror_command` is configured; every push fails.
pub struct UnconfiguredTransport;

#[async_trait::async_trait]
impl MirrorTransport for UnconfiguredTransport {
    async fn mirror(&self, _repository: &Repository) -> Result<(), String> {
        Err("mirror_command is not set in the configuration".into())
    }
}

/// Replace `{owner}`, `{name}`, `{mirror_owner}` and `{clone_url}` in each argument.
pub fn expand_args(argv: &[String], repository: &Repository) -> Vec<String> {
    argv.iter()
        .map(|arg| {
            arg.replace("{owner}", &repository.owner)
                .replace("{name}", &repository.name)
                .replace("{mirror_owner}", &repository.mirror_owner)
                .replace("{clone_url}", &repository.clone_url)
        })
        .collect()
}

#[async_trait::async_trait]
impl MirrorTransport for CommandTransport {
    async fn mirror(&self, repository: &Repository) -> Result<(), String> {
        let args = expand_args(&self.argv, repository);
        let Some((program, rest)) = args.split_first() else {
            return Err("empty mirror command".into());
        };

        tracing::debug!(repo = %repository.full_name(), %program, "running mirror command");

        let output = tokio::process::Command::new(program)
            .args(rest)
            .output()
            .await
            .map_err(|e| format!("failed to run {program}: {e}"))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if stderr.is_empty() {
            Err(format!("{program} exited with {}", output.status))
        } else {
            Err(format!("{program} exited with {}: {stderr}", output.status))
        }
    }
}
