use mirror_guard::{BranchLister, BranchSnapshot, CommitComparer, CompareStatus, HostError};

use crate::api::{CompareResponse, GitHubBranch};
use crate::status;

const DEFAULT_API_BASE: &str = "https://api.github.com";
const PAGE_SIZE: usize = 100;

/// Configuration for the GitHub (source host) client.
#[derive(Debug, Clone, Default)]
pub struct GitHubConfig {
    pub token: Option<String>,
    pub api_base_url: Option<String>,
}

/// Source host client: lists branches and compares commits.
pub struct GitHubClient {
    config: GitHubConfig,
    client: reqwest::Client,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_base(&self) -> &str {
        self.config
            .api_base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
    }

    fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .get(url)
            .header("User-Agent", "mirror-guard")
            .header("Accept", "application/vnd.github+json");

        if let Some(token) = &self.config.token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        req
    }

    async fn branch_page(
        &self,
        owner: &str,
        repo: &str,
        page: usize,
    ) -> Result<Vec<GitHubBranch>, HostError> {
        let url = format!(
            "{}/repos/{owner}/{repo}/branches?per_page={PAGE_SIZE}&page={page}",
            self.api_base(),
        );

        let response = self
            .build_request(&url)
            .send()
            .await
            .map_err(status::network)?;

        status::check(response, &format!("{owner}/{repo}"))
            .await?
            .json()
            .await
            .map_err(status::parse)
    }
}

#[async_trait::async_trait]
impl BranchLister for GitHubClient {
    fn label(&self) -> &str {
        "github"
    }

    async fn list_branches(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<BranchSnapshot>, HostError> {
        let mut branches = Vec::new();
        let mut page = 1;

        loop {
            let batch = self.branch_page(owner, repo, page).await?;
            let short = batch.len() < PAGE_SIZE;
            branches.extend(
                batch
                    .into_iter()
                    .map(|b| BranchSnapshot::new(b.name, b.commit.sha)),
            );
            if short {
                break;
            }
            page += 1;
        }

        tracing::debug!(owner, repo, pages = page, count = branches.len(), "listed github branches");
        Ok(branches)
    }
}

#[async_trait::async_trait]
impl CommitComparer for GitHubClient {
    async fn compare(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> Result<CompareStatus, HostError> {
        let url = format!(
            "{}/repos/{owner}/{repo}/compare/{base}...{head}",
            self.api_base(),
        );

        let response = self
            .build_request(&url)
            .send()
            .await
            .map_err(status::network)?;

        let body: CompareResponse = status::check(response, &format!("{owner}/{repo}@{base}"))
            .await?
            .json()
            .await
            .map_err(status::parse)?;

        CompareStatus::parse(&body.status)
            .ok_or_else(|| HostError::Parse(format!("unknown compare status: {}", body.status)))
    }
}
