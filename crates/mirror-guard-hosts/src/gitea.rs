use mirror_guard::{BranchLister, BranchSnapshot, HostError};

use crate::api::GiteaBranch;
use crate::status;

const PAGE_SIZE: usize = 50;

/// Configuration for the Gitea (mirror host) client.
#[derive(Debug, Clone)]
pub struct GiteaConfig {
    /// Root URL of the Gitea instance, without `/api/v1`.
    pub base_url: String,
    pub token: Option<String>,
}

/// Mirror host client: lists the branches currently mirrored.
pub struct GiteaClient {
    config: GiteaConfig,
    client: reqwest::Client,
}

impl GiteaClient {
    pub fn new(config: GiteaConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_base(&self) -> String {
        format!("{}/api/v1", self.config.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.get(url).header("User-Agent", "mirror-guard");

        if let Some(token) = &self.config.token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        req
    }
}

#[async_trait::async_trait]
impl BranchLister for GiteaClient {
    fn label(&self) -> &str {
        "gitea"
    }

    async fn list_branches(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<BranchSnapshot>, HostError> {
        let mut branches = Vec::new();
        let mut page = 1;

        loop {
            let url = format!(
                "{}/repos/{owner}/{repo}/branches?page={page}&limit={PAGE_SIZE}",
                self.api_base(),
            );

            let response = self
                .build_request(&url)
                .send()
                .await
                .map_err(status::network)?;

            let batch: Vec<GiteaBranch> = status::check(response, &format!("{owner}/{repo}"))
                .await?
                .json()
                .await
                .map_err(status::parse)?;

            let short = batch.len() < PAGE_SIZE;
            branches.extend(
                batch
                    .into_iter()
                    .map(|b| BranchSnapshot::new(b.name, b.commit.id)),
            );
            if short {
                break;
            }
            page += 1;
        }

        tracing::debug!(owner, repo, pages = page, count = branches.len(), "listed gitea branches");
        Ok(branches)
    }
}
