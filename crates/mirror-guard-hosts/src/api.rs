use serde::Deserialize;

/// One entry of GitHub's branch listing.
/// `GET /repos/{owner}/{repo}/branches`
#[derive(Debug, Deserialize)]
pub struct GitHubBranch {
    pub name: String,
    pub commit: GitHubCommitRef,
}

#[derive(Debug, Deserialize)]
pub struct GitHubCommitRef {
    pub sha: String,
}

/// Response from GitHub's compare API.
/// `GET /repos/{owner}/{repo}/compare/{base}...{head}`
#[derive(Debug, Deserialize)]
pub struct CompareResponse {
    pub status: String,
}

/// One entry of Gitea's branch listing.
/// `GET /api/v1/repos/{owner}/{repo}/branches`
#[derive(Debug, Deserialize)]
pub struct GiteaBranch {
    pub name: String,
    pub commit: GiteaCommitRef,
}

#[derive(Debug, Deserialize)]
pub struct GiteaCommitRef {
    pub id: String,
}
