pub mod api;
pub mod gitea;
pub mod github;
mod status;

pub use gitea::{GiteaClient, GiteaConfig};
pub use github::{GitHubClient, GitHubConfig};
