use async_trait::async_trait;

use crate::{
    error::GatewayError,
    types::{FileSnapshot, FileWrite, PullRequestDraft, PullRequestRef, RepositoryHandle, SearchPage},
};

/// Capability interface over the hosted source platform.
///
/// One implementation holds the authenticated session for the whole process;
/// the supervisor owns it and lends it to each cycle.
#[async_trait]
pub trait RepositoryGateway: Send + Sync {
    /// One page (1-based) of repositories matching `query`, in platform ranking order.
    async fn search_repositories(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<SearchPage, GatewayError>;

    /// Read `path` from the repository's default branch.
    async fn read_file(
        &self,
        repo: &RepositoryHandle,
        path: &str,
    ) -> Result<FileSnapshot, GatewayError>;

    /// Commit sha at the tip of `branch`.
    async fn branch_head(&self, repo: &RepositoryHandle, branch: &str)
        -> Result<String, GatewayError>;

    async fn create_branch(
        &self,
        repo: &RepositoryHandle,
        branch: &str,
        from_sha: &str,
    ) -> Result<(), GatewayError>;

    async fn delete_branch(&self, repo: &RepositoryHandle, branch: &str)
        -> Result<(), GatewayError>;

    /// Atomic single-file commit. Fails with `Conflict` if the version token is stale.
    async fn write_file(&self, repo: &RepositoryHandle, write: &FileWrite)
        -> Result<(), GatewayError>;

    async fn open_pull_request(
        &self,
        repo: &RepositoryHandle,
        draft: &PullRequestDraft,
    ) -> Result<PullRequestRef, GatewayError>;
}
