use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use codehealer_core::{
    gateway::RepositoryGateway, FileSnapshot, FileWrite, GatewayError, PullRequestDraft,
    PullRequestRef, RepositoryHandle, SearchPage,
};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::wire::{
    classify, decode_content, encode_content, BranchResponse, ContentResponse, CreatePullRequest,
    CreateRefRequest, PullResponse, PutContentRequest, SearchResponse,
};

const USER_AGENT: &str = "codehealer-bot";
const API_VERSION: &str = "2022-11-28";

/// GitHub REST implementation of [`RepositoryGateway`]. Holds the one
/// authenticated session for the process.
pub struct GithubGateway {
    client: Client,
    token: String,
    api_url: String,
}

impl GithubGateway {
    pub fn new(token: impl Into<String>, api_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            token: token.into(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, GatewayError> {
        let resp = builder
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.without_url().to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let remaining = resp
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.text().await.unwrap_or_default();
        Err(classify(status.as_u16(), remaining.as_deref(), &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, GatewayError> {
        self.send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Decode(e.without_url().to_string()))
    }
}

/// Percent-encode each segment of a repository path, keeping the separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl RepositoryGateway for GithubGateway {
    async fn search_repositories(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<SearchPage, GatewayError> {
        let url = format!("{}/search/repositories", self.api_url);
        debug!(page, per_page, "searching repositories");
        let resp: SearchResponse = self
            .send_json(self.request(Method::GET, &url).query(&[
                ("q", query.to_string()),
                ("per_page", per_page.to_string()),
                ("page", page.to_string()),
            ]))
            .await?;
        Ok(SearchPage {
            total_count: resp.total_count,
            items: resp.items.into_iter().map(Into::into).collect(),
        })
    }

    async fn read_file(
        &self,
        repo: &RepositoryHandle,
        path: &str,
    ) -> Result<FileSnapshot, GatewayError> {
        let url = format!("{}/contents/{}", repo.api_ref, encode_path(path));
        let resp: ContentResponse = self
            .send_json(
                self.request(Method::GET, &url)
                    .query(&[("ref", repo.default_branch.as_str())]),
            )
            .await?;
        let content = decode_content(&resp)?;
        Ok(FileSnapshot {
            path: resp.path,
            content,
            version_token: resp.sha,
        })
    }

    async fn branch_head(
        &self,
        repo: &RepositoryHandle,
        branch: &str,
    ) -> Result<String, GatewayError> {
        let url = format!("{}/branches/{}", repo.api_ref, urlencoding::encode(branch));
        let resp: BranchResponse = self.send_json(self.request(Method::GET, &url)).await?;
        Ok(resp.commit.sha)
    }

    async fn create_branch(
        &self,
        repo: &RepositoryHandle,
        branch: &str,
        from_sha: &str,
    ) -> Result<(), GatewayError> {
        let url = format!("{}/git/refs", repo.api_ref);
        let body = CreateRefRequest {
            git_ref: format!("refs/heads/{branch}"),
            sha: from_sha,
        };
        self.send(self.request(Method::POST, &url).json(&body))
            .await?;
        Ok(())
    }

    async fn delete_branch(
        &self,
        repo: &RepositoryHandle,
        branch: &str,
    ) -> Result<(), GatewayError> {
        let url = format!("{}/git/refs/heads/{}", repo.api_ref, encode_path(branch));
        self.send(self.request(Method::DELETE, &url)).await?;
        Ok(())
    }

    async fn write_file(
        &self,
        repo: &RepositoryHandle,
        write: &FileWrite,
    ) -> Result<(), GatewayError> {
        let url = format!("{}/contents/{}", repo.api_ref, encode_path(&write.path));
        let body = PutContentRequest {
            message: &write.message,
            content: encode_content(&write.content),
            sha: &write.version_token,
            branch: &write.branch,
        };
        self.send(self.request(Method::PUT, &url).json(&body))
            .await?;
        Ok(())
    }

    async fn open_pull_request(
        &self,
        repo: &RepositoryHandle,
        draft: &PullRequestDraft,
    ) -> Result<PullRequestRef, GatewayError> {
        let url = format!("{}/pulls", repo.api_ref);
        let body = CreatePullRequest {
            title: &draft.title,
            body: &draft.body,
            head: &draft.head,
            base: &draft.base,
        };
        let resp: PullResponse = self
            .send_json(self.request(Method::POST, &url).json(&body))
            .await?;
        Ok(PullRequestRef {
            number: resp.number,
            url: resp.html_url,
        })
    }
}
