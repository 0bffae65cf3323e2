#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use codehealer_core::{
    gateway::RepositoryGateway, FileSnapshot, FileWrite, GatewayError, PullRequestDraft,
    PullRequestRef, RepositoryHandle, SearchPage,
};
use tokio_util::sync::CancellationToken;

pub const VULNERABLE: &str = "requests==2.25.0\nflask==2.0\n";
pub const PATCHED: &str = "requests==2.31.0\nflask==2.0\n";
pub const CLEAN: &str = "requests==2.31.0\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Search { page: u32, per_page: u32 },
    ReadFile { repo: String, path: String },
    BranchHead { repo: String, branch: String },
    CreateBranch { repo: String, branch: String, from_sha: String },
    DeleteBranch { repo: String, branch: String },
    WriteFile { repo: String, write: FileWrite },
    OpenPull { repo: String, draft: PullRequestDraft },
}

impl Call {
    pub fn repo(&self) -> Option<&str> {
        match self {
            Call::Search { .. } => None,
            Call::ReadFile { repo, .. }
            | Call::BranchHead { repo, .. }
            | Call::CreateBranch { repo, .. }
            | Call::DeleteBranch { repo, .. }
            | Call::WriteFile { repo, .. }
            | Call::OpenPull { repo, .. } => Some(repo),
        }
    }
}

/// In-memory platform. Every call is recorded; failures are injected per repository.
#[derive(Default)]
pub struct FakeGateway {
    repos: Vec<RepositoryHandle>,
    manifests: HashMap<String, String>,
    search_failure: Option<GatewayError>,
    later_page_failure: Option<GatewayError>,
    read_failures: HashMap<String, GatewayError>,
    head_failures: HashMap<String, GatewayError>,
    branch_failures: HashMap<String, GatewayError>,
    delete_failures: HashMap<String, GatewayError>,
    write_failures: HashMap<String, GatewayError>,
    pull_failures: HashMap<String, GatewayError>,
    /// Cancel this token when the n-th search call (1-based) arrives.
    cancel_on_search: Option<(usize, CancellationToken)>,
    calls: Mutex<Vec<Call>>,
    next_pull: AtomicU64,
}

pub fn handle(full_name: &str) -> RepositoryHandle {
    RepositoryHandle {
        full_name: full_name.to_string(),
        default_branch: "main".to_string(),
        archived: false,
        api_ref: format!("https://api.github.test/repos/{full_name}"),
    }
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo(mut self, full_name: &str, manifest: &str) -> Self {
        self.repos.push(handle(full_name));
        self.manifests
            .insert(full_name.to_string(), manifest.to_string());
        self
    }

    pub fn with_repo_without_manifest(mut self, full_name: &str) -> Self {
        self.repos.push(handle(full_name));
        self
    }

    pub fn with_archived_repo(mut self, full_name: &str, manifest: &str) -> Self {
        let mut repo = handle(full_name);
        repo.archived = true;
        self.repos.push(repo);
        self.manifests
            .insert(full_name.to_string(), manifest.to_string());
        self
    }

    pub fn with_vulnerable_repos(mut self, count: usize) -> Self {
        for i in 1..=count {
            self = self.with_repo(&format!("owner/repo-{i}"), VULNERABLE);
        }
        self
    }

    pub fn failing_search(mut self, err: GatewayError) -> Self {
        self.search_failure = Some(err);
        self
    }

    pub fn failing_later_pages(mut self, err: GatewayError) -> Self {
        self.later_page_failure = Some(err);
        self
    }

    pub fn failing_read(mut self, full_name: &str, err: GatewayError) -> Self {
        self.read_failures.insert(full_name.to_string(), err);
        self
    }

    pub fn failing_head(mut self, full_name: &str, err: GatewayError) -> Self {
        self.head_failures.insert(full_name.to_string(), err);
        self
    }

    pub fn failing_branch(mut self, full_name: &str, err: GatewayError) -> Self {
        self.branch_failures.insert(full_name.to_string(), err);
        self
    }

    pub fn failing_delete(mut self, full_name: &str, err: GatewayError) -> Self {
        self.delete_failures.insert(full_name.to_string(), err);
        self
    }

    pub fn failing_write(mut self, full_name: &str, err: GatewayError) -> Self {
        self.write_failures.insert(full_name.to_string(), err);
        self
    }

    pub fn failing_pull(mut self, full_name: &str, err: GatewayError) -> Self {
        self.pull_failures.insert(full_name.to_string(), err);
        self
    }

    pub fn cancelling_on_search(mut self, nth: usize, token: CancellationToken) -> Self {
        self.cancel_on_search = Some((nth, token));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn calls_for(&self, full_name: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.repo() == Some(full_name))
            .collect()
    }

    pub fn pulls(&self) -> Vec<(String, PullRequestDraft)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::OpenPull { repo, draft } => Some((repo, draft)),
                _ => None,
            })
            .collect()
    }

    pub fn writes(&self) -> Vec<(String, FileWrite)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::WriteFile { repo, write } => Some((repo, write)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn injected(map: &HashMap<String, GatewayError>, repo: &RepositoryHandle) -> Result<(), GatewayError> {
        match map.get(&repo.full_name) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RepositoryGateway for FakeGateway {
    async fn search_repositories(
        &self,
        _query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<SearchPage, GatewayError> {
        self.record(Call::Search { page, per_page });
        let searches = self.count(|c| matches!(c, Call::Search { .. }));
        if let Some((nth, token)) = &self.cancel_on_search {
            if searches == *nth {
                token.cancel();
            }
        }
        if let Some(err) = &self.search_failure {
            return Err(err.clone());
        }
        if page > 1 {
            if let Some(err) = &self.later_page_failure {
                return Err(err.clone());
            }
        }
        let start = ((page.saturating_sub(1)) * per_page) as usize;
        let items = self
            .repos
            .iter()
            .skip(start)
            .take(per_page as usize)
            .cloned()
            .collect();
        Ok(SearchPage {
            total_count: self.repos.len() as u64,
            items,
        })
    }

    async fn read_file(
        &self,
        repo: &RepositoryHandle,
        path: &str,
    ) -> Result<FileSnapshot, GatewayError> {
        self.record(Call::ReadFile {
            repo: repo.full_name.clone(),
            path: path.to_string(),
        });
        Self::injected(&self.read_failures, repo)?;
        match self.manifests.get(&repo.full_name) {
            Some(content) => Ok(FileSnapshot {
                path: path.to_string(),
                content: content.clone(),
                version_token: format!("sha-{}", repo.full_name),
            }),
            None => Err(GatewayError::NotFound(format!("{}/{path}", repo.full_name))),
        }
    }

    async fn branch_head(
        &self,
        repo: &RepositoryHandle,
        branch: &str,
    ) -> Result<String, GatewayError> {
        self.record(Call::BranchHead {
            repo: repo.full_name.clone(),
            branch: branch.to_string(),
        });
        Self::injected(&self.head_failures, repo)?;
        Ok(format!("head-{}", repo.full_name))
    }

    async fn create_branch(
        &self,
        repo: &RepositoryHandle,
        branch: &str,
        from_sha: &str,
    ) -> Result<(), GatewayError> {
        self.record(Call::CreateBranch {
            repo: repo.full_name.clone(),
            branch: branch.to_string(),
            from_sha: from_sha.to_string(),
        });
        Self::injected(&self.branch_failures, repo)
    }

    async fn delete_branch(
        &self,
        repo: &RepositoryHandle,
        branch: &str,
    ) -> Result<(), GatewayError> {
        self.record(Call::DeleteBranch {
            repo: repo.full_name.clone(),
            branch: branch.to_string(),
        });
        Self::injected(&self.delete_failures, repo)
    }

    async fn write_file(
        &self,
        repo: &RepositoryHandle,
        write: &FileWrite,
    ) -> Result<(), GatewayError> {
        self.record(Call::WriteFile {
            repo: repo.full_name.clone(),
            write: write.clone(),
        });
        Self::injected(&self.write_failures, repo)
    }

    async fn open_pull_request(
        &self,
        repo: &RepositoryHandle,
        draft: &PullRequestDraft,
    ) -> Result<PullRequestRef, GatewayError> {
        self.record(Call::OpenPull {
            repo: repo.full_name.clone(),
            draft: draft.clone(),
        });
        Self::injected(&self.pull_failures, repo)?;
        let number = self.next_pull.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(PullRequestRef {
            number,
            url: format!("https://github.test/{}/pull/{number}", repo.full_name),
        })
    }
}
