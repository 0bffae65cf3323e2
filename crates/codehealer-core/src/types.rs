use crate::detector::Detection;

/// A repository returned by search. Lives for one candidate's processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryHandle {
    /// `owner/name`
    pub full_name: String,
    pub default_branch: String,
    pub archived: bool,
    /// Platform reference used for every follow-up call (the repository API URL on GitHub).
    pub api_ref: String,
}

/// One page of repository search results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    /// Total matches as reported by the platform; may exceed what search will actually return.
    pub total_count: u64,
    pub items: Vec<RepositoryHandle>,
}

/// A file as read from a repository's default branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    pub path: String,
    pub content: String,
    /// Revision of the content; a write carrying a stale token must be rejected.
    pub version_token: String,
}

/// A commit of one file onto a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWrite {
    pub path: String,
    pub content: String,
    pub version_token: String,
    pub branch: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestDraft {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    pub number: u64,
    pub url: String,
}

/// Everything the publisher needs to propose one fix. Only exists for a
/// positive detection, so every field is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationPlan {
    pub repository: RepositoryHandle,
    pub file_path: String,
    pub version_token: String,
    pub patched_content: String,
    pub description: String,
    /// Package named in the commit message and PR title.
    pub package: String,
}

impl RemediationPlan {
    pub fn new(repository: RepositoryHandle, snapshot: FileSnapshot, detection: Detection) -> Self {
        Self {
            repository,
            file_path: snapshot.path,
            version_token: snapshot.version_token,
            package: detection.signature.package,
            description: detection.signature.description,
            patched_content: detection.patched,
        }
    }
}
