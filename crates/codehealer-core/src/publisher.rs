//! Turns a [`RemediationPlan`] into a branch, a commit and a pull request.
//!
//! Each step is a precondition for the next. Nothing is rolled back when a
//! later step fails: a created branch stays behind unless orphan cleanup is
//! enabled.

use std::fmt;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::{
    error::GatewayError,
    gateway::RepositoryGateway,
    types::{FileWrite, PullRequestDraft, PullRequestRef, RemediationPlan, RepositoryHandle},
};

pub const BRANCH_PREFIX: &str = "codehealer-fix-";

/// Attribution and donation notice appended to every pull request, byte for byte.
pub const DONATION_NOTICE: &str = "
*This pull request was generated automatically by the CodeHealer bot.*
*My purpose is to help keep open-source projects secure by fixing known vulnerabilities.*
*If you found this contribution helpful, please consider supporting my ongoing maintenance and server costs via Litecoin (LTC):*

*ltc1qx5ri6dqss6w56ktw9rgx4zghrjgwatfnw7lf4p*
";

pub fn branch_name(unix_secs: i64) -> String {
    format!("{BRANCH_PREFIX}{unix_secs}")
}

pub fn commit_message(package: &str) -> String {
    format!("Security: fix vulnerability in '{package}'")
}

pub fn pull_request_title(package: &str) -> String {
    format!("CodeHealer Bot: Fix for vulnerability in '{package}'")
}

pub fn pull_request_body(package: &str, manifest_path: &str, description: &str) -> String {
    format!(
        "
Hello,

my automated scan found a security vulnerability in the dependencies declared in `{manifest_path}`.

**Details:**
{description}

This pull request updates the `{package}` library to a secure version. Merging this fix is recommended to keep your project secure.

---
{DONATION_NOTICE}
"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    ResolveBase,
    CreateBranch,
    WriteFile,
    OpenPullRequest,
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ResolveBase => "resolve_base",
            Self::CreateBranch => "create_branch",
            Self::WriteFile => "write_file",
            Self::OpenPullRequest => "open_pull_request",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Opened {
        pull: PullRequestRef,
        branch: String,
    },
    /// The repository does not accept the contribution.
    Skipped {
        reason: String,
        leftover_branch: Option<String>,
    },
    Failed {
        stage: PublishStage,
        error: GatewayError,
        leftover_branch: Option<String>,
    },
}

impl PublishOutcome {
    pub fn is_opened(&self) -> bool {
        matches!(self, Self::Opened { .. })
    }

    pub fn leftover_branch(&self) -> Option<&str> {
        match self {
            Self::Opened { .. } => None,
            Self::Skipped { leftover_branch, .. } | Self::Failed { leftover_branch, .. } => {
                leftover_branch.as_deref()
            }
        }
    }
}

pub struct Publisher<'a> {
    gateway: &'a dyn RepositoryGateway,
    cleanup_orphans: bool,
}

impl<'a> Publisher<'a> {
    pub fn new(gateway: &'a dyn RepositoryGateway, cleanup_orphans: bool) -> Self {
        Self {
            gateway,
            cleanup_orphans,
        }
    }

    /// Publish one plan. Contained failures come back as an outcome; only
    /// escalating gateway errors are returned as `Err`.
    pub async fn publish(&self, plan: RemediationPlan) -> Result<PublishOutcome, GatewayError> {
        let repo = &plan.repository;
        let base = repo.default_branch.as_str();
        info!(repo = %repo.full_name, "opening pull request");

        let head_sha = match self.gateway.branch_head(repo, base).await {
            Ok(sha) => sha,
            Err(e) => return self.settle(repo, PublishStage::ResolveBase, e, None).await,
        };

        let branch = branch_name(Utc::now().timestamp());
        if let Err(e) = self.gateway.create_branch(repo, &branch, &head_sha).await {
            return self.settle(repo, PublishStage::CreateBranch, e, None).await;
        }

        let write = FileWrite {
            path: plan.file_path.clone(),
            content: plan.patched_content.clone(),
            version_token: plan.version_token.clone(),
            branch: branch.clone(),
            message: commit_message(&plan.package),
        };
        if let Err(e) = self.gateway.write_file(repo, &write).await {
            return self
                .settle(repo, PublishStage::WriteFile, e, Some(branch))
                .await;
        }

        let draft = PullRequestDraft {
            title: pull_request_title(&plan.package),
            body: pull_request_body(&plan.package, &plan.file_path, &plan.description),
            head: branch.clone(),
            base: base.to_string(),
        };
        match self.gateway.open_pull_request(repo, &draft).await {
            Ok(pull) => {
                info!(repo = %repo.full_name, branch = %branch, url = %pull.url, "pull request opened");
                Ok(PublishOutcome::Opened { pull, branch })
            }
            Err(e) => {
                self.settle(repo, PublishStage::OpenPullRequest, e, Some(branch))
                    .await
            }
        }
    }

    async fn settle(
        &self,
        repo: &RepositoryHandle,
        stage: PublishStage,
        error: GatewayError,
        branch: Option<String>,
    ) -> Result<PublishOutcome, GatewayError> {
        if error.escalates() {
            if let Some(b) = &branch {
                warn!(repo = %repo.full_name, branch = %b, "branch left behind by aborted publish");
            }
            return Err(error);
        }

        let leftover_branch = match branch {
            Some(b) if self.cleanup_orphans => self.remove_orphan(repo, b).await,
            other => other,
        };

        match error {
            GatewayError::PermissionDenied(reason) => {
                warn!(repo = %repo.full_name, %stage, "repository refuses contributions, skipping: {reason}");
                Ok(PublishOutcome::Skipped {
                    reason,
                    leftover_branch,
                })
            }
            error => {
                error!(repo = %repo.full_name, %stage, "publish failed: {error}");
                if let Some(b) = &leftover_branch {
                    warn!(repo = %repo.full_name, branch = %b, "branch left behind");
                }
                Ok(PublishOutcome::Failed {
                    stage,
                    error,
                    leftover_branch,
                })
            }
        }
    }

    /// Best-effort delete; returns the branch name if it is still there.
    async fn remove_orphan(&self, repo: &RepositoryHandle, branch: String) -> Option<String> {
        match self.gateway.delete_branch(repo, &branch).await {
            Ok(()) => {
                info!(repo = %repo.full_name, branch = %branch, "removed orphaned branch");
                None
            }
            Err(e) => {
                warn!(repo = %repo.full_name, branch = %branch, "could not remove orphaned branch: {e}");
                Some(branch)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_name_uses_prefix_and_timestamp() {
        assert_eq!(branch_name(1_700_000_000), "codehealer-fix-1700000000");
    }

    #[test]
    fn test_body_embeds_description_and_notice_after_separator() {
        let body = pull_request_body(
            "requests",
            "requirements.txt",
            "Vulnerability in 'requests' < 2.31.0 (CVE-2023-32681) fixed.",
        );
        assert!(body.contains("**Details:**\nVulnerability in 'requests' < 2.31.0 (CVE-2023-32681) fixed.\n"));
        assert!(body.contains("`requirements.txt`"));
        let (_, footer) = body.split_once("\n---\n").unwrap();
        assert!(footer.starts_with(DONATION_NOTICE));
    }

    #[test]
    fn test_notice_is_identical_across_bodies() {
        let a = pull_request_body("requests", "requirements.txt", "one");
        let b = pull_request_body("urllib3", "requirements.txt", "two");
        let tail = |s: &str| s.split_once("\n---\n").map(|(_, t)| t.to_string());
        assert_eq!(tail(&a), tail(&b));
    }

    #[test]
    fn test_titles_name_the_package() {
        assert_eq!(
            pull_request_title("requests"),
            "CodeHealer Bot: Fix for vulnerability in 'requests'"
        );
        assert_eq!(
            commit_message("requests"),
            "Security: fix vulnerability in 'requests'"
        );
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(PublishStage::OpenPullRequest.to_string(), "open_pull_request");
        assert_eq!(PublishStage::ResolveBase.to_string(), "resolve_base");
    }
}
