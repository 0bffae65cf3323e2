//! One scan cycle: search, then for each candidate
//! archived check → read manifest → detect → publish → pause → budget check.

use std::{fmt, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    candidates::CandidateSet,
    config::Config,
    detector::Detector,
    error::{GatewayError, Result},
    gateway::RepositoryGateway,
    pacing::pause,
    publisher::{PublishOutcome, Publisher},
    types::{RemediationPlan, RepositoryHandle},
};

pub const SEARCH_QUERY: &str =
    "filename:requirements.txt language:python pushed:<2024-01-01 archived:false";
pub const MANIFEST_PATH: &str = "requirements.txt";
pub const DEFAULT_ACTION_LIMIT: u32 = 5;

#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub query: String,
    pub manifest_path: String,
    pub action_limit: u32,
    /// Pause after every publish attempt.
    pub action_delay: Duration,
    pub per_page: u32,
    pub max_pages: u32,
    pub cleanup_orphans: bool,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            query: SEARCH_QUERY.to_string(),
            manifest_path: MANIFEST_PATH.to_string(),
            action_limit: DEFAULT_ACTION_LIMIT,
            action_delay: Duration::from_secs(60),
            per_page: 30,
            max_pages: 10,
            cleanup_orphans: false,
        }
    }
}

impl From<&Config> for CycleSettings {
    fn from(config: &Config) -> Self {
        Self {
            action_limit: config.action_limit,
            action_delay: config.action_delay(),
            per_page: config.search_page_size,
            max_pages: config.max_search_pages,
            cleanup_orphans: config.cleanup_orphans,
            ..Self::default()
        }
    }
}

/// Successful publishes allowed in one cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleBudget {
    used: u32,
    limit: u32,
}

impl CycleBudget {
    pub fn new(limit: u32) -> Self {
        Self { used: 0, limit }
    }

    pub fn record(&mut self) {
        self.used = self.used.saturating_add(1).min(self.limit);
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn exhausted(&self) -> bool {
        self.used >= self.limit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleTermination {
    #[default]
    Complete,
    BudgetExhausted,
    /// Search failed; treated as an empty cycle.
    SearchFailed,
    Cancelled,
}

impl fmt::Display for CycleTermination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Complete => "complete",
            Self::BudgetExhausted => "budget_exhausted",
            Self::SearchFailed => "search_failed",
            Self::Cancelled => "cancelled",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub candidates: u32,
    pub archived_skipped: u32,
    pub manifests_missing: u32,
    pub unreadable: u32,
    pub clean: u32,
    pub detected: u32,
    pub published: u32,
    pub skipped: u32,
    pub failed: u32,
    pub pauses: u32,
    pub termination: CycleTermination,
}

pub struct Orchestrator<'a> {
    gateway: &'a dyn RepositoryGateway,
    detector: &'a Detector,
    settings: &'a CycleSettings,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        gateway: &'a dyn RepositoryGateway,
        detector: &'a Detector,
        settings: &'a CycleSettings,
    ) -> Self {
        Self {
            gateway,
            detector,
            settings,
        }
    }

    /// Run one cycle. Per-candidate failures are contained and counted in the
    /// report; only escalating gateway errors come back as `Err`.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleReport> {
        let mut report = CycleReport::default();
        info!("searching for vulnerable repositories");

        let mut candidates = match CandidateSet::open(
            self.gateway,
            &self.settings.query,
            self.settings.per_page,
            self.settings.max_pages,
        )
        .await
        {
            Ok(set) => set,
            Err(e) => {
                error!("repository search failed: {e}");
                report.termination = CycleTermination::SearchFailed;
                return Ok(report);
            }
        };
        info!(total = candidates.total_count(), "candidate repositories found");

        let publisher = Publisher::new(self.gateway, self.settings.cleanup_orphans);
        let mut budget = CycleBudget::new(self.settings.action_limit);
        if budget.exhausted() {
            report.termination = CycleTermination::BudgetExhausted;
            return Ok(report);
        }

        loop {
            if cancel.is_cancelled() {
                report.termination = CycleTermination::Cancelled;
                break;
            }
            let Some(repo) = candidates.next().await else {
                break;
            };
            report.candidates += 1;

            if repo.archived {
                info!(repo = %repo.full_name, "repository is archived, skipping");
                report.archived_skipped += 1;
                continue;
            }

            let Some(plan) = self.inspect(repo, &mut report).await? else {
                continue;
            };
            report.detected += 1;

            let full_name = plan.repository.full_name.clone();
            match publisher.publish(plan).await? {
                PublishOutcome::Opened { .. } => {
                    budget.record();
                    report.published += 1;
                }
                PublishOutcome::Skipped { .. } => report.skipped += 1,
                PublishOutcome::Failed { .. } => report.failed += 1,
            }

            report.pauses += 1;
            debug!(repo = %full_name, delay_s = self.settings.action_delay.as_secs(), "pausing before next action");
            if !pause(self.settings.action_delay, cancel).await {
                report.termination = CycleTermination::Cancelled;
                break;
            }

            if budget.exhausted() {
                info!(actions = budget.used(), "action limit for this cycle reached");
                report.termination = CycleTermination::BudgetExhausted;
                break;
            }
        }

        Ok(report)
    }

    /// Read and scan the manifest. `None` means "nothing to do here".
    async fn inspect(
        &self,
        repo: RepositoryHandle,
        report: &mut CycleReport,
    ) -> Result<Option<RemediationPlan>> {
        info!(repo = %repo.full_name, "analysing repository");

        let snapshot = match self
            .gateway
            .read_file(&repo, &self.settings.manifest_path)
            .await
        {
            Ok(snapshot) => snapshot,
            Err(GatewayError::NotFound(_)) => {
                info!(repo = %repo.full_name, path = %self.settings.manifest_path, "no manifest, skipping");
                report.manifests_missing += 1;
                return Ok(None);
            }
            Err(e) if e.escalates() => return Err(e.into()),
            Err(e) => {
                error!(repo = %repo.full_name, "could not read manifest: {e}");
                report.unreadable += 1;
                return Ok(None);
            }
        };

        match self.detector.detect(&snapshot.content) {
            Some(detection) => {
                info!(
                    repo = %repo.full_name,
                    package = %detection.signature.package,
                    occurrences = detection.occurrences,
                    "vulnerable pin '{}' found",
                    detection.signature.vulnerable
                );
                Ok(Some(RemediationPlan::new(repo, snapshot, detection)))
            }
            None => {
                info!(repo = %repo.full_name, "no known vulnerability found");
                report.clean += 1;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_stops_at_limit() {
        let mut budget = CycleBudget::new(2);
        assert!(!budget.exhausted());
        budget.record();
        assert!(!budget.exhausted());
        budget.record();
        assert!(budget.exhausted());
        budget.record();
        assert_eq!(budget.used(), 2);
    }

    #[test]
    fn test_zero_budget_is_exhausted() {
        assert!(CycleBudget::new(0).exhausted());
    }

    #[test]
    fn test_settings_follow_config() {
        let config = Config::from_lookup(|key| match key {
            "TOKEN" => Some("t".to_string()),
            "CODEHEALER_ACTION_LIMIT" => Some("3".to_string()),
            "CODEHEALER_ACTION_DELAY_S" => Some("0".to_string()),
            _ => None,
        })
        .unwrap();
        let settings = CycleSettings::from(&config);
        assert_eq!(settings.action_limit, 3);
        assert_eq!(settings.action_delay, Duration::ZERO);
        assert_eq!(settings.query, SEARCH_QUERY);
        assert_eq!(settings.manifest_path, MANIFEST_PATH);
    }
}
