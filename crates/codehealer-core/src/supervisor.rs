use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    config::Config,
    cycle::{CycleSettings, CycleTermination, Orchestrator},
    detector::Detector,
    gateway::RepositoryGateway,
    pacing::pause,
};

/// Runs cycles forever: a completed cycle is followed by `cycle_interval`,
/// an escalated error by `fatal_backoff`. No state survives between cycles.
pub struct Supervisor {
    gateway: Arc<dyn RepositoryGateway>,
    detector: Detector,
    settings: CycleSettings,
    cycle_interval: Duration,
    fatal_backoff: Duration,
}

impl Supervisor {
    pub fn new(gateway: Arc<dyn RepositoryGateway>, config: &Config) -> Self {
        Self::with_settings(
            gateway,
            Detector::builtin(),
            CycleSettings::from(config),
            config.cycle_interval(),
            config.fatal_backoff(),
        )
    }

    pub fn with_settings(
        gateway: Arc<dyn RepositoryGateway>,
        detector: Detector,
        settings: CycleSettings,
        cycle_interval: Duration,
        fatal_backoff: Duration,
    ) -> Self {
        Self {
            gateway,
            detector,
            settings,
            cycle_interval,
            fatal_backoff,
        }
    }

    /// Run one cycle and return how long to wait before the next one.
    pub async fn run_once(&self, cancel: &CancellationToken) -> Duration {
        let orchestrator = Orchestrator::new(self.gateway.as_ref(), &self.detector, &self.settings);
        match orchestrator.run_cycle(cancel).await {
            Ok(report) => {
                info!(
                    termination = %report.termination,
                    candidates = report.candidates,
                    detected = report.detected,
                    published = report.published,
                    skipped = report.skipped,
                    failed = report.failed,
                    "cycle finished"
                );
                if report.termination == CycleTermination::Cancelled {
                    return Duration::ZERO;
                }
                info!(wait_s = self.cycle_interval.as_secs(), "waiting for next scan");
                self.cycle_interval
            }
            Err(e) => {
                error!("fatal error in cycle: {e}");
                info!(wait_s = self.fatal_backoff.as_secs(), "backing off before restarting the cycle");
                self.fatal_backoff
            }
        }
    }

    /// Loop until `cancel` fires. Returns the number of cycles started.
    pub async fn run(&self, cancel: CancellationToken) -> u64 {
        let mut cycles = 0u64;
        while !cancel.is_cancelled() {
            cycles += 1;
            let wait = self.run_once(&cancel).await;
            if !pause(wait, &cancel).await {
                break;
            }
        }
        info!(cycles, "supervisor stopped");
        cycles
    }
}
