mod logging;

use std::sync::Arc;

use anyhow::Context;
use codehealer_core::{
    config::{Config, LogFormat},
    supervisor::Supervisor,
};
use codehealer_github::GithubGateway;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

// ── Shutdown ──────────────────────────────────────────────────────────────

/// Cancel `token` on Ctrl-C or SIGTERM.
fn spawn_shutdown_listener(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => {
                    warn!("failed to listen for SIGTERM: {e}");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate => {}
        }
        info!("shutdown requested, finishing current step");
        token.cancel();
    });
}

// ── main ──────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(LogFormat::from_env());
    info!("+++ CodeHealer bot starting +++");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}; shutting down");
            return Err(e.into());
        }
    };
    info!(api = %config.api_url, "configuration loaded");

    let gateway = GithubGateway::new(
        config.github_token.clone(),
        config.api_url.clone(),
        config.http_timeout(),
    )
    .context("creating GitHub client")?;

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    info!(
        action_limit = config.action_limit,
        cycle_interval_s = config.cycle_interval_s,
        "authenticated session ready, entering main loop"
    );
    let supervisor = Supervisor::new(Arc::new(gateway), &config);
    supervisor.run(cancel).await;

    info!("CodeHealer bot stopped");
    Ok(())
}
