//! Background session reaper.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::state::AppState;

/// Periodically drop finished and expired sessions until `shutdown` changes.
pub async fn session_reaper(
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
    interval_secs: u64,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    info!(interval_secs, "session reaper started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = state.sessions.reap().await;
                if report.finished > 0 || report.expired > 0 {
                    let remaining = state.sessions.len().await;
                    info!(
                        finished = report.finished,
                        expired = report.expired,
                        remaining,
                        "session reaper tick complete"
                    );
                } else {
                    debug!("session reaper tick: nothing to reap");
                }
            }
            _ = shutdown.changed() => {
                info!("session reaper shutting down");
                return;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sahayak_core::delivery::{DeliveryContext, DeliveryMethod};
    use tokio::time::sleep;

    use super::*;
    use crate::config::ServerConfig;

    #[tokio::test(start_paused = true)]
    async fn reaper_clears_finished_sessions_and_stops_on_shutdown() {
        let state = Arc::new(AppState::from_config(&ServerConfig::default()));
        let view = state
            .sessions
            .open(
                "teacher".to_owned(),
                DeliveryContext::new(DeliveryMethod::Email, "ravi@example.com"),
            )
            .await
            .unwrap();
        state.sessions.handle(view.id).await.unwrap().submit().await.unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(session_reaper(Arc::clone(&state), shutdown_rx, 1));

        // Verified at 1.5 s, redirected at 3.5 s, seen closed at 4 s, removed at 5 s.
        sleep(Duration::from_millis(5_500)).await;
        assert!(state.sessions.is_empty().await);

        shutdown_tx.send(true).unwrap();
        worker.await.unwrap();
    }
}
