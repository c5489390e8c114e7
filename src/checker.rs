use crate::engine::Engine;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

/// Background refresh scheduler. Runs in a tokio task until Rocket shuts down.
pub async fn run_checker(engine: Arc<Engine>, interval: Duration, shutdown: rocket::Shutdown) {
    run_schedule(engine, interval, shutdown).await
}

/// Refresh every source, prune history, sleep `interval`; repeat until `shutdown` resolves.
/// History is flushed on the way out.
pub async fn run_schedule<S>(engine: Arc<Engine>, interval: Duration, shutdown: S)
where
    S: Future<Output = ()> + Clone,
{
    tracing::info!(interval_secs = interval.as_secs(), "scheduler started");
    loop {
        tokio::select! {
            _ = engine.refresh_all() => {},
            _ = shutdown.clone() => break,
        }

        engine.prune_history();

        tokio::select! {
            _ = time::sleep(interval) => {},
            _ = shutdown.clone() => break,
        }
    }

    if let Err(e) = engine.flush_history() {
        tracing::error!(error = %e, "failed to flush history on shutdown");
    }
    tracing::info!("scheduler stopped");
}
