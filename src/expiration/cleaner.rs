use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::revocation::CacheBackend;
use crate::AppState;

/// Start the background sweep of expired revocation entries.
///
/// Only backends without native expiry need it; returns `None` when the
/// revocation store is disabled.
pub fn start_revocation_sweeper(state: Arc<AppState>) -> Option<JoinHandle<()>> {
    let backend = Arc::clone(state.revocations.backend()?);
    let interval = Duration::from_secs(state.config.cache.sweep_interval_seconds.max(1));

    Some(tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);

        loop {
            interval_timer.tick().await;
            run_sweep(backend.as_ref());
        }
    }))
}

fn run_sweep(backend: &dyn CacheBackend) -> usize {
    let purged = backend.purge_expired();
    if purged > 0 {
        debug!(entries_purged = purged, "Expired revocation entries purged");
    }
    purged
}
