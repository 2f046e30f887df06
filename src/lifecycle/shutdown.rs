//! Shutdown coordination.
//!
//! The watcher is the only place that calls `Service::shutdown`. It waits
//! for either the shutdown request or the root scope; whichever comes first
//! wins, so shutdown runs at most once and the task never outlives the scope.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::lifecycle::startup::Service;

/// Wait for `request`, then drain the service and cancel the scope.
///
/// Returns `true` when the request fired, `false` when the scope was
/// cancelled first.
pub async fn watch<S, F>(scope: CancellationToken, service: Arc<S>, request: F) -> bool
where
    S: Service + ?Sized,
    F: Future<Output = ()> + Send,
{
    tokio::select! {
        () = request => {
            tracing::info!("Shutdown requested, draining server");
            if let Err(e) = service.shutdown(&scope).await {
                tracing::warn!(error = %e, "Server shutdown failed");
            }
            scope.cancel();
            true
        }
        () = scope.cancelled() => false,
    }
}
