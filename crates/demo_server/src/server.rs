//! Bounded serving of the axum application
//!
//! `with_graceful_shutdown` waits for in-flight connections without any
//! bound of its own; this module races that drain against the configured
//! deadline so a hung connection cannot stall the rest of teardown.

use std::future::IntoFuture;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::warn;

/// Drive the server to completion, bounding the connection drain.
///
/// `drain_started` fires when the shutdown signal is received; from that
/// point the server has `deadline` to finish draining before the serve
/// future is dropped, closing whatever connections are still open.
pub async fn serve_with_deadline<S>(
    server: S,
    drain_started: oneshot::Receiver<()>,
    deadline: Duration,
) -> std::io::Result<()>
where
    S: IntoFuture<Output = std::io::Result<()>>,
{
    tokio::select! {
        result = server.into_future() => result,
        () = async {
            // The deadline arms only once the drain has begun.
            drain_started.await.ok();
            tokio::time::sleep(deadline).await;
        } => {
            warn!(
                "Connections still open after {:?}, closing them now",
                deadline
            );
            Ok(())
        }
    }
}
