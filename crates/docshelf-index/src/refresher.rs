//! Periodic background refresh.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::index::DocumentIndex;

/// Background task refreshing a [`DocumentIndex`] on a fixed interval.
///
/// The first refresh runs as soon as the task starts. Ticks follow the wall
/// clock; a tick missed because a scan ran long is skipped rather than
/// replayed.
pub struct Refresher {
    shutdown_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Refresher {
    /// Spawn the refresh loop on the current tokio runtime.
    pub fn spawn(index: Arc<DocumentIndex>, root: PathBuf, interval: Duration) -> Self {
        Self::spawn_with_token(index, root, interval, CancellationToken::new())
    }

    /// Spawn the refresh loop, stopping when `shutdown_token` is cancelled.
    pub fn spawn_with_token(
        index: Arc<DocumentIndex>,
        root: PathBuf,
        interval: Duration,
        shutdown_token: CancellationToken,
    ) -> Self {
        let token = shutdown_token.clone();
        let handle = tokio::spawn(run(index, root, interval, token));
        Self {
            shutdown_token,
            handle,
        }
    }

    /// A clone of the token that stops this refresher.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Check if the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the loop and wait for it to exit.
    ///
    /// A refresh already in progress is allowed to finish first.
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();
        if let Err(e) = self.handle.await {
            warn!("Document refresher exited abnormally: {}", e);
        }
    }
}

async fn run(index: Arc<DocumentIndex>, root: PathBuf, interval: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        root = %root.display(),
        interval_secs = interval.as_secs(),
        "document refresher started"
    );

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // Failures are logged by the index; the old snapshot stays live
        // until a later tick succeeds.
        let _ = index.refresh(&root).await;
    }

    info!("document refresher stopped");
}
