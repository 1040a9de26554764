//! Deferred collection worker pool.
//!
//! Request handlers hand URLs to a bounded queue and return immediately. A
//! dispatcher task owned by the process drains the queue, running up to
//! `concurrency` collections at once. When every [`CollectionQueue`] handle is
//! dropped the dispatcher finishes the queued work and exits.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use urlmeta_core::Collector;

/// The worker pool has shut down and no longer accepts work.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("collection queue is closed")]
pub struct QueueClosed;

/// Sending half of the deferred collection queue.
#[derive(Clone, Debug)]
pub struct CollectionQueue {
    tx: mpsc::Sender<String>,
}

impl CollectionQueue {
    /// Spawn the dispatcher and return the queue handle plus the dispatcher's JoinHandle.
    ///
    /// Await the handle after dropping every queue clone to wait for queued work to drain.
    pub fn start(collector: Collector, capacity: usize, concurrency: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(dispatch(collector, rx, concurrency.max(1)));
        (Self { tx }, handle)
    }

    /// Schedule a deferred collection for `url` without waiting.
    ///
    /// When the queue is full the handoff moves to a detached task that waits
    /// for space, so a pending placeholder is never left without a collection.
    pub fn enqueue(&self, url: String) -> Result<(), QueueClosed> {
        match self.tx.try_send(url) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(url)) => {
                tracing::warn!(url = %url, "collection queue full, handing off in background");
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = tx.send(url).await {
                        tracing::error!(url = %e.0, "collection queue closed before handoff, record left pending");
                    }
                });
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(QueueClosed),
        }
    }
}

async fn dispatch(collector: Collector, mut rx: mpsc::Receiver<String>, concurrency: usize) {
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut join_set = JoinSet::new();

    tracing::info!(concurrency, "collection workers started");

    while let Some(url) = rx.recv().await {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let collector = collector.clone();

        join_set.spawn(async move {
            let _permit = permit;
            tracing::info!(url = %url, "starting deferred collection");
            match collector.collect(&url).await {
                Ok(status) => tracing::info!(url = %url, status = %status, "deferred collection finished"),
                Err(e) => tracing::error!(url = %url, error = %e, "deferred collection failed, record left pending"),
            }
        });

        while let Some(result) = join_set.try_join_next() {
            log_join_error(result);
        }
    }

    while let Some(result) = join_set.join_next().await {
        log_join_error(result);
    }

    tracing::info!("collection workers stopped");
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "deferred collection task aborted");
    }
}
