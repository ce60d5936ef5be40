//! Queue consumer pool.
//!
//! # Data Flow
//! ```text
//! worker loop (one task per worker):
//!     Queue::dequeue (waits; abandoned on shutdown)
//!     → StatusStore: processing
//!     → ResilientClient::get(upstream target)
//!     → StatusStore: processed | failed
//! ```
//!
//! # Design Decisions
//! - A worker never exits on an error: dequeue failures pause for
//!   `dequeue_retry_delay_ms`, upstream failures end the item as `failed`
//! - Failed items are not re-queued
//! - Shutdown is observed while waiting, never in the middle of an item
//! - Workers share nothing but the limiter and breaker inside the client

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::ConsumerConfig;
use crate::error::ProxyError;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::queue::{QueuedRequest, Queue};
use crate::status::{RequestStatus, StatusRecord, StatusStore};
use crate::upstream::ResilientClient;

/// Workers draining the request queue.
pub struct ConsumerPool {
    queue: Queue,
    statuses: Arc<dyn StatusStore>,
    client: ResilientClient,
    target: String,
    config: ConsumerConfig,
}

impl ConsumerPool {
    pub fn new(
        queue: Queue,
        statuses: Arc<dyn StatusStore>,
        client: ResilientClient,
        target: impl Into<String>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            queue,
            statuses,
            client,
            target: target.into(),
            config,
        }
    }

    /// Start `config.workers` workers (at least one), each stopping when
    /// `shutdown` fires.
    pub fn spawn(self, shutdown: &Shutdown) -> PoolHandle {
        let worker_count = self.config.workers.max(1);
        let pool = Arc::new(self);

        let workers = (0..worker_count)
            .map(|worker| {
                let pool = pool.clone();
                let shutdown = shutdown.subscribe();
                tokio::spawn(async move { pool.run_worker(worker, shutdown).await })
            })
            .collect();

        tracing::info!(workers = worker_count, queue = %pool.queue.name(), "Consumer pool started");
        PoolHandle { workers }
    }

    async fn run_worker(&self, worker: usize, mut shutdown: broadcast::Receiver<()>) {
        tracing::debug!(worker, "Consumer worker started");

        loop {
            let dequeued = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                result = self.queue.dequeue() => result,
            };

            match dequeued {
                Ok(request) => {
                    self.process(worker, request).await;
                }
                Err(ProxyError::MalformedEntry(e)) => {
                    tracing::error!(worker, error = %e, "Dropping malformed queue entry");
                }
                Err(e) => {
                    tracing::error!(worker, error = %e, "Failed to dequeue request");
                    tokio::select! {
                        biased;
                        _ = shutdown.recv() => break,
                        _ = tokio::time::sleep(self.retry_delay()) => {}
                    }
                }
            }
        }

        tracing::debug!(worker, "Consumer worker stopped");
    }

    /// Run one dequeued request to a terminal status.
    pub async fn process(&self, worker: usize, request: QueuedRequest) -> RequestStatus {
        let id = request.id;

        if let Err(e) = self.statuses.update_status(&id, RequestStatus::Processing).await {
            tracing::warn!(worker, request_id = %id, error = %e, "Failed to mark request processing");
        }

        let outcome = match self.client.get(&self.target).await {
            Ok(body) => {
                tracing::info!(worker, request_id = %id, bytes = body.len(), "Request processed");
                RequestStatus::Processed
            }
            Err(e) => {
                tracing::error!(worker, request_id = %id, kind = e.kind(), error = %e, "Failed to make request");
                RequestStatus::Failed
            }
        };

        self.record_outcome(worker, &id, outcome).await;
        metrics::record_consumer_outcome(outcome.as_str());
        outcome
    }

    async fn record_outcome(&self, worker: usize, id: &str, status: RequestStatus) {
        let result = match self.statuses.update_status(id, status).await {
            // Enqueued without a status record: keep the outcome anyway.
            Err(ProxyError::NotFound(_)) => self.statuses.create(StatusRecord::new(id, status)).await,
            other => other.map(|_| ()),
        };

        if let Err(e) = result {
            tracing::error!(worker, request_id = %id, status = %status, error = %e, "Failed to update request status");
        }
    }

    fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.config.dequeue_retry_delay_ms)
    }
}

/// Join handles of running workers.
pub struct PoolHandle {
    workers: Vec<JoinHandle<()>>,
}

impl PoolHandle {
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Wait for every worker to stop.
    pub async fn join(self) {
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Consumer worker panicked");
            }
        }
    }
}
