//! Startup orchestration.
//!
//! # Responsibilities
//! - Build stores, queue, limiter, breaker, transport and client from config
//! - Start the consumer pool
//! - Bind the listener and serve until shutdown, then stop workers and save
//!   snapshots
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listener binds last (traffic only when ready)

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::ProxyConfig;
use crate::consumer::ConsumerPool;
use crate::error::ProxyError;
use crate::http::{AppState, HttpServer};
use crate::lifecycle::Shutdown;
use crate::queue::{MemoryListStore, Queue};
use crate::status::MemoryStatusStore;
use crate::upstream::{HttpTransport, ResilientClient};

/// Errors that abort startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to load snapshot: {0}")]
    Snapshot(std::io::Error),

    #[error("failed to build upstream transport: {0}")]
    Transport(#[from] ProxyError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// Wire every subsystem and serve until `shutdown` fires.
pub async fn run(config: ProxyConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    let list_store = Arc::new(match &config.queue.snapshot_path {
        Some(path) => MemoryListStore::load_from_file(path).map_err(StartupError::Snapshot)?,
        None => MemoryListStore::new(),
    });
    let status_store = Arc::new(match &config.status.snapshot_path {
        Some(path) => MemoryStatusStore::load_from_file(path).map_err(StartupError::Snapshot)?,
        None => MemoryStatusStore::new(),
    });

    let queue = Queue::new(list_store.clone(), config.queue.name.clone());
    let transport = Arc::new(HttpTransport::new(&config.upstream)?);
    let client = ResilientClient::from_config(&config, transport);

    let pool = ConsumerPool::new(
        queue.clone(),
        status_store.clone(),
        client.clone(),
        config.upstream.target.clone(),
        config.consumer.clone(),
    )
    .spawn(&shutdown);

    let state = AppState::new(client, queue, status_store.clone(), config.upstream.target.clone());
    let server = HttpServer::new(&config, state);

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;

    let served = server.run(listener, shutdown.subscribe()).await;

    // The server only returns on shutdown or error; stop the workers either way.
    shutdown.trigger();
    pool.join().await;

    if let Err(e) = list_store.save_to_file() {
        tracing::error!(error = %e, "Failed to save queue snapshot");
    }
    if let Err(e) = status_store.save_to_file() {
        tracing::error!(error = %e, "Failed to save status snapshot");
    }

    served.map_err(StartupError::Serve)
}
