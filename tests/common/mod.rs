//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use resilient_proxy::queue::{ListStore, MemoryListStore};
use resilient_proxy::resilience::{BreakerSettings, CircuitBreaker, RateLimiter, RetryPolicy};
use resilient_proxy::status::{RequestStatus, StatusRecord, StatusStore};
use resilient_proxy::upstream::{ResilientClient, UpstreamResponse, UpstreamTransport};
use resilient_proxy::ProxyError;

pub const TARGET: &str = "http://upstream.test/data";

/// Transport replaying scripted outcomes; the last one repeats forever.
pub struct MockTransport {
    outcomes: Mutex<Vec<Result<UpstreamResponse, String>>>,
    calls: AtomicU32,
}

impl MockTransport {
    pub fn new(outcomes: Vec<Result<UpstreamResponse, String>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes),
            calls: AtomicU32::new(0),
        })
    }

    pub fn ok(body: &str) -> Arc<Self> {
        Self::new(vec![Ok(UpstreamResponse::new(200, body))])
    }

    pub fn status(status: u16) -> Arc<Self> {
        Self::new(vec![Ok(UpstreamResponse::new(status, "error"))])
    }

    pub fn unreachable() -> Arc<Self> {
        Self::new(vec![Err("client error".into())])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamTransport for MockTransport {
    async fn get(&self, _target: &str) -> Result<UpstreamResponse, ProxyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut outcomes = self.outcomes.lock().unwrap();
        let next = if outcomes.len() > 1 {
            outcomes.remove(0)
        } else {
            outcomes[0].clone()
        };
        next.map_err(ProxyError::UpstreamUnavailable)
    }
}

/// Knobs for a test client.
pub struct ClientOptions {
    pub rate: f64,
    pub burst: u32,
    pub failure_threshold: u32,
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            rate: 1000.0,
            burst: 1000,
            failure_threshold: 100,
            max_attempts: 1,
            base_delay: Duration::from_millis(10),
        }
    }
}

pub fn resilient_client(transport: Arc<dyn UpstreamTransport>, options: ClientOptions) -> ResilientClient {
    ResilientClient::new(
        transport,
        Arc::new(RateLimiter::new(options.rate, options.burst)),
        Arc::new(CircuitBreaker::new(BreakerSettings {
            failure_threshold: options.failure_threshold,
            interval: Duration::from_secs(60),
            open_timeout: Duration::from_secs(10),
            max_probe_requests: 5,
        })),
        RetryPolicy::new(options.max_attempts, options.base_delay),
    )
}

/// List store whose first `failures` pops fail, then delegates to memory.
pub struct FlakyListStore {
    inner: MemoryListStore,
    failures: AtomicU32,
    pub pop_attempts: AtomicU32,
}

impl FlakyListStore {
    pub fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryListStore::new(),
            failures: AtomicU32::new(failures),
            pop_attempts: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl ListStore for FlakyListStore {
    async fn push_left(&self, list: &str, value: String) -> Result<(), ProxyError> {
        self.inner.push_left(list, value).await
    }

    async fn pop_right_blocking(&self, list: &str) -> Result<String, ProxyError> {
        self.pop_attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ProxyError::StoreUnavailable("redis connection error".into()));
        }
        self.inner.pop_right_blocking(list).await
    }
}

/// List store that is always down.
pub struct BrokenListStore;

#[async_trait]
impl ListStore for BrokenListStore {
    async fn push_left(&self, _list: &str, _value: String) -> Result<(), ProxyError> {
        Err(ProxyError::StoreUnavailable("redis connection error".into()))
    }

    async fn pop_right_blocking(&self, _list: &str) -> Result<String, ProxyError> {
        Err(ProxyError::StoreUnavailable("redis connection error".into()))
    }
}

/// Status store that is always down.
pub struct BrokenStatusStore;

#[async_trait]
impl StatusStore for BrokenStatusStore {
    async fn create(&self, _record: StatusRecord) -> Result<(), ProxyError> {
        Err(ProxyError::StoreUnavailable("db down".into()))
    }

    async fn get_by_id(&self, _id: &str) -> Result<StatusRecord, ProxyError> {
        Err(ProxyError::StoreUnavailable("db down".into()))
    }

    async fn update_status(&self, _id: &str, _status: RequestStatus) -> Result<StatusRecord, ProxyError> {
        Err(ProxyError::StoreUnavailable("db down".into()))
    }
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check().await
}

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 1024];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
