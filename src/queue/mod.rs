//! Async request queue.
//!
//! # Data Flow
//! ```text
//! async handler
//!     → Queue::enqueue (serialize {id, data}, push on the left)
//!     → ListStore (memory.rs, or any external list store)
//!     → Queue::dequeue (blocking pop on the right, deserialize)
//!     → consumer worker
//! ```
//!
//! # Design Decisions
//! - One logical FIFO list, not partitioned by identifier
//! - No acknowledgement: a popped entry belongs to the worker that popped it
//! - Store failures surface as `StoreUnavailable` and are never retried here

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProxyError;
use crate::observability::metrics;

pub use memory::MemoryListStore;

/// Request body carried through the queue byte for byte.
///
/// Encoded as a JSON string when the body is valid UTF-8 and as an array of
/// byte values otherwise. The body itself is never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Bytes(Vec<u8>),
}

impl Payload {
    pub fn from_bytes(body: &[u8]) -> Self {
        match std::str::from_utf8(body) {
            Ok(text) => Payload::Text(text.to_string()),
            Err(_) => Payload::Bytes(body.to_vec()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(text) => text.as_bytes(),
            Payload::Bytes(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

/// Wire format of one queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub id: String,
    pub data: Payload,
}

/// Capability of an external durable list store.
///
/// `pop_right_blocking` must be cancel-safe: dropping the future before it
/// resolves must not remove an entry.
#[async_trait]
pub trait ListStore: Send + Sync {
    async fn push_left(&self, list: &str, value: String) -> Result<(), ProxyError>;

    /// Wait until `list` has an entry, then remove and return the rightmost one.
    async fn pop_right_blocking(&self, list: &str) -> Result<String, ProxyError>;
}

/// FIFO queue of pending requests on top of a [`ListStore`].
#[derive(Clone)]
pub struct Queue {
    store: Arc<dyn ListStore>,
    name: String,
}

impl Queue {
    pub fn new(store: Arc<dyn ListStore>, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serialize and append. Visible to `dequeue` once this returns `Ok`.
    pub async fn enqueue(&self, id: &str, data: &Payload) -> Result<(), ProxyError> {
        let entry = serde_json::to_string(&QueuedRequest {
            id: id.to_string(),
            data: data.clone(),
        })?;

        let result = self.store.push_left(&self.name, entry).await;
        metrics::record_queue_op("enqueue", if result.is_ok() { "ok" } else { "error" });
        match &result {
            Ok(()) => tracing::debug!(request_id = %id, queue = %self.name, "Request enqueued"),
            Err(e) => tracing::error!(request_id = %id, queue = %self.name, error = %e, "Enqueue failed"),
        }
        result
    }

    /// Block until an entry is available and decode it.
    pub async fn dequeue(&self) -> Result<QueuedRequest, ProxyError> {
        let raw = match self.store.pop_right_blocking(&self.name).await {
            Ok(raw) => raw,
            Err(e) => {
                metrics::record_queue_op("dequeue", "error");
                return Err(e);
            }
        };

        let request: QueuedRequest = match serde_json::from_str(&raw) {
            Ok(request) => request,
            Err(e) => {
                metrics::record_queue_op("dequeue", "malformed");
                return Err(e.into());
            }
        };
        metrics::record_queue_op("dequeue", "ok");
        tracing::debug!(request_id = %request.id, queue = %self.name, "Request dequeued");
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    struct BrokenStore;

    #[async_trait]
    impl ListStore for BrokenStore {
        async fn push_left(&self, _list: &str, _value: String) -> Result<(), ProxyError> {
            Err(ProxyError::StoreUnavailable("connection refused".into()))
        }

        async fn pop_right_blocking(&self, _list: &str) -> Result<String, ProxyError> {
            Err(ProxyError::StoreUnavailable("connection refused".into()))
        }
    }

    /// Records the name and labels of every counter touched.
    #[derive(Default)]
    struct LabelRecorder {
        seen: std::sync::Mutex<Vec<String>>,
    }

    impl ::metrics::Recorder for LabelRecorder {
        fn describe_counter(&self, _: ::metrics::KeyName, _: Option<::metrics::Unit>, _: ::metrics::SharedString) {}
        fn describe_gauge(&self, _: ::metrics::KeyName, _: Option<::metrics::Unit>, _: ::metrics::SharedString) {}
        fn describe_histogram(&self, _: ::metrics::KeyName, _: Option<::metrics::Unit>, _: ::metrics::SharedString) {}

        fn register_counter(&self, key: &::metrics::Key, _: &::metrics::Metadata<'_>) -> ::metrics::Counter {
            let labels: Vec<String> = key
                .labels()
                .map(|label| format!("{}={}", label.key(), label.value()))
                .collect();
            self.seen
                .lock()
                .unwrap()
                .push(format!("{} {}", key.name(), labels.join(" ")));
            ::metrics::Counter::noop()
        }

        fn register_gauge(&self, _: &::metrics::Key, _: &::metrics::Metadata<'_>) -> ::metrics::Gauge {
            ::metrics::Gauge::noop()
        }

        fn register_histogram(&self, _: &::metrics::Key, _: &::metrics::Metadata<'_>) -> ::metrics::Histogram {
            ::metrics::Histogram::noop()
        }
    }

    fn memory_queue() -> (Arc<MemoryListStore>, Queue) {
        let store = Arc::new(MemoryListStore::new());
        let queue = Queue::new(store.clone(), "request_queue");
        (store, queue)
    }

    #[tokio::test]
    async fn test_round_trip_preserves_payload() {
        let (_, queue) = memory_queue();
        let payload = Payload::from(r#"{"key": "value", "nested": [1, 2, {"x": null}]}"#);

        queue.enqueue("x", &payload).await.unwrap();
        let request = queue.dequeue().await.unwrap();

        assert_eq!(request.id, "x");
        assert_eq!(request.data, payload);
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (_, queue) = memory_queue();
        for id in ["a", "b", "c"] {
            queue.enqueue(id, &Payload::from(id)).await.unwrap();
        }
        for id in ["a", "b", "c"] {
            assert_eq!(queue.dequeue().await.unwrap().id, id);
        }
    }

    #[tokio::test]
    async fn test_wire_format() {
        let (store, queue) = memory_queue();
        queue.enqueue("req-1", &Payload::from(r#"{"data": "test"}"#)).await.unwrap();
        queue.enqueue("req-2", &Payload::from_bytes(&[0xff, 0x00])).await.unwrap();

        let raw = store.pop_right_blocking("request_queue").await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, json!({"id": "req-1", "data": r#"{"data": "test"}"#}));

        let raw = store.pop_right_blocking("request_queue").await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, json!({"id": "req-2", "data": [255, 0]}));
    }

    #[tokio::test]
    async fn test_dequeue_waits_for_enqueue() {
        let (_, queue) = memory_queue();
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        queue.enqueue("late", &Payload::from("")).await.unwrap();
        let request = consumer.await.unwrap().unwrap();
        assert_eq!(request.id, "late");
    }

    #[tokio::test]
    async fn test_body_bytes_survive_unchanged() {
        let (_, queue) = memory_queue();
        let bodies: [&[u8]; 5] = [
            br#"{"n":12345678901234567890123}"#,
            b"  \n",
            b"",
            b"caf\xc3\xa9",
            &[0x80, 0xfe, b'a', 0x00],
        ];

        for (i, body) in bodies.iter().enumerate() {
            queue.enqueue(&i.to_string(), &Payload::from_bytes(body)).await.unwrap();
        }
        for body in bodies {
            assert_eq!(queue.dequeue().await.unwrap().data.as_bytes(), body);
        }
    }

    #[tokio::test]
    async fn test_malformed_entry() {
        let (store, queue) = memory_queue();
        store.push_left("request_queue", "invalid data".into()).await.unwrap();

        assert!(matches!(queue.dequeue().await, Err(ProxyError::MalformedEntry(_))));
    }

    #[test]
    fn test_malformed_dequeue_not_counted_as_ok() {
        let (store, queue) = memory_queue();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(store.push_left("request_queue", "invalid data".into()))
            .unwrap();

        let recorder = LabelRecorder::default();
        ::metrics::with_local_recorder(&recorder, || {
            let _ = rt.block_on(queue.dequeue());
        });

        let seen = recorder.seen.lock().unwrap();
        assert!(seen.contains(&"proxy_queue_operations_total op=dequeue result=malformed".to_string()));
        assert!(!seen.iter().any(|entry| entry.ends_with("result=ok")));
    }

    #[tokio::test]
    async fn test_store_failures_surface() {
        let queue = Queue::new(Arc::new(BrokenStore), "request_queue");
        assert!(matches!(
            queue.enqueue("id", &Payload::from("{}")).await,
            Err(ProxyError::StoreUnavailable(_))
        ));
        assert!(matches!(queue.dequeue().await, Err(ProxyError::StoreUnavailable(_))));
    }
}
