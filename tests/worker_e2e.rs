// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end scenarios: a worker runtime driving each adapter against an
//! in-memory broker.

use async_trait::async_trait;
use relayq_amqp::{AmqpAdapter, AmqpChannel, AmqpConnector, AmqpDelivery};
use relayq_broker::{FnHandler, WorkerOptions};
use relayq_core::codec::{Envelope, JsonCodec, SerializationProvider};
use relayq_core::{Message, QueueSpec};
use relayq_visibility::{VisibilityAdapter, VisibilityClient, VisibilityDelivery};
use relayq_worker::WorkerRuntime;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// In-memory AMQP broker
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryAmqp {
    deliveries: Mutex<VecDeque<AmqpDelivery>>,
    acks: AtomicU64,
    rejects: AtomicU64,
    retry_publishes: Mutex<Vec<(Vec<u8>, u64)>>,
    next_tag: AtomicU64,
}

impl MemoryAmqp {
    fn enqueue(&self, message: &Message) {
        let payload = JsonCodec.encode(message).unwrap();
        let tag = self.next_tag.fetch_add(1, Ordering::SeqCst) + 1;
        self.deliveries.lock().unwrap().push_back(AmqpDelivery {
            delivery_tag: tag,
            payload,
        });
    }
}

struct MemoryAmqpChannel(Arc<MemoryAmqp>);

#[async_trait]
impl AmqpChannel for MemoryAmqpChannel {
    async fn declare_queue(&self, _queue: &str, _durable: bool) -> anyhow::Result<()> {
        Ok(())
    }

    async fn declare_retry_exchange(&self, queue: &str, _durable: bool) -> anyhow::Result<String> {
        Ok(format!("{queue}.retry.ex"))
    }

    async fn pop(&self, _queue: &str) -> anyhow::Result<Option<AmqpDelivery>> {
        Ok(self.0.deliveries.lock().unwrap().pop_front())
    }

    async fn ack(&self, _delivery_tag: u64) -> anyhow::Result<()> {
        self.0.acks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn reject(&self, _delivery_tag: u64) -> anyhow::Result<()> {
        self.0.rejects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn publish_with_ttl(
        &self,
        _exchange: &str,
        payload: &[u8],
        ttl_ms: u64,
    ) -> anyhow::Result<()> {
        self.0
            .retry_publishes
            .lock()
            .unwrap()
            .push((payload.to_vec(), ttl_ms));
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

struct MemoryAmqpConnector(Arc<MemoryAmqp>);

#[async_trait]
impl AmqpConnector for MemoryAmqpConnector {
    async fn channel(&self) -> anyhow::Result<Box<dyn AmqpChannel>> {
        Ok(Box::new(MemoryAmqpChannel(Arc::clone(&self.0))))
    }
}

// ---------------------------------------------------------------------------
// In-memory visibility queue
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryCloudQueue {
    deliveries: Mutex<VecDeque<VisibilityDelivery>>,
    deletes: AtomicU64,
    visibility_changes: Mutex<Vec<u64>>,
}

impl MemoryCloudQueue {
    fn enqueue(&self, message: &Message, receipt_handle: &str, receive_count: u32) {
        let payload = String::from_utf8(JsonCodec.encode(message).unwrap()).unwrap();
        let body = Envelope::new(payload, None).to_body().unwrap();
        self.deliveries.lock().unwrap().push_back(VisibilityDelivery {
            body,
            receipt_handle: receipt_handle.to_string(),
            receive_count,
        });
    }
}

struct MemoryCloudClient(Arc<MemoryCloudQueue>);

#[async_trait]
impl VisibilityClient for MemoryCloudClient {
    async fn resolve_queue_url(&self, queue: &str) -> anyhow::Result<String> {
        Ok(format!("https://queue.example/{queue}"))
    }

    async fn receive(
        &self,
        _queue_url: &str,
        _wait_seconds: u64,
    ) -> anyhow::Result<Option<VisibilityDelivery>> {
        Ok(self.0.deliveries.lock().unwrap().pop_front())
    }

    async fn delete(&self, _queue_url: &str, _receipt_handle: &str) -> anyhow::Result<()> {
        self.0.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn change_visibility(
        &self,
        _queue_url: &str,
        _receipt_handle: &str,
        timeout_seconds: u64,
    ) -> anyhow::Result<()> {
        self.0
            .visibility_changes
            .lock()
            .unwrap()
            .push(timeout_seconds);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn fast_options() -> WorkerOptions {
    WorkerOptions::default()
        .with_queue_poll_wait_seconds(0)
        .with_wait(false)
}

async fn wait_for(mut done: impl FnMut() -> bool) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within two seconds");
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn amqp_worker_consumes_and_acks_everything() {
    let broker = Arc::new(MemoryAmqp::default());
    for n in 0..3 {
        broker.enqueue(&Message::new("orders.created", json!({"n": n})).with_id(format!("m-{n}")));
    }

    let adapter = Arc::new(AmqpAdapter::with_connector(Arc::new(MemoryAmqpConnector(
        Arc::clone(&broker),
    ))));
    let worker = WorkerRuntime::builder()
        .queue(QueueSpec::new("orders"))
        .options(fast_options().with_thread_count(2))
        .adapter(adapter)
        .build()
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in = Arc::clone(&seen);
    worker
        .start(Arc::new(FnHandler::new(move |content, _| {
            seen_in.lock().unwrap().push(content["n"].clone());
            Ok(())
        })))
        .await
        .unwrap();

    wait_for(|| broker.acks.load(Ordering::SeqCst) == 3).await;
    worker.stop().await;
    worker.join().await.unwrap();

    assert_eq!(seen.lock().unwrap().len(), 3);
    assert!(broker.retry_publishes.lock().unwrap().is_empty());
    assert_eq!(worker.metrics_snapshot().acked, 3);
}

#[tokio::test]
async fn amqp_worker_republishes_failures_with_growing_ttl() {
    let broker = Arc::new(MemoryAmqp::default());
    broker.enqueue(
        &Message::new("orders.created", json!(null))
            .with_id("flaky")
            .with_retry_attempts(1),
    );

    let adapter = Arc::new(AmqpAdapter::with_connector(Arc::new(MemoryAmqpConnector(
        Arc::clone(&broker),
    ))));
    let queue = QueueSpec::new("orders")
        .with_retry_delay_ms(1_000)
        .with_max_retry_delay_ms(30_000)
        .with_back_off(true);
    let worker = WorkerRuntime::builder()
        .queue(queue)
        .options(fast_options())
        .adapter(adapter)
        .build()
        .unwrap();

    worker
        .start(Arc::new(FnHandler::new(|_, _| anyhow::bail!("flaky"))))
        .await
        .unwrap();

    wait_for(|| !broker.retry_publishes.lock().unwrap().is_empty()).await;
    worker.stop().await;
    worker.join().await.unwrap();

    let publishes = broker.retry_publishes.lock().unwrap();
    let (payload, ttl_ms) = &publishes[0];
    assert_eq!(*ttl_ms, 2_000); // second attempt at 1000 ms base
    let republished = JsonCodec.decode(payload).unwrap();
    assert_eq!(republished.retry_attempts, 2);
    assert_eq!(broker.rejects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cloud_worker_suppresses_duplicate_deliveries() {
    let queue = Arc::new(MemoryCloudQueue::default());
    let message = Message::new("orders.created", json!(null)).with_id("b");
    queue.enqueue(&message, "rh-1", 1);
    queue.enqueue(&message, "rh-2", 1);

    let adapter = Arc::new(VisibilityAdapter::with_client(Arc::new(MemoryCloudClient(
        Arc::clone(&queue),
    ))));
    let worker = WorkerRuntime::builder()
        .queue(QueueSpec::new("orders"))
        .options(fast_options())
        .adapter(adapter)
        .build()
        .unwrap();

    let calls = Arc::new(AtomicU64::new(0));
    let calls_in = Arc::clone(&calls);
    worker
        .start(Arc::new(FnHandler::new(move |_, _| {
            calls_in.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })))
        .await
        .unwrap();

    // Both receives end in a delete: one after handling, one as a
    // duplicate drop.
    wait_for(|| queue.deletes.load(Ordering::SeqCst) == 2).await;
    worker.stop().await;
    worker.join().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let snapshot = worker.metrics_snapshot();
    assert_eq!(snapshot.duplicates, 1);
    assert_eq!(snapshot.handled, 1);
}

#[tokio::test]
async fn cloud_worker_backs_off_through_visibility_timeouts() {
    let queue = Arc::new(MemoryCloudQueue::default());
    let message = Message::new("orders.created", json!(null)).with_id("slow");
    queue.enqueue(&message, "rh-1", 11); // ten prior deliveries

    let adapter = Arc::new(VisibilityAdapter::with_client(Arc::new(MemoryCloudClient(
        Arc::clone(&queue),
    ))));
    let spec = QueueSpec::new("orders")
        .with_max_retry_attempts(2_000)
        .with_retry_delay_ms(60_000)
        .with_max_retry_delay_ms(50_000_000)
        .with_back_off(true);
    let worker = WorkerRuntime::builder()
        .queue(spec)
        .options(fast_options())
        .adapter(adapter)
        .build()
        .unwrap();

    worker
        .start(Arc::new(FnHandler::new(|_, _| anyhow::bail!("not yet"))))
        .await
        .unwrap();

    wait_for(|| !queue.visibility_changes.lock().unwrap().is_empty()).await;
    worker.stop().await;
    worker.join().await.unwrap();

    assert_eq!(queue.visibility_changes.lock().unwrap()[0], 600);
    assert_eq!(queue.deletes.load(Ordering::SeqCst), 0);
}
