//! In-memory backend for tests and local development
//!
//! [`MemoryBackend`] implements [`Backend`] without a broker. It records every
//! physical send, lets the test side deliver messages to consumers and inject
//! session events, and can fail session opens or sends on demand.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use kafka_facade::testing::MemoryBackend;
//! use kafka_facade::{Client, Config, Message};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let backend = MemoryBackend::new();
//! let client = Client::with_backend(
//!     Config::new("g1", "b1:9092", "t1,t2"),
//!     Arc::new(backend.clone()),
//! );
//!
//! client.sync_send(&Message::new("x").with_key("k")).await.unwrap();
//!
//! let topics: Vec<_> = backend.sent().into_iter().map(|r| r.topic).collect();
//! assert_eq!(topics, vec!["t1", "t2"]);
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::message::{Message, OutboundRecord};
use crate::session::{
    AsyncProducerSession, Backend, ConsumerSession, DeliveryReport, EventSender, Opened,
    SessionEvent, SessionKind, SyncProducerSession,
};

/// In-memory [`Backend`]. Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<State>,
    inbox_tx: mpsc::UnboundedSender<Message>,
    inbox_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Message>>,
}

#[derive(Debug, Default)]
struct State {
    opens: HashMap<SessionKind, usize>,
    closes: HashMap<SessionKind, usize>,
    fail_next_open: HashMap<SessionKind, String>,
    failing_topics: HashSet<String>,
    rejected_topics: HashSet<String>,
    open_delay: Option<Duration>,
    sent: Vec<OutboundRecord>,
    enqueued: Vec<OutboundRecord>,
    marked: Vec<Message>,
    events: HashMap<SessionKind, EventSender>,
    next_offsets: HashMap<String, i64>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                inbox_tx,
                inbox_rx: tokio::sync::Mutex::new(inbox_rx),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next open of `kind` fail with `message`.
    pub fn fail_next_open(&self, kind: SessionKind, message: &str) {
        self.state()
            .fail_next_open
            .insert(kind, message.to_string());
    }

    /// Make every send to `topic` fail.
    ///
    /// Sync sends return the error; async sends report it as an event.
    pub fn fail_topic(&self, topic: &str) {
        self.state().failing_topics.insert(topic.to_string());
    }

    /// Make async sessions refuse to enqueue records for `topic`.
    ///
    /// The refusal is reported as an event and nothing is enqueued.
    pub fn reject_topic(&self, topic: &str) {
        self.state().rejected_topics.insert(topic.to_string());
    }

    /// Delay every session open, to widen races in concurrency tests.
    pub fn set_open_delay(&self, delay: Duration) {
        self.state().open_delay = Some(delay);
    }

    /// Deliver a message to the consumer, assigning partition 0 and the next
    /// offset for its topic.
    pub fn deliver(&self, topic: &str, key: &[u8], value: &[u8]) -> Message {
        let offset = {
            let mut state = self.state();
            let next = state.next_offsets.entry(topic.to_string()).or_insert(0);
            let offset = *next;
            *next += 1;
            offset
        };

        let message = Message {
            value: value.to_vec(),
            key: key.to_vec(),
            topic: topic.to_string(),
            partition: 0,
            offset,
        };
        self.deliver_message(message.clone());
        message
    }

    /// Deliver a fully specified message to the consumer.
    pub fn deliver_message(&self, message: Message) {
        // The receiver lives as long as `shared`, so this cannot fail.
        let _ = self.shared.inbox_tx.send(message);
    }

    /// Inject an event into the active session of `kind`.
    ///
    /// Returns `false` if that session has no open event channel.
    pub fn emit(&self, kind: SessionKind, event: SessionEvent) -> bool {
        match self.state().events.get(&kind) {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Number of successful opens of `kind`.
    pub fn open_count(&self, kind: SessionKind) -> usize {
        self.state().opens.get(&kind).copied().unwrap_or(0)
    }

    /// Number of closes of `kind`.
    pub fn close_count(&self, kind: SessionKind) -> usize {
        self.state().closes.get(&kind).copied().unwrap_or(0)
    }

    /// Records acknowledged by sync producer sessions, in order.
    pub fn sent(&self) -> Vec<OutboundRecord> {
        self.state().sent.clone()
    }

    /// Records enqueued on async producer sessions, in order.
    pub fn enqueued(&self) -> Vec<OutboundRecord> {
        self.state().enqueued.clone()
    }

    /// Messages whose offsets were marked by consumer sessions, in order.
    pub fn marked(&self) -> Vec<Message> {
        self.state().marked.clone()
    }

    async fn begin_open(&self, kind: SessionKind) -> Result<()> {
        let delay = self.state().open_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if let Some(message) = state.fail_next_open.remove(&kind) {
            return Err(ClientError::setup(kind, message));
        }
        *state.opens.entry(kind).or_insert(0) += 1;
        Ok(())
    }

    fn register_events(&self, kind: SessionKind) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state().events.insert(kind, tx);
        rx
    }

    fn record_close(&self, kind: SessionKind) {
        let mut state = self.state();
        *state.closes.entry(kind).or_insert(0) += 1;
        state.events.remove(&kind);
    }
}

#[async_trait::async_trait]
impl Backend for MemoryBackend {
    async fn open_consumer(&self, config: &Config) -> Result<Opened<dyn ConsumerSession>> {
        config.broker_list()?;
        config.topic_list()?;
        self.begin_open(SessionKind::Consumer).await?;

        Ok(Opened {
            session: Arc::new(MemoryConsumer {
                backend: self.clone(),
                closed: CancellationToken::new(),
            }),
            events: self.register_events(SessionKind::Consumer),
        })
    }

    async fn open_sync_producer(&self, config: &Config) -> Result<Arc<dyn SyncProducerSession>> {
        config.broker_list()?;
        config.topic_list()?;
        self.begin_open(SessionKind::SyncProducer).await?;

        Ok(Arc::new(MemorySyncProducer {
            backend: self.clone(),
            closed: CancellationToken::new(),
        }))
    }

    async fn open_async_producer(
        &self,
        config: &Config,
    ) -> Result<Opened<dyn AsyncProducerSession>> {
        config.broker_list()?;
        config.topic_list()?;
        self.begin_open(SessionKind::AsyncProducer).await?;

        Ok(Opened {
            session: Arc::new(MemoryAsyncProducer {
                backend: self.clone(),
                closed: CancellationToken::new(),
            }),
            events: self.register_events(SessionKind::AsyncProducer),
        })
    }
}

struct MemoryConsumer {
    backend: MemoryBackend,
    closed: CancellationToken,
}

#[async_trait::async_trait]
impl ConsumerSession for MemoryConsumer {
    async fn recv(&self) -> Option<Message> {
        let mut inbox = tokio::select! {
            _ = self.closed.cancelled() => return None,
            inbox = self.backend.shared.inbox_rx.lock() => inbox,
        };

        tokio::select! {
            _ = self.closed.cancelled() => None,
            message = inbox.recv() => message,
        }
    }

    fn mark_offset(&self, message: &Message) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(ClientError::Closed);
        }
        self.backend.state().marked.push(message.clone());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.cancel();
        self.backend.record_close(SessionKind::Consumer);
        Ok(())
    }
}

struct MemorySyncProducer {
    backend: MemoryBackend,
    closed: CancellationToken,
}

#[async_trait::async_trait]
impl SyncProducerSession for MemorySyncProducer {
    async fn send(&self, record: OutboundRecord) -> Result<DeliveryReport> {
        if self.closed.is_cancelled() {
            return Err(ClientError::Closed);
        }

        let mut state = self.backend.state();
        if state.failing_topics.contains(&record.topic) {
            return Err(ClientError::send(record.topic, "Message timed out"));
        }

        let report = DeliveryReport {
            topic: record.topic.clone(),
            partition: record.partition.unwrap_or(0),
            offset: state.sent.len() as i64,
        };
        state.sent.push(record);
        Ok(report)
    }

    async fn close(&self) -> Result<()> {
        self.closed.cancel();
        self.backend.record_close(SessionKind::SyncProducer);
        Ok(())
    }
}

struct MemoryAsyncProducer {
    backend: MemoryBackend,
    closed: CancellationToken,
}

#[async_trait::async_trait]
impl AsyncProducerSession for MemoryAsyncProducer {
    async fn enqueue(&self, record: OutboundRecord) -> Result<bool> {
        if self.closed.is_cancelled() {
            return Err(ClientError::Closed);
        }

        let event = {
            let mut state = self.backend.state();
            if state.rejected_topics.contains(&record.topic) {
                None
            } else {
                let event = if state.failing_topics.contains(&record.topic) {
                    SessionEvent::error(Some(&record.topic), "delivery failed: Message timed out")
                } else {
                    SessionEvent::Delivered(DeliveryReport {
                        topic: record.topic.clone(),
                        partition: record.partition.unwrap_or(0),
                        offset: state.enqueued.len() as i64,
                    })
                };
                state.enqueued.push(record.clone());
                Some(event)
            }
        };

        match event {
            Some(event) => {
                self.backend.emit(SessionKind::AsyncProducer, event);
                Ok(true)
            }
            None => {
                self.backend.emit(
                    SessionKind::AsyncProducer,
                    SessionEvent::error(
                        Some(&record.topic),
                        "enqueue failed: Broker: Message size too large",
                    ),
                );
                Ok(false)
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.cancel();
        self.backend.record_close(SessionKind::AsyncProducer);
        Ok(())
    }
}
