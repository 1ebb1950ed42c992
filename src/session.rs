//! Broker session abstraction and lazy session slots
//!
//! This module defines the seam between the [`crate::Client`] facade and the
//! broker library. A [`Backend`] opens three kinds of sessions:
//!
//! - [`ConsumerSession`] -- consumer-group member subscribed to the
//!   configured topics.
//! - [`SyncProducerSession`] -- producer whose sends wait for broker
//!   acknowledgement.
//! - [`AsyncProducerSession`] -- producer whose sends only enqueue.
//!
//! Consumer and async producer sessions also hand back an event channel
//! carrying [`SessionEvent`]s. The client drains it with a
//! [`crate::drain::DrainTask`] so the library never blocks on it.
//!
//! Implementations: [`crate::kafka::KafkaBackend`] (rdkafka) and
//! [`crate::testing::MemoryBackend`] (in-memory).

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::config::Config;
use crate::drain::DrainTask;
use crate::error::{ClientError, Result};
use crate::message::{Message, OutboundRecord};

/// Which of the three client sessions an operation concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// Consumer-group session used by `receive`
    Consumer,
    /// Producer session used by `sync_send`
    SyncProducer,
    /// Producer session used by `async_send`
    AsyncProducer,
}

impl SessionKind {
    /// Short name used in logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consumer => "consumer",
            Self::SyncProducer => "sync producer",
            Self::AsyncProducer => "async producer",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a record landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Topic written to
    pub topic: String,
    /// Partition written to
    pub partition: i32,
    /// Offset assigned by the broker
    pub offset: i64,
}

/// Out-of-band event reported by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Consumer fetch error, client error, or failed async delivery
    Error {
        /// Topic concerned, when known
        topic: Option<String>,
        /// Error description from the broker library
        message: String,
    },
    /// Consumer-group notification such as a rebalance
    Notification(String),
    /// Successful async delivery
    Delivered(DeliveryReport),
}

impl SessionEvent {
    /// Build an error event.
    pub fn error(topic: Option<&str>, message: impl Into<String>) -> Self {
        Self::Error {
            topic: topic.map(str::to_string),
            message: message.into(),
        }
    }

    /// Whether this is an error event.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Sending half of a session's event channel.
pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// Receiving half of a session's event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// A freshly opened session plus its event channel.
pub struct Opened<S: ?Sized> {
    /// The session handle
    pub session: Arc<S>,
    /// Events to be drained for the lifetime of the session
    pub events: EventReceiver,
}

/// Consumer-group session subscribed to the configured topics.
#[async_trait::async_trait]
pub trait ConsumerSession: Send + Sync {
    /// Wait for the next message on any assigned partition.
    ///
    /// Per-message errors are reported on the event channel, not returned.
    /// Returns `None` once the session is closed.
    async fn recv(&self) -> Option<Message>;

    /// Mark `message` as consumed so the next commit covers it.
    ///
    /// # Errors
    ///
    /// Returns an error if the library rejects the offset.
    fn mark_offset(&self, message: &Message) -> Result<()>;

    /// Release the session. Pending `recv` calls return `None`.
    async fn close(&self) -> Result<()>;
}

/// Producer session whose sends wait for acknowledgement.
#[async_trait::async_trait]
pub trait SyncProducerSession: Send + Sync {
    /// Send one record and wait for the broker to acknowledge it.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Send` if delivery fails or times out.
    async fn send(&self, record: OutboundRecord) -> Result<DeliveryReport>;

    /// Flush and release the session.
    async fn close(&self) -> Result<()>;
}

/// Producer session whose sends only enqueue.
#[async_trait::async_trait]
pub trait AsyncProducerSession: Send + Sync {
    /// Enqueue one record. Delivery outcomes arrive on the event channel.
    ///
    /// May wait while the library's queue is full. Returns `false` if the
    /// library refused the record; that failure is reported as an event.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Closed` if the session is closed.
    async fn enqueue(&self, record: OutboundRecord) -> Result<bool>;

    /// Flush and release the session.
    async fn close(&self) -> Result<()>;
}

/// Factory for broker sessions.
#[async_trait::async_trait]
pub trait Backend: Send + Sync + fmt::Debug {
    /// Open a consumer-group session for the configured group and topics.
    async fn open_consumer(&self, config: &Config) -> Result<Opened<dyn ConsumerSession>>;

    /// Open a producer session for acknowledged sends.
    async fn open_sync_producer(&self, config: &Config) -> Result<Arc<dyn SyncProducerSession>>;

    /// Open a producer session for fire-and-forget sends.
    async fn open_async_producer(
        &self,
        config: &Config,
    ) -> Result<Opened<dyn AsyncProducerSession>>;
}

/// An active session and the drain task servicing its events.
pub(crate) struct ActiveSession<S: ?Sized> {
    pub(crate) session: Arc<S>,
    pub(crate) drain: Option<DrainTask>,
}

enum SlotState<S: ?Sized> {
    Absent,
    Active(ActiveSession<S>),
    Closed,
}

/// Lazily opened, mutex-guarded holder for one session.
///
/// States move `Absent -> Active -> Closed`. A failed open leaves the slot
/// `Absent`; `Closed` is terminal.
pub(crate) struct SessionSlot<S: ?Sized> {
    kind: SessionKind,
    state: Mutex<SlotState<S>>,
}

impl<S: ?Sized> SessionSlot<S> {
    pub(crate) fn new(kind: SessionKind) -> Self {
        Self {
            kind,
            state: Mutex::new(SlotState::Absent),
        }
    }

    /// Return the active session, opening it with `open` if absent.
    ///
    /// The slot lock is held across `open`, so concurrent first calls
    /// produce a single session.
    pub(crate) async fn get_or_open<F, Fut>(&self, open: F) -> Result<Arc<S>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ActiveSession<S>>>,
    {
        let mut state = self.state.lock().await;
        match &*state {
            SlotState::Active(active) => return Ok(Arc::clone(&active.session)),
            SlotState::Closed => return Err(ClientError::Closed),
            SlotState::Absent => {}
        }

        let active = open().await?;
        tracing::debug!(session = %self.kind, "Session opened");
        let session = Arc::clone(&active.session);
        *state = SlotState::Active(active);
        Ok(session)
    }

    /// Move the slot to `Closed`, returning the session if it was active.
    pub(crate) async fn take_for_close(&self) -> Option<ActiveSession<S>> {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, SlotState::Closed) {
            SlotState::Active(active) => Some(active),
            SlotState::Absent | SlotState::Closed => None,
        }
    }

    #[cfg(test)]
    pub(crate) async fn is_active(&self) -> bool {
        matches!(&*self.state.lock().await, SlotState::Active(_))
    }

    #[cfg(test)]
    pub(crate) async fn is_closed(&self) -> bool {
        matches!(&*self.state.lock().await, SlotState::Closed)
    }

    pub(crate) fn kind(&self) -> SessionKind {
        self.kind
    }
}
