//! Client facade
//!
//! [`Client`] composes one lazily opened session of each kind behind three
//! operations: [`Client::receive`], [`Client::sync_send`] and
//! [`Client::async_send`]. Sessions open on first use and are released
//! together by [`Client::close`], after which the client is unusable.
//!
//! # Example
//!
//! ```no_run
//! use kafka_facade::{Client, Config, Message};
//!
//! #[tokio::main]
//! async fn main() -> kafka_facade::Result<()> {
//!     let client = Client::new(Config::new("billing", "localhost:9092", "invoices"));
//!
//!     client.sync_send(&Message::new("hello").with_key("k1")).await?;
//!
//!     let message = client.receive().await?;
//!     println!("{}", message.value_lossy());
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::drain::{report_event, DeliveryObserver, DrainTask};
use crate::error::{ClientError, Result};
use crate::kafka::KafkaBackend;
use crate::message::Message;
use crate::metrics;
use crate::session::{
    ActiveSession, AsyncProducerSession, Backend, ConsumerSession, Opened, SessionEvent,
    SessionKind, SessionSlot, SyncProducerSession,
};

/// Convenience client over one consumer group and a fixed set of topics.
///
/// `Client` is `Send + Sync`; share it behind an `Arc` to use it from many
/// tasks.
pub struct Client {
    config: Config,
    backend: Arc<dyn Backend>,
    observer: Option<Arc<dyn DeliveryObserver>>,
    consumer: SessionSlot<dyn ConsumerSession>,
    sync_producer: SessionSlot<dyn SyncProducerSession>,
    async_producer: SessionSlot<dyn AsyncProducerSession>,
    closed: AtomicBool,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("backend", &self.backend)
            .field("observer", &self.observer.is_some())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Client {
    /// Create a client talking to Kafka through rdkafka.
    ///
    /// Unset options are filled with defaults. No connection is made until
    /// the first operation.
    pub fn new(config: Config) -> Self {
        Self::with_backend(config, Arc::new(KafkaBackend::new()))
    }

    /// Create a client opening its sessions through `backend`.
    pub fn with_backend(config: Config, backend: Arc<dyn Backend>) -> Self {
        Self {
            config: config.with_defaults(),
            backend,
            observer: None,
            consumer: SessionSlot::new(SessionKind::Consumer),
            sync_producer: SessionSlot::new(SessionKind::SyncProducer),
            async_producer: SessionSlot::new(SessionKind::AsyncProducer),
            closed: AtomicBool::new(false),
        }
    }

    /// Install an observer receiving every drained session event.
    pub fn with_observer(mut self, observer: Arc<dyn DeliveryObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The resolved configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether [`Client::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait for the next message on any configured topic.
    ///
    /// The message's offset is marked as consumed before it is returned, so
    /// it is covered by the next periodic commit even if processing fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the consumer session cannot be opened, or
    /// `ClientError::Closed` if the client is (or becomes) closed.
    pub async fn receive(&self) -> Result<Message> {
        let consumer = self
            .consumer
            .get_or_open(|| async move {
                self.backend
                    .open_consumer(&self.config)
                    .await
                    .map(|opened| self.activate(SessionKind::Consumer, opened))
            })
            .await?;

        let message = consumer.recv().await.ok_or(ClientError::Closed)?;
        metrics::record_received();

        if let Err(e) = consumer.mark_offset(&message) {
            report_event(
                SessionKind::Consumer,
                &SessionEvent::error(Some(&message.topic), e.to_string()),
                self.observer.as_deref(),
            );
        }

        Ok(message)
    }

    /// Send `message` to every configured topic, waiting for each
    /// acknowledgement in turn.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` before opening anything if the topic
    /// list is empty. Otherwise returns the first failure. Topics before the
    /// failing one have already received the message; later topics are
    /// skipped.
    pub async fn sync_send(&self, message: &Message) -> Result<()> {
        let topics = self.config.topic_list()?;
        let producer = self
            .sync_producer
            .get_or_open(|| async move {
                self.backend
                    .open_sync_producer(&self.config)
                    .await
                    .map(|session| {
                        metrics::record_session_opened(SessionKind::SyncProducer);
                        ActiveSession {
                            session,
                            drain: None,
                        }
                    })
            })
            .await?;

        for topic in topics {
            let report = match producer.send(message.to_record(&topic)).await {
                Ok(report) => report,
                Err(e) => {
                    metrics::record_send_error(&topic);
                    return Err(e);
                }
            };
            metrics::record_sent("sync", &topic);
            tracing::debug!(
                topic = %report.topic,
                partition = report.partition,
                offset = report.offset,
                "Message acknowledged"
            );
        }
        Ok(())
    }

    /// Enqueue `message` for every configured topic without waiting for
    /// acknowledgement.
    ///
    /// Delivery failures, and records the library refuses to queue, are
    /// logged by the drain task and passed to the observer; they are not
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic list is empty, the producer session
    /// cannot be opened, or the client is closed.
    pub async fn async_send(&self, message: &Message) -> Result<()> {
        let topics = self.config.topic_list()?;
        let producer = self
            .async_producer
            .get_or_open(|| async move {
                self.backend
                    .open_async_producer(&self.config)
                    .await
                    .map(|opened| self.activate(SessionKind::AsyncProducer, opened))
            })
            .await?;

        for topic in topics {
            if producer.enqueue(message.to_record(&topic)).await? {
                metrics::record_sent("async", &topic);
            }
        }
        Ok(())
    }

    /// Release every open session and stop their drain tasks.
    ///
    /// Close failures are logged, not returned. The client stays closed:
    /// every later operation returns `ClientError::Closed`. Calling this
    /// again does nothing.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(active) = self.consumer.take_for_close().await {
            let result = active.session.close().await;
            release(self.consumer.kind(), result, active.drain).await;
        }
        if let Some(active) = self.sync_producer.take_for_close().await {
            let result = active.session.close().await;
            release(self.sync_producer.kind(), result, active.drain).await;
        }
        if let Some(active) = self.async_producer.take_for_close().await {
            let result = active.session.close().await;
            release(self.async_producer.kind(), result, active.drain).await;
        }

        tracing::debug!("Client closed");
    }

    fn activate<S: ?Sized>(&self, kind: SessionKind, opened: Opened<S>) -> ActiveSession<S> {
        metrics::record_session_opened(kind);
        let drain = DrainTask::spawn(kind, opened.events, self.observer.clone());
        ActiveSession {
            session: opened.session,
            drain: Some(drain),
        }
    }
}

async fn release(kind: SessionKind, result: Result<()>, drain: Option<DrainTask>) {
    match result {
        Ok(()) => tracing::debug!(session = %kind, "Session closed"),
        Err(e) => tracing::warn!(session = %kind, "Failed to close session: {e}"),
    }
    if let Some(drain) = drain {
        drain.shutdown().await;
    }
}
