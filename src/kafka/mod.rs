//! rdkafka implementation of the session seam
//!
//! [`KafkaBackend`] opens real broker sessions through librdkafka:
//!
//! - consumer sessions are `StreamConsumer`s subscribed to every configured
//!   topic, with offsets stored explicitly after each receive and committed
//!   by the library at the configured interval;
//! - sync producer sessions are `FutureProducer`s awaited per record;
//! - async producer sessions are `ThreadedProducer`s whose delivery reports
//!   are forwarded to the session event channel.
//!
//! Client errors reported by librdkafka (for example, all brokers down)
//! are forwarded as [`crate::session::SessionEvent::Error`]s.

mod consumer;
mod context;
mod producer;

use std::sync::Arc;

use rdkafka::config::RDKafkaLogLevel;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, ThreadedProducer};
use rdkafka::ClientConfig;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::session::{
    AsyncProducerSession, Backend, ConsumerSession, Opened, SessionKind, SyncProducerSession,
};

use self::consumer::KafkaConsumerSession;
use self::context::EventContext;
use self::producer::{KafkaAsyncProducerSession, KafkaSyncProducerSession};

/// Backend opening sessions against real Kafka brokers via rdkafka.
#[derive(Debug, Default, Clone)]
pub struct KafkaBackend;

impl KafkaBackend {
    /// Create a new backend.
    pub fn new() -> Self {
        Self
    }
}

/// Build an rdkafka `ClientConfig` from resolved key/value settings.
pub fn client_config(settings: &[(String, String)]) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    for (key, value) in settings {
        client_config.set(key, value);
    }
    client_config.set_log_level(RDKafkaLogLevel::Warning);
    client_config
}

fn close_error(kind: SessionKind, error: impl std::fmt::Display) -> ClientError {
    ClientError::Close {
        kind,
        message: error.to_string(),
    }
}

#[async_trait::async_trait]
impl Backend for KafkaBackend {
    async fn open_consumer(&self, config: &Config) -> Result<Opened<dyn ConsumerSession>> {
        let topics = config.topic_list()?;
        let settings = config.consumer_properties()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let context = EventContext::new(
            SessionKind::Consumer,
            events_tx,
            config.options.consumer.return_errors,
            config.options.consumer.return_notifications,
        );

        let consumer: StreamConsumer<EventContext> = client_config(&settings)
            .create_with_context(context)
            .map_err(|e| ClientError::setup(SessionKind::Consumer, e.to_string()))?;

        let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topic_refs)
            .map_err(|e| ClientError::setup(SessionKind::Consumer, e.to_string()))?;

        tracing::info!(
            servers = %config.servers,
            topics = ?topics,
            group_id = %config.group_id,
            "Consumer subscribed"
        );

        Ok(Opened {
            session: Arc::new(KafkaConsumerSession::new(consumer)),
            events: events_rx,
        })
    }

    async fn open_sync_producer(&self, config: &Config) -> Result<Arc<dyn SyncProducerSession>> {
        config.topic_list()?;
        let settings = config.producer_properties()?;
        let producer: FutureProducer = client_config(&settings)
            .create()
            .map_err(|e| ClientError::setup(SessionKind::SyncProducer, e.to_string()))?;

        tracing::info!(servers = %config.servers, "Sync producer created");
        Ok(Arc::new(KafkaSyncProducerSession::new(
            producer,
            config.producer_timeout(),
        )))
    }

    async fn open_async_producer(
        &self,
        config: &Config,
    ) -> Result<Opened<dyn AsyncProducerSession>> {
        config.topic_list()?;
        let settings = config.producer_properties()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let context = EventContext::new(
            SessionKind::AsyncProducer,
            events_tx,
            config.options.producer.return_errors,
            config.options.producer.return_successes,
        );

        let producer: ThreadedProducer<EventContext> = client_config(&settings)
            .create_with_context(context)
            .map_err(|e| ClientError::setup(SessionKind::AsyncProducer, e.to_string()))?;

        tracing::info!(servers = %config.servers, "Async producer created");
        Ok(Opened {
            session: Arc::new(KafkaAsyncProducerSession::new(
                producer,
                config.producer_timeout(),
            )),
            events: events_rx,
        })
    }
}
