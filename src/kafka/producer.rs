//! Producer sessions backed by rdkafka's `FutureProducer` and
//! `ThreadedProducer`

use std::sync::Arc;
use std::time::Duration;

use rdkafka::error::KafkaError;
use rdkafka::producer::{BaseRecord, FutureProducer, FutureRecord, Producer, ThreadedProducer};
use rdkafka::types::RDKafkaErrorCode;
use tokio_util::sync::CancellationToken;

use super::close_error;
use super::context::EventContext;
use crate::error::{ClientError, Result};
use crate::message::OutboundRecord;
use crate::session::{
    AsyncProducerSession, DeliveryReport, SessionEvent, SessionKind, SyncProducerSession,
};

/// Pause before retrying an enqueue rejected because the queue is full.
const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(10);

pub(crate) struct KafkaSyncProducerSession {
    producer: FutureProducer,
    timeout: Duration,
    closed: CancellationToken,
}

impl KafkaSyncProducerSession {
    pub(crate) fn new(producer: FutureProducer, timeout: Duration) -> Self {
        Self {
            producer,
            timeout,
            closed: CancellationToken::new(),
        }
    }
}

#[async_trait::async_trait]
impl SyncProducerSession for KafkaSyncProducerSession {
    async fn send(&self, record: OutboundRecord) -> Result<DeliveryReport> {
        if self.closed.is_cancelled() {
            return Err(ClientError::Closed);
        }

        let mut future_record =
            FutureRecord::<[u8], [u8]>::to(&record.topic).payload(record.value.as_slice());
        if let Some(key) = &record.key {
            future_record = future_record.key(key.as_slice());
        }
        if let Some(partition) = record.partition {
            future_record = future_record.partition(partition);
        }

        match self.producer.send(future_record, self.timeout).await {
            Ok((partition, offset)) => Ok(DeliveryReport {
                topic: record.topic,
                partition,
                offset,
            }),
            Err((e, _)) => Err(ClientError::send(record.topic, e.to_string())),
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.cancel();
        let producer = self.producer.clone();
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(|e| close_error(SessionKind::SyncProducer, e))?
            .map_err(|e| close_error(SessionKind::SyncProducer, e))
    }
}

pub(crate) struct KafkaAsyncProducerSession {
    producer: Arc<ThreadedProducer<EventContext>>,
    timeout: Duration,
    closed: CancellationToken,
}

impl KafkaAsyncProducerSession {
    pub(crate) fn new(producer: ThreadedProducer<EventContext>, timeout: Duration) -> Self {
        Self {
            producer: Arc::new(producer),
            timeout,
            closed: CancellationToken::new(),
        }
    }

    fn try_enqueue(&self, record: &OutboundRecord) -> std::result::Result<(), KafkaError> {
        let mut base =
            BaseRecord::<[u8], [u8]>::to(&record.topic).payload(record.value.as_slice());
        if let Some(key) = &record.key {
            base = base.key(key.as_slice());
        }
        if let Some(partition) = record.partition {
            base = base.partition(partition);
        }
        self.producer.send(base).map_err(|(e, _)| e)
    }
}

#[async_trait::async_trait]
impl AsyncProducerSession for KafkaAsyncProducerSession {
    async fn enqueue(&self, record: OutboundRecord) -> Result<bool> {
        loop {
            if self.closed.is_cancelled() {
                return Err(ClientError::Closed);
            }

            match self.try_enqueue(&record) {
                Ok(()) => return Ok(true),
                Err(KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull)) => {
                    tracing::trace!(topic = %record.topic, "Producer queue full; waiting");
                    tokio::time::sleep(QUEUE_FULL_BACKOFF).await;
                }
                Err(e) => {
                    self.producer.context().forward(SessionEvent::error(
                        Some(&record.topic),
                        format!("enqueue failed: {e}"),
                    ));
                    return Ok(false);
                }
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.cancel();
        let producer = Arc::clone(&self.producer);
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(|e| close_error(SessionKind::AsyncProducer, e))?
            .map_err(|e| close_error(SessionKind::AsyncProducer, e))
    }
}
