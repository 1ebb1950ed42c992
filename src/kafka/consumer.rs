//! Consumer-group session backed by an rdkafka `StreamConsumer`

use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message as _};
use rdkafka::{Offset, TopicPartitionList};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::close_error;
use super::context::EventContext;
use crate::error::{ClientError, Result};
use crate::message::Message;
use crate::session::{ConsumerSession, SessionEvent, SessionKind};

pub(crate) struct KafkaConsumerSession {
    consumer: RwLock<Option<StreamConsumer<EventContext>>>,
    closed: CancellationToken,
}

impl KafkaConsumerSession {
    pub(crate) fn new(consumer: StreamConsumer<EventContext>) -> Self {
        Self {
            consumer: RwLock::new(Some(consumer)),
            closed: CancellationToken::new(),
        }
    }
}

#[async_trait::async_trait]
impl ConsumerSession for KafkaConsumerSession {
    async fn recv(&self) -> Option<Message> {
        let guard = tokio::select! {
            biased;

            _ = self.closed.cancelled() => return None,
            guard = self.consumer.read() => guard,
        };
        let consumer = guard.as_ref()?;

        loop {
            tokio::select! {
                biased;

                _ = self.closed.cancelled() => return None,

                result = consumer.recv() => match result {
                    Ok(borrowed) => return Some(from_borrowed(&borrowed)),
                    Err(e) => consumer
                        .context()
                        .forward(SessionEvent::error(None, format!("fetch failed: {e}"))),
                },
            }
        }
    }

    fn mark_offset(&self, message: &Message) -> Result<()> {
        let guard = self.consumer.try_read().map_err(|_| ClientError::Closed)?;
        let consumer = guard.as_ref().ok_or(ClientError::Closed)?;

        // The committed offset is the next one to read.
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(
                &message.topic,
                message.partition,
                Offset::Offset(message.offset + 1),
            )
            .and_then(|()| consumer.store_offsets(&offsets))
            .map_err(|e| ClientError::MarkOffset {
                topic: message.topic.clone(),
                partition: message.partition,
                offset: message.offset,
                message: e.to_string(),
            })
    }

    async fn close(&self) -> Result<()> {
        // Pending receives release their read guards once cancelled.
        self.closed.cancel();
        let Some(consumer) = self.consumer.write().await.take() else {
            return Ok(());
        };

        consumer.unsubscribe();
        // Dropping the consumer leaves the group, which blocks.
        tokio::task::spawn_blocking(move || drop(consumer))
            .await
            .map_err(|e| close_error(SessionKind::Consumer, e))
    }
}

fn from_borrowed(borrowed: &BorrowedMessage<'_>) -> Message {
    Message {
        value: borrowed.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        key: borrowed.key().map(<[u8]>::to_vec).unwrap_or_default(),
        topic: borrowed.topic().to_string(),
        partition: borrowed.partition(),
        offset: borrowed.offset(),
    }
}
