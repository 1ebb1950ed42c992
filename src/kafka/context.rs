//! rdkafka client context forwarding library callbacks as session events

use rdkafka::client::ClientContext;
use rdkafka::consumer::ConsumerContext;
use rdkafka::error::{KafkaError, KafkaResult};
use rdkafka::message::Message as _;
use rdkafka::producer::{DeliveryResult, ProducerContext};
use rdkafka::TopicPartitionList;

use crate::session::{DeliveryReport, EventSender, SessionEvent, SessionKind};

/// Context shared by consumer and async producer sessions.
///
/// librdkafka invokes these callbacks from its own threads, so events are
/// pushed onto an unbounded channel and never block.
pub(crate) struct EventContext {
    kind: SessionKind,
    events: EventSender,
    forward_errors: bool,
    forward_successes: bool,
}

impl EventContext {
    pub(crate) fn new(
        kind: SessionKind,
        events: EventSender,
        forward_errors: bool,
        forward_successes: bool,
    ) -> Self {
        Self {
            kind,
            events,
            forward_errors,
            forward_successes,
        }
    }

    /// Push an event, honouring the configured reporting flags.
    pub(crate) fn forward(&self, event: SessionEvent) {
        let wanted = if event.is_error() {
            self.forward_errors
        } else {
            self.forward_successes
        };

        if !wanted {
            if let SessionEvent::Error { message, .. } = &event {
                tracing::warn!(session = %self.kind, "{message}");
            }
            return;
        }

        if self.events.send(event).is_err() {
            tracing::trace!(session = %self.kind, "Event channel closed; dropping event");
        }
    }
}

impl ClientContext for EventContext {
    fn error(&self, error: KafkaError, reason: &str) {
        self.forward(SessionEvent::error(None, format!("{error}: {reason}")));
    }
}

impl ConsumerContext for EventContext {
    fn commit_callback(&self, result: KafkaResult<()>, offsets: &TopicPartitionList) {
        match result {
            Ok(()) => self.forward(SessionEvent::Notification(format!(
                "committed offsets for {} partition(s)",
                offsets.count()
            ))),
            Err(KafkaError::ConsumerCommit(rdkafka::types::RDKafkaErrorCode::NoOffset)) => {}
            Err(e) => self.forward(SessionEvent::error(None, format!("offset commit failed: {e}"))),
        }
    }
}

impl ProducerContext for EventContext {
    type DeliveryOpaque = ();

    fn delivery(&self, delivery_result: &DeliveryResult<'_>, _: Self::DeliveryOpaque) {
        match delivery_result {
            Ok(message) => self.forward(SessionEvent::Delivered(DeliveryReport {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
            })),
            Err((error, message)) => self.forward(SessionEvent::error(
                Some(message.topic()),
                format!("delivery failed: {error}"),
            )),
        }
    }
}
