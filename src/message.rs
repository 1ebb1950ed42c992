//! Plain message representation and translation to broker records
//!
//! [`Message`] is what callers send and receive. [`OutboundRecord`] is the
//! library-neutral form of one physical send: a message with its destination
//! topic substituted. Backends turn an `OutboundRecord` into their own record
//! type.

use serde::{Deserialize, Serialize};

/// Partition value meaning "let the partitioner decide".
pub const UNASSIGNED_PARTITION: i32 = -1;

/// A message sent to or received from the broker.
///
/// Received messages carry the topic, partition and offset they were read
/// from. On send the topic is replaced by each configured destination, the
/// offset is ignored, and the partition is honoured only when non-negative.
///
/// # Examples
///
/// ```
/// use kafka_facade::Message;
///
/// let message = Message::new("payload").with_key("k");
/// assert_eq!(message.value, b"payload");
/// assert_eq!(message.key, b"k");
/// assert!(message.partition < 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message payload
    pub value: Vec<u8>,

    /// Message key (empty means no key)
    pub key: Vec<u8>,

    /// Topic the message was read from
    pub topic: String,

    /// Partition the message was read from
    pub partition: i32,

    /// Offset within the partition
    pub offset: i64,
}

impl Message {
    /// Create a message carrying only a payload.
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self {
            value: value.into(),
            key: Vec::new(),
            topic: String::new(),
            partition: UNASSIGNED_PARTITION,
            offset: 0,
        }
    }

    /// Set the message key.
    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = key.into();
        self
    }

    /// Pin sends of this message to a partition.
    pub fn with_partition(mut self, partition: i32) -> Self {
        self.partition = partition;
        self
    }

    /// Payload as UTF-8, replacing invalid sequences.
    pub fn value_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }

    /// Translate into a record bound for `topic`.
    pub fn to_record(&self, topic: &str) -> OutboundRecord {
        OutboundRecord {
            topic: topic.to_string(),
            key: (!self.key.is_empty()).then(|| self.key.clone()),
            value: self.value.clone(),
            partition: (self.partition >= 0).then_some(self.partition),
        }
    }
}

/// One physical send: a message bound to a single destination topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRecord {
    /// Destination topic
    pub topic: String,

    /// Key, if any
    pub key: Option<Vec<u8>>,

    /// Payload
    pub value: Vec<u8>,

    /// Explicit partition, if the caller pinned one
    pub partition: Option<i32>,
}

impl OutboundRecord {
    /// Key bytes, empty when the record has no key.
    pub fn key_bytes(&self) -> &[u8] {
        self.key.as_deref().unwrap_or_default()
    }
}
