/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `receive`: Consume messages and print them as JSON lines
- `send`: Publish one message to every configured topic

Handlers take an already constructed [`Client`] so they can be driven by any
session backend.
*/

use std::io::Write;

use anyhow::Result;
use serde::Serialize;

use crate::client::Client;
use crate::message::Message;

/// Receive command handler
pub mod receive {
    use super::*;

    /// One received message as printed on STDOUT.
    #[derive(Debug, Serialize)]
    pub struct ReceivedLine<'a> {
        pub topic: &'a str,
        pub partition: i32,
        pub offset: i64,
        pub key: String,
        pub value: String,
    }

    impl<'a> From<&'a Message> for ReceivedLine<'a> {
        fn from(message: &'a Message) -> Self {
            Self {
                topic: &message.topic,
                partition: message.partition,
                offset: message.offset,
                key: String::from_utf8_lossy(&message.key).into_owned(),
                value: message.value_lossy().into_owned(),
            }
        }
    }

    /// Receive messages and write each one to `out` as a JSON line.
    ///
    /// # Arguments
    ///
    /// * `client` - Client to receive with
    /// * `count` - Stop after this many messages; `None` runs until the
    ///   client is closed
    /// * `out` - Destination for the JSON lines
    ///
    /// # Returns
    ///
    /// The number of messages written
    pub async fn run_receive<W: Write>(
        client: &Client,
        count: Option<usize>,
        out: &mut W,
    ) -> Result<usize> {
        tracing::info!(
            topics = %client.config().topics,
            group_id = %client.config().group_id,
            "Receiving messages"
        );

        let mut received = 0;
        while count.map_or(true, |limit| received < limit) {
            let message = client.receive().await?;
            serde_json::to_writer(&mut *out, &ReceivedLine::from(&message))?;
            writeln!(out)?;
            out.flush()?;
            received += 1;
        }

        Ok(received)
    }

}

/// Send command handler
pub mod send {
    use super::*;

    /// Build the message described by the `send` arguments.
    pub fn build_message(value: &str, key: Option<&str>, partition: Option<i32>) -> Message {
        let mut message = Message::new(value);
        if let Some(key) = key {
            message = message.with_key(key);
        }
        if let Some(partition) = partition {
            message = message.with_partition(partition);
        }
        message
    }

    /// Send one message to every configured topic.
    ///
    /// # Arguments
    ///
    /// * `client` - Client to send with
    /// * `message` - Message to publish
    /// * `asynchronous` - Enqueue without waiting for acknowledgement
    pub async fn run_send(client: &Client, message: &Message, asynchronous: bool) -> Result<()> {
        if asynchronous {
            client.async_send(message).await?;
            tracing::info!(topics = %client.config().topics, "Message enqueued");
        } else {
            client.sync_send(message).await?;
            tracing::info!(topics = %client.config().topics, "Message acknowledged");
        }
        Ok(())
    }

}
