//! Background drain tasks for session event channels
//!
//! Every consumer and async producer session reports errors, rebalance
//! notifications and delivery successes out of band. A [`DrainTask`] reads
//! that channel for the lifetime of the session so the broker library never
//! stalls on it.
//!
//! # Design
//!
//! - Error events are logged with `tracing::error!`; notifications and
//!   successes are logged at debug level and otherwise discarded.
//! - Every event is also handed to the client's [`DeliveryObserver`], when
//!   one is installed, so embedding code can act on delivery outcomes.
//! - A [`tokio_util::sync::CancellationToken`] stops the loop. Events already
//!   buffered when the token fires are still drained before the task exits.
//!   The loop also ends when every sender has been dropped.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::metrics;
use crate::session::{EventReceiver, SessionEvent, SessionKind};

/// Receives every event drained from a session.
///
/// Called from the drain task; implementations must not block.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use kafka_facade::drain::DeliveryObserver;
/// use kafka_facade::session::{SessionEvent, SessionKind};
///
/// #[derive(Default)]
/// struct FailureCounter(AtomicUsize);
///
/// impl DeliveryObserver for FailureCounter {
///     fn on_event(&self, _kind: SessionKind, event: &SessionEvent) {
///         if event.is_error() {
///             self.0.fetch_add(1, Ordering::Relaxed);
///         }
///     }
/// }
/// ```
pub trait DeliveryObserver: Send + Sync {
    /// Handle one event from the session identified by `kind`.
    fn on_event(&self, kind: SessionKind, event: &SessionEvent);
}

/// Owned background task draining one session's events.
#[derive(Debug)]
pub struct DrainTask {
    kind: SessionKind,
    cancellation: CancellationToken,
    handle: JoinHandle<()>,
}

impl DrainTask {
    /// Spawn a drain task for `events`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `kind` - Session the events belong to (used in logs)
    /// * `events` - The session's event channel
    /// * `observer` - Optional sink receiving every event
    pub fn spawn(
        kind: SessionKind,
        events: EventReceiver,
        observer: Option<Arc<dyn DeliveryObserver>>,
    ) -> Self {
        let cancellation = CancellationToken::new();
        let handle = tokio::spawn(drain_loop(
            kind,
            events,
            observer,
            cancellation.clone(),
        ));
        tracing::debug!(session = %kind, "Drain task started");

        Self {
            kind,
            cancellation,
            handle,
        }
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel the task and wait for it to exit.
    pub async fn shutdown(self) {
        self.cancellation.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!(session = %self.kind, "Drain task ended abnormally: {e}");
        }
        tracing::debug!(session = %self.kind, "Drain task stopped");
    }
}

async fn drain_loop(
    kind: SessionKind,
    mut events: EventReceiver,
    observer: Option<Arc<dyn DeliveryObserver>>,
    cancellation: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancellation.cancelled() => {
                while let Ok(event) = events.try_recv() {
                    report_event(kind, &event, observer.as_deref());
                }
                break;
            }

            maybe_event = events.recv() => {
                match maybe_event {
                    Some(event) => report_event(kind, &event, observer.as_deref()),
                    None => break,
                }
            }
        }
    }
}

/// Log one event and hand it to the observer, if any.
pub(crate) fn report_event(
    kind: SessionKind,
    event: &SessionEvent,
    observer: Option<&dyn DeliveryObserver>,
) {
    metrics::record_event(kind, event);

    match event {
        SessionEvent::Error { topic, message } => {
            tracing::error!(session = %kind, topic = ?topic, "{message}");
        }
        SessionEvent::Notification(description) => {
            tracing::debug!(session = %kind, "Notification: {description}");
        }
        SessionEvent::Delivered(report) => {
            tracing::debug!(
                session = %kind,
                topic = %report.topic,
                partition = report.partition,
                offset = report.offset,
                "Delivered"
            );
        }
    }

    if let Some(observer) = observer {
        observer.on_event(kind, event);
    }
}
