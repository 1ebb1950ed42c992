//! Client metrics
//!
//! Counters emitted through the `metrics` facade. Nothing is recorded unless
//! the embedding program installs a recorder, for example with
//! [`init_metrics_exporter`] and the `prometheus` feature.
//!
//! # Metrics
//!
//! - `kafka_facade_sessions_opened_total`: sessions opened, by `session`
//! - `kafka_facade_messages_received_total`: messages returned by `receive`
//! - `kafka_facade_messages_sent_total`: records handed to a producer, by
//!   `mode` (`sync` or `async`) and `topic`
//! - `kafka_facade_send_errors_total`: failed sync sends, by `topic`
//! - `kafka_facade_session_events_total`: drained session events, by
//!   `session` and `event` (`error`, `notification`, `delivered`)

use metrics::increment_counter;

use crate::session::{SessionEvent, SessionKind};

pub(crate) fn record_session_opened(kind: SessionKind) {
    increment_counter!("kafka_facade_sessions_opened_total", "session" => kind.as_str());
}

pub(crate) fn record_received() {
    increment_counter!("kafka_facade_messages_received_total");
}

pub(crate) fn record_sent(mode: &'static str, topic: &str) {
    increment_counter!(
        "kafka_facade_messages_sent_total",
        "mode" => mode,
        "topic" => topic.to_string()
    );
}

pub(crate) fn record_send_error(topic: &str) {
    increment_counter!("kafka_facade_send_errors_total", "topic" => topic.to_string());
}

pub(crate) fn record_event(kind: SessionKind, event: &SessionEvent) {
    let label = match event {
        SessionEvent::Error { .. } => "error",
        SessionEvent::Notification(_) => "notification",
        SessionEvent::Delivered(_) => "delivered",
    };
    increment_counter!(
        "kafka_facade_session_events_total",
        "session" => kind.as_str(),
        "event" => label
    );
}

/// Install the Prometheus exporter when built with the `prometheus` feature.
///
/// Without the feature this does nothing. Installation failures are logged.
///
/// # Examples
///
/// ```
/// use kafka_facade::metrics::init_metrics_exporter;
///
/// init_metrics_exporter();
/// ```
pub fn init_metrics_exporter() {
    #[cfg(feature = "prometheus")]
    {
        use metrics_exporter_prometheus::PrometheusBuilder;
        if let Err(e) = PrometheusBuilder::new().install() {
            tracing::warn!("Failed to install Prometheus exporter: {}", e);
        }
    }
}
