//! End-to-end behavior of the client facade against the in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use kafka_facade::testing::MemoryBackend;
use kafka_facade::{
    Client, ClientError, Config, DeliveryObserver, Message, OffsetReset, SessionEvent, SessionKind,
};

mod common;
use common::{memory_client, RecordingObserver};

#[tokio::test]
async fn test_sync_send_fans_out_in_topic_order() {
    let (client, backend) = memory_client("t1,t2");

    client
        .sync_send(&Message::new("x").with_key("k"))
        .await
        .unwrap();

    let sent = backend.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].topic, "t1");
    assert_eq!(sent[1].topic, "t2");
    for record in &sent {
        assert_eq!(record.key.as_deref(), Some(&b"k"[..]));
        assert_eq!(record.value, b"x");
        assert_eq!(record.partition, None);
    }
}

#[tokio::test]
async fn test_sync_send_stops_at_first_failing_topic() {
    let (client, backend) = memory_client("t1,t2,t3");
    backend.fail_topic("t2");

    let result = client.sync_send(&Message::new("x")).await;

    match result {
        Err(ClientError::Send { topic, .. }) => assert_eq!(topic, "t2"),
        other => panic!("expected send error, got {other:?}"),
    }
    let topics: Vec<_> = backend.sent().into_iter().map(|r| r.topic).collect();
    assert_eq!(topics, vec!["t1"]);
}

#[tokio::test]
async fn test_async_send_enqueues_once_per_topic() {
    let (client, backend) = memory_client("t1,t2,t3");

    client
        .async_send(&Message::new("x").with_partition(2))
        .await
        .unwrap();

    let enqueued = backend.enqueued();
    assert_eq!(enqueued.len(), 3);
    assert!(enqueued.iter().all(|r| r.partition == Some(2)));
    assert!(backend.sent().is_empty());
    client.close().await;
}

#[tokio::test]
async fn test_async_delivery_failures_reach_observer_not_caller() {
    let backend = MemoryBackend::new();
    backend.fail_topic("t2");
    let recorder = Arc::new(RecordingObserver::default());
    let observer: Arc<dyn DeliveryObserver> = recorder.clone();
    let client = Client::with_backend(
        Config::new("g1", "b1:9092", "t1,t2"),
        Arc::new(backend.clone()),
    )
    .with_observer(observer);

    client.async_send(&Message::new("x")).await.unwrap();

    let events = recorder.wait_for(2).await;
    assert_eq!(events.len(), 2);
    assert!(events
        .iter()
        .all(|(kind, _)| *kind == SessionKind::AsyncProducer));
    assert!(matches!(events[0].1, SessionEvent::Delivered(_)));
    assert_eq!(
        events[1].1,
        SessionEvent::error(Some("t2"), "delivery failed: Message timed out")
    );
    client.close().await;
}

#[tokio::test]
async fn test_receive_returns_delivered_message_and_marks_it() {
    let (client, backend) = memory_client("t1");
    backend.deliver("t1", b"k0", b"first");
    let delivered = backend.deliver("t1", b"k1", b"second");

    let first = client.receive().await.unwrap();
    let second = client.receive().await.unwrap();

    assert_eq!(first.topic, "t1");
    assert_eq!(first.value, b"first");
    assert_eq!(second, delivered);
    assert_eq!(second.offset, 1);
    assert_eq!(backend.marked(), vec![first, second]);
    assert_eq!(backend.open_count(SessionKind::Consumer), 1);
}

#[tokio::test]
async fn test_receive_blocks_until_message_arrives() {
    let (client, backend) = memory_client("t1");
    let client = Arc::new(client);

    let pending = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.receive().await }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!pending.is_finished());

    backend.deliver("t1", b"", b"late");
    let message = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .expect("receive did not complete")
        .unwrap()
        .unwrap();
    assert_eq!(message.value, b"late");
}

#[tokio::test]
async fn test_fetch_error_does_not_disturb_pending_receive() {
    let backend = MemoryBackend::new();
    let recorder = Arc::new(RecordingObserver::default());
    let observer: Arc<dyn DeliveryObserver> = recorder.clone();
    let client = Arc::new(
        Client::with_backend(Config::new("g1", "b1:9092", "t1"), Arc::new(backend.clone()))
            .with_observer(observer),
    );

    let pending = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.receive().await }
    });

    // Wait for the consumer session to open before injecting the error.
    tokio::time::timeout(Duration::from_secs(2), async {
        while backend.open_count(SessionKind::Consumer) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert!(backend.emit(
        SessionKind::Consumer,
        SessionEvent::error(None, "fetch failed: broker transport failure"),
    ));
    let events = recorder.wait_for(1).await;
    assert!(events[0].1.is_error());
    assert!(!pending.is_finished());

    backend.deliver("t1", b"", b"after error");
    let message = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(message.value, b"after error");
}

#[tokio::test]
async fn test_close_unblocks_pending_receive() {
    let (client, _backend) = memory_client("t1");
    let client = Arc::new(client);

    let pending = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.receive().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    client.close().await;

    let result = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .expect("receive still pending after close")
        .unwrap();
    assert!(matches!(result, Err(ClientError::Closed)));
}

#[tokio::test]
async fn test_close_without_sessions_touches_nothing() {
    let (client, backend) = memory_client("t1");

    client.close().await;

    assert!(client.is_closed());
    for kind in [
        SessionKind::Consumer,
        SessionKind::SyncProducer,
        SessionKind::AsyncProducer,
    ] {
        assert_eq!(backend.open_count(kind), 0);
        assert_eq!(backend.close_count(kind), 0);
    }
}

#[tokio::test]
async fn test_close_releases_every_active_session() {
    let (client, backend) = memory_client("t1");
    backend.deliver("t1", b"", b"m");

    client.receive().await.unwrap();
    client.sync_send(&Message::new("x")).await.unwrap();
    client.async_send(&Message::new("x")).await.unwrap();
    client.close().await;

    for kind in [
        SessionKind::Consumer,
        SessionKind::SyncProducer,
        SessionKind::AsyncProducer,
    ] {
        assert_eq!(backend.open_count(kind), 1, "{kind}");
        assert_eq!(backend.close_count(kind), 1, "{kind}");
    }
    assert!(!backend.emit(SessionKind::AsyncProducer, SessionEvent::error(None, "late")));
}

#[tokio::test]
async fn test_closed_client_never_reopens() {
    let (client, backend) = memory_client("t1");
    client.sync_send(&Message::new("x")).await.unwrap();
    client.close().await;

    let result = client.sync_send(&Message::new("y")).await;

    assert!(matches!(result, Err(ClientError::Closed)));
    assert_eq!(backend.open_count(SessionKind::SyncProducer), 1);
    assert_eq!(backend.sent().len(), 1);
}

#[tokio::test]
async fn test_setup_failure_is_returned_and_retried() {
    let (client, backend) = memory_client("t1");
    backend.fail_next_open(SessionKind::AsyncProducer, "all brokers down");

    let first = client.async_send(&Message::new("x")).await;
    match first {
        Err(ClientError::Setup { kind, message }) => {
            assert_eq!(kind, SessionKind::AsyncProducer);
            assert_eq!(message, "all brokers down");
        }
        other => panic!("expected setup error, got {other:?}"),
    }
    assert!(backend.enqueued().is_empty());

    client.async_send(&Message::new("x")).await.unwrap();
    assert_eq!(backend.open_count(SessionKind::AsyncProducer), 1);
    assert_eq!(backend.enqueued().len(), 1);
    client.close().await;
}

#[tokio::test]
async fn test_empty_topic_list_is_a_config_error() {
    let (client, _backend) = memory_client(" , ");

    let result = client.receive().await;

    assert!(matches!(result, Err(ClientError::Config(_))));
}

#[tokio::test]
async fn test_empty_topic_list_opens_no_producer() {
    let (client, backend) = memory_client(" , ");

    let sync = client.sync_send(&Message::new("x")).await;
    let async_ = client.async_send(&Message::new("x")).await;

    assert!(matches!(sync, Err(ClientError::Config(_))));
    assert!(matches!(async_, Err(ClientError::Config(_))));
    assert_eq!(backend.open_count(SessionKind::SyncProducer), 0);
    assert_eq!(backend.open_count(SessionKind::AsyncProducer), 0);

    client.close().await;
    assert_eq!(backend.close_count(SessionKind::SyncProducer), 0);
    assert_eq!(backend.close_count(SessionKind::AsyncProducer), 0);
}

#[tokio::test]
async fn test_rejected_enqueue_is_reported_not_returned() {
    let backend = MemoryBackend::new();
    backend.reject_topic("t1");
    let recorder = Arc::new(RecordingObserver::default());
    let observer: Arc<dyn DeliveryObserver> = recorder.clone();
    let client = Client::with_backend(
        Config::new("g1", "b1:9092", "t1,t2"),
        Arc::new(backend.clone()),
    )
    .with_observer(observer);

    client.async_send(&Message::new("x")).await.unwrap();

    let topics: Vec<_> = backend.enqueued().into_iter().map(|r| r.topic).collect();
    assert_eq!(topics, vec!["t2"]);

    let events = recorder.wait_for(2).await;
    match &events[0].1 {
        SessionEvent::Error { topic, message } => {
            assert_eq!(topic.as_deref(), Some("t1"));
            assert!(message.starts_with("enqueue failed"));
        }
        other => panic!("expected enqueue error, got {other:?}"),
    }
    assert!(matches!(events[1].1, SessionEvent::Delivered(_)));
    client.close().await;
}

#[tokio::test]
async fn test_concurrent_first_use_opens_one_session() {
    let (client, backend) = memory_client("t1");
    backend.set_open_delay(Duration::from_millis(30));
    let client = Arc::new(client);

    let mut handles = Vec::new();
    for i in 0..8 {
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move {
            client.sync_send(&Message::new(format!("m{i}"))).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(backend.open_count(SessionKind::SyncProducer), 1);
    assert_eq!(backend.sent().len(), 8);
}

#[tokio::test]
async fn test_defaults_are_resolved_at_construction() {
    let (client, _backend) = memory_client("t1");
    let config = client.config();

    assert_eq!(config.offsets_initial(), OffsetReset::Oldest);
    assert_eq!(config.commit_interval(), Duration::from_secs(1));
    assert_eq!(config.producer_timeout(), Duration::from_secs(5));
    assert!(config.options.consumer.return_errors);
    assert!(config.options.producer.return_errors);
    assert!(config.options.producer.return_successes);
}

#[tokio::test]
async fn test_explicit_settings_survive_construction() {
    let config = Config::new("g1", "b1:9092", "t1")
        .with_offsets_initial(OffsetReset::Newest)
        .with_commit_interval(Duration::from_millis(250))
        .with_producer_timeout(Duration::from_secs(30));
    let client = Client::with_backend(config, Arc::new(MemoryBackend::new()));

    assert_eq!(client.config().offsets_initial(), OffsetReset::Newest);
    assert_eq!(
        client.config().commit_interval(),
        Duration::from_millis(250)
    );
    assert_eq!(client.config().producer_timeout(), Duration::from_secs(30));
}
