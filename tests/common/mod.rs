use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kafka_facade::testing::MemoryBackend;
use kafka_facade::{Client, Config, DeliveryObserver, SessionEvent, SessionKind};
use tempfile::TempDir;

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

#[allow(dead_code)]
pub fn memory_client(topics: &str) -> (Client, MemoryBackend) {
    let backend = MemoryBackend::new();
    let client = Client::with_backend(
        Config::new("g1", "b1:9092,b2:9092", topics),
        Arc::new(backend.clone()),
    );
    (client, backend)
}

/// Observer recording every event it is handed.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<(SessionKind, SessionEvent)>>,
}

#[allow(dead_code)]
impl RecordingObserver {
    pub fn events(&self) -> Vec<(SessionKind, SessionEvent)> {
        self.events.lock().unwrap().clone()
    }

    /// Wait until at least `count` events arrived, or two seconds pass.
    pub async fn wait_for(&self, count: usize) -> Vec<(SessionKind, SessionEvent)> {
        let _ = tokio::time::timeout(Duration::from_secs(2), async {
            while self.events.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        self.events()
    }
}

impl DeliveryObserver for RecordingObserver {
    fn on_event(&self, kind: SessionKind, event: &SessionEvent) {
        self.events.lock().unwrap().push((kind, event.clone()));
    }
}
