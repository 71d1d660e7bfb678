#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use pdx_engine::{DiagnosticBatch, DiagnosticsSink, Engine, EngineConfig, Phase};
use pdx_schema::SchemaSet;
use tokio::sync::mpsc;

pub const EVENTS: &str = "file:///mod/events/test.txt";
pub const TRAITS: &str = "file:///mod/common/traits/traits.txt";

pub fn config() -> EngineConfig {
    EngineConfig::from_json_str(
        r#"{
            "workers": 2,
            "schemas": [{ "pattern": "**/events/*.txt", "schema": "event" }],
            "extraction": [
                { "path": "**/events/*.txt", "category": "event", "nameField": "id" },
                { "path": "**/common/traits/*.txt", "category": "trait" }
            ]
        }"#,
    )
    .unwrap()
}

pub fn schemas() -> SchemaSet {
    SchemaSet::from_json_str(
        r#"{
            "schemas": {
                "event": {
                    "fields": {
                        "id": { "type": "scalar", "required": true },
                        "title": { "type": "scalar", "required": true },
                        "trait": { "type": "scalar", "reference": "trait" }
                    }
                }
            }
        }"#,
    )
    .unwrap()
}

pub fn engine() -> Engine {
    Engine::new(config(), &schemas()).unwrap()
}

pub fn codes(batch: &DiagnosticBatch) -> Vec<&str> {
    batch.diagnostics.iter().map(|d| d.code.as_str()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Published {
        uri: String,
        version: u64,
        batch: DiagnosticBatch,
    },
    Cleared {
        uri: String,
    },
}

/// Forwards everything the scheduler publishes to a channel.
pub struct ChannelSink(mpsc::UnboundedSender<SinkEvent>);

impl ChannelSink {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self(tx)), rx)
    }
}

impl DiagnosticsSink for ChannelSink {
    fn publish(&self, uri: &str, version: u64, batch: DiagnosticBatch) {
        let _ = self.0.send(SinkEvent::Published {
            uri: uri.to_string(),
            version,
            batch,
        });
    }

    fn clear(&self, uri: &str) {
        let _ = self.0.send(SinkEvent::Cleared { uri: uri.to_string() });
    }
}

pub async fn next(rx: &mut mpsc::UnboundedReceiver<SinkEvent>) -> SinkEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for the scheduler")
        .expect("sink channel closed")
}

/// Next published batch, as `(uri, version, batch)`.
pub async fn next_batch(rx: &mut mpsc::UnboundedReceiver<SinkEvent>) -> (String, u64, DiagnosticBatch) {
    match next(rx).await {
        SinkEvent::Published { uri, version, batch } => (uri, version, batch),
        other => panic!("expected a published batch, got {other:?}"),
    }
}

/// Both batches for one version, checking they arrive syntax first.
pub async fn next_pair(
    rx: &mut mpsc::UnboundedReceiver<SinkEvent>,
) -> (u64, DiagnosticBatch, DiagnosticBatch) {
    let (uri, version, syntax) = next_batch(rx).await;
    let (uri2, version2, semantic) = next_batch(rx).await;
    assert_eq!(uri, uri2);
    assert_eq!(version, version2);
    assert_eq!(syntax.phase, Phase::Syntax);
    assert_eq!(semantic.phase, Phase::Semantic);
    (version, syntax, semantic)
}

/// Nothing else arrives within `window`.
pub async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<SinkEvent>, window: Duration) {
    if let Ok(Some(event)) = tokio::time::timeout(window, rx.recv()).await {
        panic!("unexpected sink event: {event:?}");
    }
}
