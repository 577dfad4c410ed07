use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Context,
    Search,
}

/// One served request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub operation: Operation,
    pub repo_id: String,
    pub duration_ms: u64,
    pub result_count: usize,
    pub cache_hit: bool,
    /// The request failed and was answered with the fallback response
    pub fallback: bool,
    pub timestamp_ms: u64,
}

impl TelemetryEvent {
    pub fn new(operation: Operation, repo_id: impl Into<String>) -> Self {
        Self {
            operation,
            repo_id: repo_id.into(),
            duration_ms: 0,
            result_count: 0,
            cache_hit: false,
            fallback: false,
            timestamp_ms: unix_ms_now(),
        }
    }
}

fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Destination of telemetry events
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn record(&self, event: &TelemetryEvent) -> Result<()>;
}

/// Writes events to the `scout::telemetry` log target
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl TelemetrySink for LogSink {
    async fn record(&self, event: &TelemetryEvent) -> Result<()> {
        log::info!(
            target: "scout::telemetry",
            "{:?} repo={} duration_ms={} results={} cache_hit={} fallback={}",
            event.operation,
            event.repo_id,
            event.duration_ms,
            event.result_count,
            event.cache_hit,
            event.fallback
        );
        Ok(())
    }
}

/// Appends one JSON object per line
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TelemetrySink for JsonlSink {
    async fn record(&self, event: &TelemetryEvent) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Keeps events in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl MemorySink {
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TelemetrySink for MemorySink {
    async fn record(&self, event: &TelemetryEvent) -> Result<()> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        Ok(())
    }
}

/// Bounded background queue in front of a sink.
///
/// At most `pending_limit` events wait for the sink; events submitted beyond
/// that are dropped rather than slowing the request path.
pub struct TelemetryWriter {
    sender: mpsc::Sender<TelemetryEvent>,
    task: JoinHandle<()>,
}

impl TelemetryWriter {
    /// Start the drain task; requires a tokio runtime
    pub fn spawn(sink: Arc<dyn TelemetrySink>, pending_limit: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<TelemetryEvent>(pending_limit.max(1));
        let task = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                if let Err(e) = sink.record(&event).await {
                    log::warn!("Telemetry sink failed: {e}");
                }
            }
        });
        Self { sender, task }
    }

    /// Queue `event`; `false` when it was dropped
    pub fn submit(&self, event: TelemetryEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                log::debug!("Telemetry queue full; dropping {:?} event", event.operation);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Deliver everything queued, then stop
    pub async fn flush(self) {
        drop(self.sender);
        if let Err(e) = self.task.await {
            log::warn!("Telemetry writer stopped abnormally: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn event(n: usize) -> TelemetryEvent {
        let mut event = TelemetryEvent::new(Operation::Context, "repo");
        event.result_count = n;
        event
    }

    #[tokio::test]
    async fn overflow_is_dropped() {
        let sink = Arc::new(MemorySink::default());
        let writer = TelemetryWriter::spawn(sink.clone(), 10);
        // current-thread runtime: the drain task cannot run before we yield
        let accepted: Vec<bool> = (0..12).map(|n| writer.submit(event(n))).collect();
        assert_eq!(accepted.iter().filter(|a| **a).count(), 10);
        assert!(!accepted[10] && !accepted[11]);

        writer.flush().await;
        let counts: Vec<usize> = sink.events().iter().map(|e| e.result_count).collect();
        assert_eq!(counts, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn jsonl_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry/events.jsonl");
        let writer = TelemetryWriter::spawn(Arc::new(JsonlSink::new(&path)), 10);
        assert!(writer.submit(event(1)));
        assert!(writer.submit(event(2)));
        writer.flush().await;

        let text = std::fs::read_to_string(&path).unwrap();
        let events: Vec<TelemetryEvent> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].result_count, 2);
        assert_eq!(events[0].operation, Operation::Context);
    }
}
