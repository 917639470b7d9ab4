//! Frame sources feeding the dashboard.
//!
//! A [`FrameSource`] hands the UI loop [`SourceEvent`]s without blocking:
//! connection changes and decoded [`MetricFrame`]s, in the order they were
//! observed. Two implementations exist:
//!
//! - [`WebSocketSource`]: the live backend channel, driven by a
//!   [`ConnectionManager`] with bounded reconnects
//! - [`StreamSource`]: newline-delimited JSON frames from any async reader,
//!   used to replay recorded sessions

mod connection;
mod frame;
mod stream;
mod websocket;

pub use connection::{
    endpoint_url, Channel, ChannelEvent, ConnectionHandle, ConnectionManager, ConnectionState,
    Connector, LinkStatus, ReconnectPolicy, CHANNEL_PATH,
};
pub use frame::{
    Completion, CpuSection, DiskPartition, DiskSection, GpuInfo, GpuSection, MemorySection,
    MetricFrame, MonitoringStatus, NetworkSection, ProcessEntry, ProcessSection,
};
pub use stream::{StreamSource, DEFAULT_PACE};
pub use websocket::WebSocketConnector;

use std::fmt::Debug;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;

/// Something observed by a source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// The underlying channel opened (`true`) or closed (`false`).
    Connection(bool),
    /// A decoded frame.
    Frame(MetricFrame),
}

/// Trait for receiving metric frames from various sources.
pub trait FrameSource: Send + Debug {
    /// Take the next pending event, if any. Never blocks.
    fn poll(&mut self) -> Option<SourceEvent>;

    /// Human-readable description, shown in the header.
    fn description(&self) -> &str;

    /// Current link status.
    fn link(&self) -> LinkStatus;

    /// Last error observed by the source, if any.
    fn error(&self) -> Option<String>;

    /// Stop the source. No reconnects happen afterwards.
    fn disconnect(&mut self);
}

/// Live source backed by the WebSocket channel.
#[derive(Debug)]
pub struct WebSocketSource {
    receiver: mpsc::UnboundedReceiver<SourceEvent>,
    handle: ConnectionHandle,
    task: JoinHandle<()>,
    description: String,
}

impl WebSocketSource {
    /// Connect to `<origin>/ws` and keep reconnecting per `policy`.
    pub fn spawn(origin: &str, policy: ReconnectPolicy) -> Result<Self> {
        let endpoint = endpoint_url(origin)?;
        Ok(Self::spawn_with(endpoint, policy, WebSocketConnector))
    }

    /// Spawn with an explicit connector.
    pub fn spawn_with<C>(endpoint: String, policy: ReconnectPolicy, connector: C) -> Self
    where
        C: Connector + 'static,
    {
        let (tx, receiver) = mpsc::unbounded_channel();
        let mut manager = ConnectionManager::new(endpoint.clone(), policy);

        let frames = tx.clone();
        manager.on_data(move |frame| {
            let _ = frames.send(SourceEvent::Frame(frame));
        });
        manager.on_connection_change(move |connected| {
            let _ = tx.send(SourceEvent::Connection(connected));
        });

        let (handle, task) = manager.spawn(connector);

        Self {
            receiver,
            handle,
            task,
            description: endpoint,
        }
    }

    /// Whether the connection driver has exited (gave up or disconnected).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl FrameSource for WebSocketSource {
    fn poll(&mut self) -> Option<SourceEvent> {
        self.receiver.try_recv().ok()
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn link(&self) -> LinkStatus {
        self.handle.status()
    }

    fn error(&self) -> Option<String> {
        let status = self.handle.status();
        if status.gave_up {
            Some(format!("gave up after {} reconnect attempts", status.attempts))
        } else {
            None
        }
    }

    fn disconnect(&mut self) {
        self.handle.disconnect();
    }
}

impl Drop for WebSocketSource {
    fn drop(&mut self) {
        self.handle.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use std::time::Duration;

    struct RefusingConnector;

    #[async_trait]
    impl Connector for RefusingConnector {
        async fn open(&self, _endpoint: &str) -> Result<Box<dyn Channel>> {
            Err(Error::Connect("refused".to_string()))
        }
    }

    #[test]
    fn test_spawn_rejects_bad_origin() {
        let result = WebSocketSource::spawn("ftp://host", ReconnectPolicy::default());
        assert!(matches!(result, Err(Error::InvalidEndpoint(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_websocket_source_reports_give_up() {
        let policy = ReconnectPolicy {
            max_attempts: 1,
            delay_ms: 100,
        };
        let mut source =
            WebSocketSource::spawn_with("ws://localhost:8000/ws".to_string(), policy, RefusingConnector);
        assert_eq!(source.description(), "ws://localhost:8000/ws");

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(source.poll(), Some(SourceEvent::Connection(false)));
        assert_eq!(source.poll(), Some(SourceEvent::Connection(false)));
        assert_eq!(source.poll(), None);

        let link = source.link();
        assert!(link.gave_up);
        assert_eq!(link.attempts, 1);
        assert!(source.error().is_some());
        assert!(source.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_websocket_source_disconnect() {
        let mut source = WebSocketSource::spawn_with(
            "ws://localhost:8000/ws".to_string(),
            ReconnectPolicy::default(),
            RefusingConnector,
        );
        tokio::time::sleep(Duration::from_millis(500)).await;
        source.disconnect();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(source.is_finished());
        let link = source.link();
        assert_eq!(link.state, ConnectionState::Disconnected);
        assert!(!link.gave_up);
        assert!(source.error().is_none());
    }
}
