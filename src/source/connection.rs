//! Connection lifecycle for the live telemetry channel.
//!
//! [`ConnectionManager`] is a small state machine (`Disconnected →
//! Connecting → Connected → Disconnected`) with a bounded, fixed-delay
//! reconnect policy. It is driven by [`ConnectionManager::run`], which owns
//! the manager on a single task, so channel events are handled one at a
//! time and in arrival order. The transport itself sits behind the
//! [`Connector`] / [`Channel`] traits.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::frame::MetricFrame;
use crate::error::{Error, Result};

/// Path of the telemetry channel on the backend.
pub const CHANNEL_PATH: &str = "/ws";

/// Lifecycle state of the duplex channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
        }
    }
}

/// Bounded reconnection with a fixed (non-exponential) delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay_ms: 2000,
        }
    }
}

impl ReconnectPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Observable summary of the connection, published on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkStatus {
    pub state: ConnectionState,
    /// Reconnect attempts since the last successful open.
    pub attempts: u32,
    /// Set once the policy is exhausted; no further reconnects happen.
    pub gave_up: bool,
}

/// Build the channel endpoint from a page-style origin.
///
/// `https` maps to `wss`, `http` to `ws`; host and port are kept and the
/// path is always [`CHANNEL_PATH`].
pub fn endpoint_url(origin: &str) -> Result<String> {
    let url = Url::parse(origin).map_err(|e| Error::InvalidEndpoint(format!("{}: {}", origin, e)))?;

    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => {
            return Err(Error::InvalidEndpoint(format!(
                "unsupported origin scheme '{}' (expected http or https)",
                other
            )))
        }
    };

    let host = url
        .host_str()
        .ok_or_else(|| Error::InvalidEndpoint(format!("{}: missing host", origin)))?;

    let authority = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    Ok(format!("{}://{}{}", scheme, authority, CHANNEL_PATH))
}

/// An event observed on an open channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A text payload.
    Message(String),
    /// A transport error; the channel reports `Closed` afterwards.
    Error(String),
    /// The channel closed.
    Closed,
}

/// An open duplex channel.
#[async_trait]
pub trait Channel: Send {
    /// Wait for the next event. Returns [`ChannelEvent::Closed`] once closed.
    async fn next_event(&mut self) -> ChannelEvent;

    /// Close the channel from our side.
    async fn close(&mut self);
}

/// Opens channels to an endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, endpoint: &str) -> Result<Box<dyn Channel>>;
}

/// Single-slot callback receiving each decoded frame.
pub type DataCallback = Box<dyn FnMut(MetricFrame) + Send>;
/// Single-slot callback receiving `true` on open and `false` on close.
pub type ConnectionCallback = Box<dyn FnMut(bool) + Send>;

/// Connection state machine with bounded reconnection.
pub struct ConnectionManager {
    endpoint: String,
    policy: ReconnectPolicy,
    state: ConnectionState,
    attempts: u32,
    gave_up: bool,
    on_data: Option<DataCallback>,
    on_connection_change: Option<ConnectionCallback>,
    status_tx: watch::Sender<LinkStatus>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.endpoint)
            .field("policy", &self.policy)
            .field("state", &self.state)
            .field("attempts", &self.attempts)
            .field("gave_up", &self.gave_up)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Create a manager for a channel endpoint (see [`endpoint_url`]).
    pub fn new(endpoint: impl Into<String>, policy: ReconnectPolicy) -> Self {
        let (status_tx, _) = watch::channel(LinkStatus::default());
        Self {
            endpoint: endpoint.into(),
            policy,
            state: ConnectionState::Disconnected,
            attempts: 0,
            gave_up: false,
            on_data: None,
            on_connection_change: None,
            status_tx,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn status(&self) -> LinkStatus {
        LinkStatus {
            state: self.state,
            attempts: self.attempts,
            gave_up: self.gave_up,
        }
    }

    /// Watch the published [`LinkStatus`].
    pub fn subscribe(&self) -> watch::Receiver<LinkStatus> {
        self.status_tx.subscribe()
    }

    /// Register the data callback. Replaces any previous registration.
    pub fn on_data(&mut self, callback: impl FnMut(MetricFrame) + Send + 'static) {
        self.on_data = Some(Box::new(callback));
    }

    /// Register the connection-change callback. Replaces any previous registration.
    pub fn on_connection_change(&mut self, callback: impl FnMut(bool) + Send + 'static) {
        self.on_connection_change = Some(Box::new(callback));
    }

    /// A connect attempt is starting.
    pub fn begin_connect(&mut self) {
        debug!(endpoint = %self.endpoint, attempt = self.attempts, "Connecting");
        self.state = ConnectionState::Connecting;
        self.publish();
    }

    /// The channel opened.
    pub fn handle_open(&mut self) {
        info!(endpoint = %self.endpoint, "Connected");
        self.state = ConnectionState::Connected;
        self.attempts = 0;
        self.gave_up = false;
        self.publish();
        self.notify_connection(true);
    }

    /// The channel closed (or never opened). Returns the reconnect delay, if one is scheduled.
    pub fn handle_close(&mut self) -> Option<Duration> {
        info!(endpoint = %self.endpoint, "Disconnected");
        self.state = ConnectionState::Disconnected;
        self.publish();
        self.notify_connection(false);
        self.schedule_reconnect()
    }

    /// A channel error. Logged only; the following close drives recovery.
    pub fn handle_error(&mut self, err: &str) {
        error!(endpoint = %self.endpoint, "Channel error: {}", err);
    }

    /// An inbound payload. Returns whether it decoded into a frame.
    pub fn handle_message(&mut self, payload: &str) -> bool {
        match MetricFrame::decode(payload) {
            Ok(frame) => {
                if let Some(callback) = self.on_data.as_mut() {
                    callback(frame);
                }
                true
            }
            Err(e) => {
                warn!("Discarding malformed frame: {}", e);
                false
            }
        }
    }

    /// Count a reconnect attempt and return its delay, or give up once exhausted.
    pub fn schedule_reconnect(&mut self) -> Option<Duration> {
        if self.attempts < self.policy.max_attempts {
            self.attempts += 1;
            debug!(
                attempt = self.attempts,
                max = self.policy.max_attempts,
                "Reconnect scheduled in {}ms",
                self.policy.delay_ms
            );
            self.publish();
            Some(self.policy.delay())
        } else {
            if !self.gave_up {
                warn!(
                    endpoint = %self.endpoint,
                    "Giving up after {} reconnect attempts",
                    self.attempts
                );
            }
            self.gave_up = true;
            self.publish();
            None
        }
    }

    /// Explicit disconnect. Never schedules a reconnect.
    pub fn handle_disconnect(&mut self) {
        let was_open = self.state == ConnectionState::Connected;
        info!(endpoint = %self.endpoint, "Disconnect requested");
        self.state = ConnectionState::Disconnected;
        self.publish();
        if was_open {
            self.notify_connection(false);
        }
    }

    /// Spawn the driver on the current runtime.
    pub fn spawn<C>(self, connector: C) -> (ConnectionHandle, JoinHandle<()>)
    where
        C: Connector + 'static,
    {
        let cancel = CancellationToken::new();
        let handle = ConnectionHandle {
            cancel: cancel.clone(),
            status: self.subscribe(),
        };
        let task = tokio::spawn(self.run(connector, cancel));
        (handle, task)
    }

    /// Drive the connection until the policy is exhausted or `cancel` fires.
    ///
    /// Cancelling closes an open channel and also aborts a pending
    /// reconnect delay.
    pub async fn run<C>(mut self, connector: C, cancel: CancellationToken)
    where
        C: Connector,
    {
        let endpoint = self.endpoint.clone();

        loop {
            self.begin_connect();

            let opened = tokio::select! {
                _ = cancel.cancelled() => None,
                result = connector.open(&endpoint) => Some(result),
            };
            let Some(opened) = opened else {
                self.handle_disconnect();
                return;
            };

            let delay = match opened {
                Ok(mut channel) => {
                    self.handle_open();
                    match self.pump(channel.as_mut(), &cancel).await {
                        PumpExit::Closed => self.handle_close(),
                        PumpExit::Cancelled => {
                            channel.close().await;
                            self.handle_disconnect();
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!(endpoint = %endpoint, "Connect failed: {}", e);
                    self.handle_close()
                }
            };

            let Some(delay) = delay else {
                return;
            };

            let cancelled = tokio::select! {
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(delay) => false,
            };
            if cancelled {
                self.handle_disconnect();
                return;
            }
        }
    }

    async fn pump(&mut self, channel: &mut dyn Channel, cancel: &CancellationToken) -> PumpExit {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => None,
                event = channel.next_event() => Some(event),
            };
            match event {
                None => return PumpExit::Cancelled,
                Some(ChannelEvent::Message(payload)) => {
                    self.handle_message(&payload);
                }
                Some(ChannelEvent::Error(err)) => self.handle_error(&err),
                Some(ChannelEvent::Closed) => return PumpExit::Closed,
            }
        }
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.status());
    }

    fn notify_connection(&mut self, connected: bool) {
        if let Some(callback) = self.on_connection_change.as_mut() {
            callback(connected);
        }
    }
}

enum PumpExit {
    Closed,
    Cancelled,
}

/// Control handle for a spawned [`ConnectionManager`].
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    cancel: CancellationToken,
    status: watch::Receiver<LinkStatus>,
}

impl ConnectionHandle {
    /// Close the channel and cancel any pending reconnect.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }

    /// Latest published status.
    pub fn status(&self) -> LinkStatus {
        *self.status.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;

    const CPU_FRAME: &str = r#"{"cpu": {"usage": {"percent": 12.5}}}"#;
    const MEMORY_FRAME: &str = r#"{"memory": {"virtual": {"percent": 48}}}"#;

    /// A channel replaying scripted events, then staying silent.
    struct ScriptedChannel {
        events: VecDeque<ChannelEvent>,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Channel for ScriptedChannel {
        async fn next_event(&mut self) -> ChannelEvent {
            match self.events.pop_front() {
                Some(event) => event,
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Opens scripted channels in order (`None` = failed attempt), then fails forever.
    struct ScriptedConnector {
        script: Mutex<VecDeque<Option<Vec<ChannelEvent>>>>,
        opens: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
    }

    impl ScriptedConnector {
        fn new(script: Vec<Option<Vec<ChannelEvent>>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                opens: Arc::new(AtomicUsize::new(0)),
                closed: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn open(&self, _endpoint: &str) -> Result<Box<dyn Channel>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().pop_front() {
                Some(Some(events)) => Ok(Box::new(ScriptedChannel {
                    events: events.into(),
                    closed: self.closed.clone(),
                })),
                _ => Err(Error::Connect("refused".to_string())),
            }
        }
    }

    fn recording_manager(policy: ReconnectPolicy) -> (ConnectionManager, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = ConnectionManager::new("ws://localhost:8000/ws", policy);

        let data_log = log.clone();
        manager.on_data(move |frame| {
            let entry = match (&frame.cpu, &frame.memory) {
                (Some(cpu), _) => format!("cpu:{}", cpu.usage.percent),
                (_, Some(memory)) => format!("memory:{}", memory.virtual_memory.percent),
                _ => "frame".to_string(),
            };
            data_log.lock().push(entry);
        });

        let change_log = log.clone();
        manager.on_connection_change(move |connected| {
            change_log.lock().push(format!("connected:{}", connected));
        });

        (manager, log)
    }

    #[test]
    fn test_endpoint_url_scheme_mapping() {
        assert_eq!(endpoint_url("http://localhost:8000").unwrap(), "ws://localhost:8000/ws");
        assert_eq!(endpoint_url("https://dash.example.com").unwrap(), "wss://dash.example.com/ws");
        assert_eq!(
            endpoint_url("https://dash.example.com:8443/app/index.html?x=1#top").unwrap(),
            "wss://dash.example.com:8443/ws"
        );
        assert_eq!(endpoint_url("http://[::1]:8000/").unwrap(), "ws://[::1]:8000/ws");
    }

    #[test]
    fn test_endpoint_url_rejects_bad_origins() {
        assert!(matches!(endpoint_url("ftp://host"), Err(Error::InvalidEndpoint(_))));
        assert!(matches!(endpoint_url("not a url"), Err(Error::InvalidEndpoint(_))));
    }

    #[test]
    fn test_state_machine_open_close() {
        let (mut manager, log) = recording_manager(ReconnectPolicy::default());
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        manager.begin_connect();
        assert_eq!(manager.state(), ConnectionState::Connecting);

        manager.handle_open();
        assert_eq!(manager.state(), ConnectionState::Connected);

        let delay = manager.handle_close();
        assert_eq!(delay, Some(Duration::from_millis(2000)));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.attempts(), 1);

        assert_eq!(*log.lock(), vec!["connected:true", "connected:false"]);
    }

    #[test]
    fn test_attempts_reset_on_open() {
        let (mut manager, _log) = recording_manager(ReconnectPolicy::default());
        for _ in 0..4 {
            manager.handle_close();
        }
        assert_eq!(manager.attempts(), 4);

        manager.handle_open();
        assert_eq!(manager.attempts(), 0);
        assert!(!manager.status().gave_up);
    }

    #[test]
    fn test_gives_up_at_max_attempts() {
        let policy = ReconnectPolicy {
            max_attempts: 3,
            delay_ms: 10,
        };
        let (mut manager, _log) = recording_manager(policy);

        assert!(manager.schedule_reconnect().is_some());
        assert!(manager.schedule_reconnect().is_some());
        assert!(manager.schedule_reconnect().is_some());
        assert_eq!(manager.attempts(), 3);

        assert!(manager.schedule_reconnect().is_none());
        assert!(manager.schedule_reconnect().is_none());
        assert_eq!(manager.attempts(), 3);
        assert!(manager.status().gave_up);
    }

    #[test]
    fn test_error_does_not_change_state() {
        let (mut manager, log) = recording_manager(ReconnectPolicy::default());
        manager.handle_open();
        manager.handle_error("broken pipe");
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_malformed_message_discarded() {
        let (mut manager, log) = recording_manager(ReconnectPolicy::default());
        manager.handle_open();

        assert!(manager.handle_message(CPU_FRAME));
        assert!(!manager.handle_message("{not json"));
        assert!(!manager.handle_message(r#"{"cpu": 5}"#));
        assert!(manager.handle_message(MEMORY_FRAME));

        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(*log.lock(), vec!["connected:true", "cpu:12.5", "memory:48"]);
    }

    #[test]
    fn test_last_callback_registration_wins() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut manager = ConnectionManager::new("ws://h/ws", ReconnectPolicy::default());

        let counter = first.clone();
        manager.on_data(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = second.clone();
        manager.on_data(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        manager.handle_message("{}");
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disconnect_never_schedules() {
        let (mut manager, log) = recording_manager(ReconnectPolicy::default());
        manager.handle_open();
        manager.handle_disconnect();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.attempts(), 0);

        // A second disconnect while already down does not notify again
        manager.handle_disconnect();
        assert_eq!(*log.lock(), vec!["connected:true", "connected:false"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_gives_up_after_policy() {
        let (manager, log) = recording_manager(ReconnectPolicy::default());
        let status = manager.subscribe();
        let connector = ScriptedConnector::new(vec![]);
        let opens = connector.opens.clone();

        let started = tokio::time::Instant::now();
        manager.run(connector, CancellationToken::new()).await;

        // One initial attempt plus ten reconnects, two seconds apart
        assert_eq!(opens.load(Ordering::SeqCst), 11);
        assert_eq!(started.elapsed(), Duration::from_secs(20));

        let status = *status.borrow();
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert_eq!(status.attempts, 10);
        assert!(status.gave_up);
        assert_eq!(log.lock().len(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_delivers_frames_and_reconnects() {
        let policy = ReconnectPolicy {
            max_attempts: 2,
            delay_ms: 100,
        };
        let (manager, log) = recording_manager(policy);
        let connector = ScriptedConnector::new(vec![
            None,
            Some(vec![
                ChannelEvent::Message(CPU_FRAME.to_string()),
                ChannelEvent::Message("garbage".to_string()),
                ChannelEvent::Error("reset by peer".to_string()),
                ChannelEvent::Message(MEMORY_FRAME.to_string()),
                ChannelEvent::Closed,
            ]),
        ]);
        let opens = connector.opens.clone();

        manager.run(connector, CancellationToken::new()).await;

        // fail (attempt 1), open (reset), close (attempt 1), fail (attempt 2), fail (give up)
        assert_eq!(opens.load(Ordering::SeqCst), 4);
        assert_eq!(
            *log.lock(),
            vec![
                "connected:false",
                "connected:true",
                "cpu:12.5",
                "memory:48",
                "connected:false",
                "connected:false",
                "connected:false",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_reconnect() {
        let (manager, log) = recording_manager(ReconnectPolicy::default());
        let connector = ScriptedConnector::new(vec![]);
        let opens = connector.opens.clone();

        let (handle, task) = manager.spawn(connector);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(handle.status().attempts, 1);

        handle.disconnect();
        task.await.unwrap();

        assert_eq!(opens.load(Ordering::SeqCst), 1);
        let status = handle.status();
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert!(!status.gave_up);
        assert_eq!(*log.lock(), vec!["connected:false"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_closes_open_channel() {
        let (manager, log) = recording_manager(ReconnectPolicy::default());
        let connector =
            ScriptedConnector::new(vec![Some(vec![ChannelEvent::Message(CPU_FRAME.to_string())])]);
        let closed = connector.closed.clone();

        let (handle, task) = manager.spawn(connector);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.status().state, ConnectionState::Connected);

        handle.disconnect();
        task.await.unwrap();

        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert_eq!(handle.status().state, ConnectionState::Disconnected);
        assert_eq!(*log.lock(), vec!["connected:true", "cpu:12.5", "connected:false"]);
    }
}
