//! Stream-based frame source.
//!
//! Reads newline-delimited JSON frames from an async byte stream. Used to
//! replay a recorded session file, or any other reader producing frames.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ConnectionState, FrameSource, LinkStatus, MetricFrame, SourceEvent};
use crate::error::Result;

/// Default pause between replayed frames, matching the live frame rate.
pub const DEFAULT_PACE: Duration = Duration::from_secs(1);

/// A frame source that receives frames from an async stream.
///
/// The background task reports `Connection(true)` before the first line and
/// `Connection(false)` at end of stream. Lines that fail to decode are
/// logged and skipped.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use hostpulse::StreamSource;
///
/// # tokio_test::block_on(async {
/// let data = b"{}\n";
/// let stream = Cursor::new(data.to_vec());
/// let source = StreamSource::spawn(stream, "example", None);
/// # });
/// ```
#[derive(Debug)]
pub struct StreamSource {
    receiver: mpsc::Receiver<SourceEvent>,
    description: String,
    state: Arc<Mutex<ConnectionState>>,
    last_error: Arc<Mutex<Option<String>>>,
    cancel: CancellationToken,
}

impl StreamSource {
    /// Spawn a background task that reads from the given async reader.
    ///
    /// With `pace` set, the task waits that long between frames.
    pub fn spawn<R>(reader: R, description: &str, pace: Option<Duration>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(16);
        let state = Arc::new(Mutex::new(ConnectionState::Connecting));
        let last_error = Arc::new(Mutex::new(None));
        let cancel = CancellationToken::new();

        let state_handle = state.clone();
        let error_handle = last_error.clone();
        let token = cancel.clone();

        tokio::spawn(async move {
            *state_handle.lock() = ConnectionState::Connected;
            if tx.send(SourceEvent::Connection(true)).await.is_err() {
                return;
            }

            let mut reader = BufReader::new(reader);
            let mut line = String::new();
            let mut sent = 0usize;

            loop {
                line.clear();
                let read = tokio::select! {
                    _ = token.cancelled() => break,
                    read = reader.read_line(&mut line) => read,
                };

                match read {
                    Ok(0) => break,
                    Ok(_) => {
                        let payload = line.trim();
                        if payload.is_empty() {
                            continue;
                        }
                        let frame = match MetricFrame::decode(payload) {
                            Ok(frame) => frame,
                            Err(e) => {
                                warn!("Skipping malformed frame: {}", e);
                                *error_handle.lock() = Some(e.to_string());
                                continue;
                            }
                        };

                        if let (Some(pace), true) = (pace, sent > 0) {
                            tokio::select! {
                                _ = token.cancelled() => break,
                                _ = tokio::time::sleep(pace) => {}
                            }
                        }

                        if tx.send(SourceEvent::Frame(frame)).await.is_err() {
                            // Receiver dropped
                            return;
                        }
                        sent += 1;
                    }
                    Err(e) => {
                        *error_handle.lock() = Some(format!("Read error: {}", e));
                        break;
                    }
                }
            }

            debug!(frames = sent, "Stream ended");
            *state_handle.lock() = ConnectionState::Disconnected;
            let _ = tx.send(SourceEvent::Connection(false)).await;
        });

        Self {
            receiver: rx,
            description: format!("stream: {}", description),
            state,
            last_error,
            cancel,
        }
    }

    /// Replay a newline-delimited JSON file.
    pub async fn open_file(path: &Path, pace: Option<Duration>) -> Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::spawn(file, &path.display().to_string(), pace))
    }
}

impl FrameSource for StreamSource {
    fn poll(&mut self) -> Option<SourceEvent> {
        self.receiver.try_recv().ok()
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn link(&self) -> LinkStatus {
        LinkStatus {
            state: *self.state.lock(),
            attempts: 0,
            gave_up: false,
        }
    }

    fn error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    fn disconnect(&mut self) {
        self.cancel.cancel();
    }
}

impl Drop for StreamSource {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const CPU_LINE: &str = r#"{"cpu": {"usage": {"percent": 33.0}}}"#;
    const MEMORY_LINE: &str = r#"{"memory": {"virtual": {"percent": 61.0}}}"#;

    fn drain(source: &mut StreamSource) -> Vec<SourceEvent> {
        std::iter::from_fn(|| source.poll()).collect()
    }

    #[tokio::test]
    async fn test_stream_source_replays_frames() {
        let data = format!("{}\n\n{}\n", CPU_LINE, MEMORY_LINE);
        let mut source = StreamSource::spawn(Cursor::new(data), "test", None);

        tokio::time::sleep(Duration::from_millis(50)).await;

        let events = drain(&mut source);
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], SourceEvent::Connection(true));
        assert!(matches!(&events[1], SourceEvent::Frame(f) if f.cpu.is_some()));
        assert!(matches!(&events[2], SourceEvent::Frame(f) if f.memory.is_some()));
        assert_eq!(events[3], SourceEvent::Connection(false));
        assert_eq!(source.link().state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_stream_source_skips_invalid_json() {
        let data = format!("not valid json\n{}\n", CPU_LINE);
        let mut source = StreamSource::spawn(Cursor::new(data), "test", None);

        tokio::time::sleep(Duration::from_millis(50)).await;

        let frames = drain(&mut source)
            .into_iter()
            .filter(|e| matches!(e, SourceEvent::Frame(_)))
            .count();
        assert_eq!(frames, 1);
        assert!(source.error().is_some());
    }

    #[tokio::test]
    async fn test_stream_source_description() {
        let source = StreamSource::spawn(Cursor::new(""), "session.ndjson", None);
        assert_eq!(source.description(), "stream: session.ndjson");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_source_paces_frames() {
        let data = format!("{}\n{}\n{}\n", CPU_LINE, CPU_LINE, CPU_LINE);
        let mut source = StreamSource::spawn(Cursor::new(data), "test", Some(DEFAULT_PACE));

        tokio::time::sleep(Duration::from_millis(500)).await;
        // Connection plus the first frame only
        assert_eq!(drain(&mut source).len(), 2);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let frame = MetricFrame::decode(CPU_LINE).unwrap();
        assert_eq!(drain(&mut source), vec![SourceEvent::Frame(frame)]);

        tokio::time::sleep(Duration::from_secs(2)).await;
        let rest = drain(&mut source);
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[1], SourceEvent::Connection(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_source_disconnect_stops_replay() {
        let data = format!("{}\n{}\n", CPU_LINE, CPU_LINE);
        let mut source = StreamSource::spawn(Cursor::new(data), "test", Some(DEFAULT_PACE));

        tokio::time::sleep(Duration::from_millis(100)).await;
        source.disconnect();
        tokio::time::sleep(Duration::from_secs(5)).await;

        let frames = drain(&mut source)
            .into_iter()
            .filter(|e| matches!(e, SourceEvent::Frame(_)))
            .count();
        assert_eq!(frames, 1);
        assert_eq!(source.link().state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_open_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", CPU_LINE).unwrap();

        let mut source = StreamSource::open_file(file.path(), None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(drain(&mut source).len(), 3);

        let missing = StreamSource::open_file(Path::new("/nonexistent/frames.ndjson"), None).await;
        assert!(missing.is_err());
    }
}
