//! # hostpulse
//!
//! A live terminal dashboard and library for host telemetry streamed over
//! WebSocket.
//!
//! A metrics backend pushes one JSON frame per second over `<origin>/ws`.
//! This crate keeps that channel alive with a bounded reconnect policy,
//! routes every frame section to its consumer, keeps one minute of chart
//! history per series, classifies gauges into severity levels, and tracks
//! the backend's five-minute monitoring session.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Application                          │
//! │  ┌─────────┐    ┌───────────┐    ┌─────────┐    ┌──────────┐ │
//! │  │   app   │───▶│   data    │───▶│   ui    │───▶│ Terminal │ │
//! │  │ (state) │    │(dashboard)│    │(render) │    │          │ │
//! │  └────┬────┘    └───────────┘    └─────────┘    └──────────┘ │
//! │       │                                                      │
//! │       ├──▶ source  ◀── WebSocketSource | StreamSource        │
//! │       │                                                      │
//! │       └──▶ control ──▶ start/stop session, list reports      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`source`]**: Frame sources ([`FrameSource`] trait), the
//!   [`ConnectionManager`] state machine and its WebSocket transport
//! - **[`data`]**: Frame dispatch, bounded [`TimeSeries`], severity
//!   classification and the [`MonitoringSession`], all owned by [`Dashboard`]
//! - **[`control`]**: HTTP collaborators for session control and report listing
//! - **[`app`]** / **[`events`]** / **[`ui`]**: The terminal front end
//! - **[`config`]**: Layered [`Settings`] (defaults, TOML file, environment)
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Watch a live backend
//! hostpulse --server http://localhost:8000
//!
//! # Replay a recorded session (one JSON frame per line)
//! hostpulse --replay session.ndjson
//!
//! # Log to stderr instead of drawing a UI
//! hostpulse --headless
//! ```
//!
//! ### As a library with the dashboard state alone
//!
//! ```
//! use hostpulse::{Dashboard, MetricFrame, SeverityLevel, Thresholds};
//!
//! let mut dashboard = Dashboard::new(Thresholds::default());
//! let frame = MetricFrame::decode(r#"{"cpu": {"usage": {"percent": 91.0}}}"#).unwrap();
//! dashboard.ingest(&frame);
//!
//! assert_eq!(dashboard.charts.cpu.len(), 1);
//! assert_eq!(dashboard.cpu_severity(), Some(SeverityLevel::Danger));
//! ```
//!
//! ### Replaying a recording
//!
//! ```no_run
//! use std::io::Cursor;
//! use std::path::PathBuf;
//! use hostpulse::{App, StreamSource, Thresholds};
//!
//! # tokio_test::block_on(async {
//! let data = b"{\"cpu\": {\"usage\": {\"percent\": 12.5}}}\n";
//! let source = StreamSource::spawn(Cursor::new(data.to_vec()), "example", None);
//! let app = App::new(Box::new(source), Thresholds::default(), None, PathBuf::from("."));
//! # });
//! ```
//!
//! ### Watching a live backend
//!
//! ```no_run
//! use hostpulse::{FrameSource, ReconnectPolicy, SourceEvent, WebSocketSource};
//!
//! # tokio_test::block_on(async {
//! let mut source = WebSocketSource::spawn("http://localhost:8000", ReconnectPolicy::default())?;
//! while let Some(event) = source.poll() {
//!     if let SourceEvent::Frame(frame) = event {
//!         println!("{:?}", frame.cpu);
//!     }
//! }
//! # Ok::<(), hostpulse::Error>(())
//! # });
//! ```

pub mod app;
pub mod config;
pub mod control;
pub mod data;
pub mod error;
pub mod events;
pub mod source;
pub mod ui;

// Re-export main types for convenience
pub use app::App;
pub use config::{Overrides, Settings};
pub use control::{Backend, HttpControl, ReportCatalog, ReportDescriptor, SessionControl};
pub use data::{
    classify, Charts, Dashboard, Dispatcher, MonitoringSession, SessionPhase, SessionTransition,
    SeverityLevel, Threshold, Thresholds, TimeSeries, MAX_DATA_POINTS, SESSION_DURATION_SECS,
};
pub use error::{Error, Result};
pub use source::{
    ConnectionManager, ConnectionState, FrameSource, LinkStatus, MetricFrame, ReconnectPolicy,
    SourceEvent, StreamSource, WebSocketSource,
};
