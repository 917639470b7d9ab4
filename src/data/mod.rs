//! Data models and processing for metric frames.
//!
//! This module turns decoded frames into the state the dashboard renders:
//! bounded chart series, the latest gauge sections with derived severity,
//! and the monitoring session.
//!
//! ## Submodules
//!
//! - [`dispatch`]: Routes frame sections to their consumers and issues x-axis labels
//! - [`series`]: Capacity-bounded, label-aligned time series ([`Charts`])
//! - [`severity`]: Threshold classifier ([`classify`], [`Thresholds`])
//! - [`session`]: Monitoring session lifecycle ([`MonitoringSession`])
//! - [`dashboard`]: The single state object owning all of the above ([`Dashboard`])
//!
//! ## Data Flow
//!
//! ```text
//! MetricFrame (decoded JSON)
//!        │
//!        ▼
//! Dispatcher::dispatch()
//!        │
//!        ├──▶ Gauges (latest section, severity via Thresholds)
//!        ├──▶ Charts (cpu, memory, network; shared "{n}s" label)
//!        └──▶ MonitoringSession (status / completion)
//! ```

pub mod dashboard;
pub mod dispatch;
pub mod series;
pub mod session;
pub mod severity;

pub use dashboard::{Dashboard, Gauges, Ingested};
pub use dispatch::{DispatchReport, Dispatcher, FrameSink, GaugeSection, SeriesPoint};
pub use series::{Charts, PairedSeries, SeriesName, SingleSeries, TimeSeries, MAX_DATA_POINTS};
pub use session::{
    format_mm_ss, MonitoringSession, SessionPhase, SessionTransition, SESSION_DURATION_SECS,
};
pub use severity::{classify, SeverityLevel, Threshold, Thresholds};
