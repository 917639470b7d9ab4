//! Application state and interaction logic.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::control::{Backend, ReportDescriptor, SessionStarted, SessionStopped};
use crate::data::{Dashboard, SessionTransition, Thresholds};
use crate::error::Error;
use crate::source::{FrameSource, LinkStatus, MonitoringStatus, SourceEvent};
use crate::ui::Theme;

/// How long a notification stays in the status bar.
pub const NOTICE_TTL: Duration = Duration::from_secs(5);

/// Default file written by the export key.
pub const EXPORT_FILE: &str = "hostpulse_export.json";

/// The current view/tab in the TUI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Gauge cards and live charts.
    Overview,
    /// Top processes by cpu, memory, network and disk.
    Processes,
    /// Partitions and disk I/O.
    Storage,
}

impl View {
    pub fn next(self) -> Self {
        match self {
            View::Overview => View::Processes,
            View::Processes => View::Storage,
            View::Storage => View::Overview,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            View::Overview => View::Storage,
            View::Processes => View::Overview,
            View::Storage => View::Processes,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            View::Overview => "Overview",
            View::Processes => "Processes",
            View::Storage => "Storage",
        }
    }
}

/// Tone of a status-bar notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A transient status-bar notification.
#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
    pub level: NoticeLevel,
    pub at: Instant,
}

/// Result of a backend request, fed back into the UI loop.
#[derive(Debug)]
pub enum ControlOutcome {
    Started(crate::Result<SessionStarted>),
    Stopped(crate::Result<SessionStopped>),
    Status(crate::Result<MonitoringStatus>),
    Reports(crate::Result<Vec<ReportDescriptor>>),
    Downloaded(crate::Result<PathBuf>),
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub current_view: View,
    pub show_help: bool,
    pub show_reports: bool,

    // Data
    source: Box<dyn FrameSource>,
    pub dashboard: Dashboard,
    pub connected: bool,
    pub last_frame_at: Option<Instant>,

    // Backend requests
    backend: Option<Arc<dyn Backend>>,
    outcome_tx: mpsc::UnboundedSender<ControlOutcome>,
    outcome_rx: mpsc::UnboundedReceiver<ControlOutcome>,
    session_request_pending: bool,
    reports_dir: PathBuf,

    // Reports overlay
    pub reports: Vec<ReportDescriptor>,
    pub selected_report: usize,

    // Storage view
    pub selected_partition: usize,

    // UI
    pub theme: Theme,
    notice: Option<Notice>,
}

impl App {
    /// Create a new App reading from `source`.
    ///
    /// Without a backend (e.g. when replaying a recording), session and
    /// report actions are unavailable.
    pub fn new(
        source: Box<dyn FrameSource>,
        thresholds: Thresholds,
        backend: Option<Arc<dyn Backend>>,
        reports_dir: PathBuf,
    ) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        Self {
            running: true,
            current_view: View::Overview,
            show_help: false,
            show_reports: false,
            source,
            dashboard: Dashboard::new(thresholds),
            connected: false,
            last_frame_at: None,
            backend,
            outcome_tx,
            outcome_rx,
            session_request_pending: false,
            reports_dir,
            reports: Vec::new(),
            selected_report: 0,
            selected_partition: 0,
            theme: Theme::dark(),
            notice: None,
        }
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    /// Returns a description of the current frame source.
    pub fn source_description(&self) -> &str {
        self.source.description()
    }

    pub fn link(&self) -> LinkStatus {
        self.source.link()
    }

    pub fn source_error(&self) -> Option<String> {
        self.source.error()
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Whether a start/stop request is waiting for its acknowledgment.
    pub fn session_request_pending(&self) -> bool {
        self.session_request_pending
    }

    /// Show a notification for [`NOTICE_TTL`].
    pub fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notice = Some(Notice {
            message: message.into(),
            level,
            at: Instant::now(),
        });
    }

    /// The current notification, if it hasn't expired.
    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref().filter(|n| n.at.elapsed() < NOTICE_TTL)
    }

    /// Drain pending source events and request outcomes.
    ///
    /// Returns true if anything changed.
    pub fn update(&mut self) -> bool {
        let mut changed = false;

        while let Some(event) = self.source.poll() {
            self.handle_source_event(event);
            changed = true;
        }

        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.handle_outcome(outcome);
            changed = true;
        }

        changed
    }

    fn handle_source_event(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Connection(connected) => {
                if connected != self.connected {
                    if connected {
                        self.notify(NoticeLevel::Success, "Connected to server");
                    } else {
                        self.notify(NoticeLevel::Error, "Disconnected from server");
                    }
                }
                self.connected = connected;
            }
            SourceEvent::Frame(frame) => {
                self.last_frame_at = Some(Instant::now());
                let ingested = self.dashboard.ingest(&frame);
                self.handle_transition(ingested.transition);
                self.clamp_selection();
            }
        }
    }

    fn handle_transition(&mut self, transition: SessionTransition) {
        match transition {
            SessionTransition::None => {}
            SessionTransition::Activated | SessionTransition::Deactivated => {
                self.session_request_pending = false;
            }
            SessionTransition::Completed(completion) => {
                self.session_request_pending = false;
                match (&completion.report, &completion.error) {
                    (_, Some(err)) => {
                        self.notify(NoticeLevel::Error, format!("Report generation failed: {}", err))
                    }
                    (Some(report), None) => self.notify(
                        NoticeLevel::Success,
                        format!("Monitoring complete! Report: {}", report),
                    ),
                    (None, None) => self.notify(NoticeLevel::Success, "Monitoring complete!"),
                }
                self.refresh_reports();
            }
        }
    }

    fn handle_outcome(&mut self, outcome: ControlOutcome) {
        match outcome {
            ControlOutcome::Started(result) => {
                self.session_request_pending = false;
                match result {
                    Ok(_) => {
                        self.dashboard.session.on_start_accepted();
                        self.notify(NoticeLevel::Success, "Monitoring started (5 minutes)");
                    }
                    Err(e) => self.notify_error("Failed to start monitoring", &e),
                }
            }
            ControlOutcome::Stopped(result) => {
                self.session_request_pending = false;
                match result {
                    Ok(stopped) => {
                        let message = match &stopped.pdf_path {
                            Some(path) => format!("Report generated: {}", path),
                            None => "Monitoring stopped".to_string(),
                        };
                        self.dashboard.session.on_stop_accepted(stopped.pdf_path);
                        self.notify(NoticeLevel::Success, message);
                        self.refresh_reports();
                    }
                    Err(e) => self.notify_error("Failed to stop monitoring", &e),
                }
            }
            ControlOutcome::Status(result) => match result {
                Ok(status) => {
                    self.dashboard.session.on_status_frame(&status);
                }
                Err(e) => warn!("Failed to fetch monitoring status: {}", e),
            },
            ControlOutcome::Reports(result) => match result {
                Ok(reports) => {
                    self.reports = reports;
                    self.clamp_selection();
                }
                Err(e) => self.notify_error("Failed to load reports", &e),
            },
            ControlOutcome::Downloaded(result) => match result {
                Ok(path) => {
                    self.notify(NoticeLevel::Success, format!("Saved {}", path.display()))
                }
                Err(e) => self.notify_error("Download failed", &e),
            },
        }
    }

    fn notify_error(&mut self, context: &str, err: &Error) {
        let message = match err {
            Error::Rejected { message, .. } => format!("{}: {}", context, message),
            other => format!("{}: {}", context, other),
        };
        self.notify(NoticeLevel::Error, message);
    }

    fn spawn_request<F>(&self, request: F)
    where
        F: Future<Output = ControlOutcome> + Send + 'static,
    {
        let tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(request.await);
        });
    }

    fn backend_or_notify(&mut self) -> Option<Arc<dyn Backend>> {
        let backend = self.backend.clone();
        if backend.is_none() {
            self.notify(NoticeLevel::Info, "No backend available in replay mode");
        }
        backend
    }

    /// Ask the backend to start a session.
    pub fn start_session(&mut self) {
        if self.session_request_pending {
            self.notify(NoticeLevel::Info, "A request is already in progress");
            return;
        }
        if !self.dashboard.session.can_start() {
            self.notify(NoticeLevel::Info, "Monitoring already in progress");
            return;
        }
        let Some(backend) = self.backend_or_notify() else {
            return;
        };

        info!("Requesting monitoring start");
        self.session_request_pending = true;
        self.spawn_request(async move { ControlOutcome::Started(backend.start().await) });
    }

    /// Ask the backend to stop the running session.
    pub fn stop_session(&mut self) {
        if self.session_request_pending {
            self.notify(NoticeLevel::Info, "A request is already in progress");
            return;
        }
        if !self.dashboard.session.can_stop() {
            self.notify(NoticeLevel::Info, "No monitoring in progress");
            return;
        }
        let Some(backend) = self.backend_or_notify() else {
            return;
        };

        info!("Requesting monitoring stop");
        self.session_request_pending = true;
        self.spawn_request(async move { ControlOutcome::Stopped(backend.stop().await) });
    }

    /// Fetch the current session status once (used at startup).
    pub fn request_status(&mut self) {
        if let Some(backend) = self.backend.clone() {
            self.spawn_request(async move { ControlOutcome::Status(backend.status().await) });
        }
    }

    /// Re-fetch the report list.
    pub fn refresh_reports(&mut self) {
        if let Some(backend) = self.backend.clone() {
            self.spawn_request(async move { ControlOutcome::Reports(backend.list().await) });
        }
    }

    /// Toggle the reports overlay, refreshing the list when opening.
    pub fn toggle_reports(&mut self) {
        if self.show_reports {
            self.show_reports = false;
            return;
        }
        if self.backend_or_notify().is_some() {
            self.show_reports = true;
            self.refresh_reports();
        }
    }

    /// Download the selected report into the reports directory.
    pub fn download_selected_report(&mut self) {
        let Some(report) = self.reports.get(self.selected_report) else {
            return;
        };
        let filename = report.filename.clone();
        let Some(backend) = self.backend_or_notify() else {
            return;
        };

        let dir = self.reports_dir.clone();
        self.notify(NoticeLevel::Info, format!("Downloading {}...", filename));
        self.spawn_request(async move {
            ControlOutcome::Downloaded(backend.download(&filename, &dir).await)
        });
    }

    /// Clear every chart series.
    pub fn clear_charts(&mut self) {
        self.dashboard.charts.reset_all();
        self.notify(NoticeLevel::Info, "Charts cleared");
    }

    pub fn next_view(&mut self) {
        self.current_view = self.current_view.next();
    }

    pub fn prev_view(&mut self) {
        self.current_view = self.current_view.prev();
    }

    pub fn set_view(&mut self, view: View) {
        self.current_view = view;
    }

    /// Move selection down in the active list.
    pub fn select_next(&mut self) {
        if self.show_reports {
            self.selected_report = (self.selected_report + 1).min(self.reports.len().saturating_sub(1));
        } else if self.current_view == View::Storage {
            let max = self.partition_count().saturating_sub(1);
            self.selected_partition = (self.selected_partition + 1).min(max);
        }
    }

    /// Move selection up in the active list.
    pub fn select_prev(&mut self) {
        if self.show_reports {
            self.selected_report = self.selected_report.saturating_sub(1);
        } else if self.current_view == View::Storage {
            self.selected_partition = self.selected_partition.saturating_sub(1);
        }
    }

    fn partition_count(&self) -> usize {
        self.dashboard
            .gauges
            .disk
            .as_ref()
            .map_or(0, |d| d.partitions.len())
    }

    fn clamp_selection(&mut self) {
        self.selected_report = self.selected_report.min(self.reports.len().saturating_sub(1));
        self.selected_partition = self.selected_partition.min(self.partition_count().saturating_sub(1));
    }

    /// Close the topmost overlay. Returns false if none was open.
    pub fn close_overlay(&mut self) -> bool {
        if self.show_help {
            self.show_help = false;
            true
        } else if self.show_reports {
            self.show_reports = false;
            true
        } else {
            false
        }
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Signal the application to quit.
    pub fn quit(&mut self) {
        self.source.disconnect();
        self.running = false;
    }

    /// Export the chart history and session state to a JSON file.
    pub fn export_state(&self, path: &Path) -> Result<()> {
        let charts = &self.dashboard.charts;
        let session = &self.dashboard.session;

        let export = json!({
            "cpu": {
                "labels": charts.cpu.labels(),
                "values": charts.cpu.values(),
            },
            "memory": {
                "labels": charts.memory.labels(),
                "values": charts.memory.values(),
            },
            "network": {
                "labels": charts.network.labels(),
                "upload": charts.network.first(),
                "download": charts.network.second(),
            },
            "session": {
                "phase": session.phase().label(),
                "elapsed_seconds": session.elapsed_seconds(),
                "remaining_seconds": session.remaining_seconds(),
                "progress": session.progress(),
            },
            "exported_at": chrono::Local::now().to_rfc3339(),
        });

        std::fs::write(path, serde_json::to_string_pretty(&export)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{ReportCatalog, SessionControl};
    use crate::source::{ConnectionState, MetricFrame};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    #[derive(Debug, Default)]
    struct QueueSource {
        events: VecDeque<SourceEvent>,
        disconnected: bool,
    }

    impl QueueSource {
        fn with(events: Vec<SourceEvent>) -> Box<Self> {
            Box::new(Self {
                events: events.into(),
                disconnected: false,
            })
        }
    }

    impl FrameSource for QueueSource {
        fn poll(&mut self) -> Option<SourceEvent> {
            self.events.pop_front()
        }

        fn description(&self) -> &str {
            "queue"
        }

        fn link(&self) -> LinkStatus {
            LinkStatus {
                state: ConnectionState::Connected,
                attempts: 0,
                gave_up: false,
            }
        }

        fn error(&self) -> Option<String> {
            None
        }

        fn disconnect(&mut self) {
            self.disconnected = true;
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        reject_start: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl SessionControl for FakeBackend {
        async fn start(&self) -> crate::Result<SessionStarted> {
            self.calls.lock().push("start");
            if self.reject_start {
                return Err(Error::Rejected {
                    status: 400,
                    message: "Monitoring already in progress".to_string(),
                });
            }
            Ok(SessionStarted {
                status: "monitoring_started".to_string(),
                start_time: None,
            })
        }

        async fn stop(&self) -> crate::Result<SessionStopped> {
            self.calls.lock().push("stop");
            Ok(SessionStopped {
                status: "monitoring_stopped".to_string(),
                pdf_path: Some("reports/r1.pdf".to_string()),
                data_points: 12,
            })
        }

        async fn status(&self) -> crate::Result<MonitoringStatus> {
            Ok(MonitoringStatus::default())
        }
    }

    #[async_trait]
    impl ReportCatalog for FakeBackend {
        async fn list(&self) -> crate::Result<Vec<ReportDescriptor>> {
            self.calls.lock().push("list");
            Ok(vec![ReportDescriptor {
                filename: "r1.pdf".to_string(),
                size: 4096,
                created: "2024-01-01T00:00:00".to_string(),
            }])
        }

        async fn download(&self, filename: &str, dest_dir: &Path) -> crate::Result<PathBuf> {
            self.calls.lock().push("download");
            Ok(dest_dir.join(filename))
        }
    }

    fn frame(json: &str) -> SourceEvent {
        SourceEvent::Frame(MetricFrame::decode(json).unwrap())
    }

    fn app_with(events: Vec<SourceEvent>, backend: Option<Arc<FakeBackend>>) -> App {
        let backend = backend.map(|b| b as Arc<dyn Backend>);
        App::new(
            QueueSource::with(events),
            Thresholds::default(),
            backend,
            PathBuf::from("."),
        )
    }

    /// Let spawned requests finish, then drain their outcomes.
    async fn settle(app: &mut App) {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        app.update();
    }

    #[test]
    fn test_view_cycle() {
        assert_eq!(View::Overview.next(), View::Processes);
        assert_eq!(View::Storage.next(), View::Overview);
        assert_eq!(View::Overview.prev(), View::Storage);
    }

    #[test]
    fn test_update_ingests_frames_and_connection() {
        let mut app = app_with(
            vec![
                SourceEvent::Connection(true),
                frame(r#"{"cpu": {"usage": {"percent": 50}}}"#),
                frame(r#"{"cpu": {"usage": {"percent": 55}}}"#),
            ],
            None,
        );

        assert!(app.update());
        assert!(app.connected);
        assert_eq!(app.dashboard.charts.cpu.len(), 2);
        assert_eq!(app.notice().unwrap().message, "Connected to server");
        assert!(!app.update());
    }

    #[test]
    fn test_completion_notifies() {
        let mut app = app_with(
            vec![frame(
                r#"{"monitoring": {"active": false}, "monitoring_complete": true, "pdf_path": "reports/a.pdf"}"#,
            )],
            None,
        );
        app.update();
        let notice = app.notice().unwrap();
        assert_eq!(notice.level, NoticeLevel::Success);
        assert!(notice.message.contains("reports/a.pdf"));
    }

    #[test]
    fn test_completion_with_error_notifies_failure() {
        let mut app = app_with(
            vec![frame(r#"{"monitoring_complete": true, "pdf_error": "disk full"}"#)],
            None,
        );
        app.update();
        let notice = app.notice().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.message.contains("disk full"));
    }

    #[test]
    fn test_session_actions_without_backend() {
        let mut app = app_with(vec![], None);
        app.start_session();
        assert!(!app.session_request_pending());
        assert!(app.notice().unwrap().message.contains("replay"));

        app.toggle_reports();
        assert!(!app.show_reports);
    }

    #[tokio::test]
    async fn test_start_flow() {
        let backend = Arc::new(FakeBackend::default());
        let mut app = app_with(vec![], Some(backend.clone()));

        app.start_session();
        assert!(app.session_request_pending());

        // Second press while pending is ignored
        app.start_session();

        settle(&mut app).await;
        assert!(!app.session_request_pending());
        assert_eq!(*backend.calls.lock(), vec!["start"]);
        assert_eq!(app.dashboard.session.phase().label(), "starting");
        assert!(!app.dashboard.session.is_active());

        // Already starting: no further request
        app.start_session();
        assert!(!app.session_request_pending());
    }

    #[tokio::test]
    async fn test_start_rejected() {
        let backend = Arc::new(FakeBackend {
            reject_start: true,
            ..Default::default()
        });
        let mut app = app_with(vec![], Some(backend));

        app.start_session();
        settle(&mut app).await;

        let notice = app.notice().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(
            notice.message,
            "Failed to start monitoring: Monitoring already in progress"
        );
        assert!(app.dashboard.session.can_start());
    }

    #[tokio::test]
    async fn test_stop_flow_refreshes_reports() {
        let backend = Arc::new(FakeBackend::default());
        let mut app = app_with(
            vec![frame(r#"{"monitoring": {"active": true, "elapsed_seconds": 30}}"#)],
            Some(backend.clone()),
        );
        app.update();
        assert!(app.dashboard.session.is_active());

        app.stop_session();
        settle(&mut app).await;
        settle(&mut app).await;

        assert_eq!(app.dashboard.session.last_report(), Some("reports/r1.pdf"));
        assert_eq!(app.reports.len(), 1);
        assert_eq!(*backend.calls.lock(), vec!["stop", "list"]);
    }

    #[tokio::test]
    async fn test_reports_overlay_download() {
        let backend = Arc::new(FakeBackend::default());
        let mut app = app_with(vec![], Some(backend.clone()));

        app.toggle_reports();
        assert!(app.show_reports);
        settle(&mut app).await;
        assert_eq!(app.reports[0].size_kb(), "4.0 KB");

        app.select_next();
        assert_eq!(app.selected_report, 0);

        app.download_selected_report();
        settle(&mut app).await;
        assert!(app.notice().unwrap().message.starts_with("Saved"));

        assert!(app.close_overlay());
        assert!(!app.close_overlay());
    }

    #[test]
    fn test_clear_charts() {
        let mut app = app_with(vec![frame(r#"{"memory": {"virtual": {"percent": 40}}}"#)], None);
        app.update();
        app.clear_charts();
        assert!(app.dashboard.charts.memory.is_empty());
    }

    #[test]
    fn test_export_state() {
        let mut app = app_with(
            vec![frame(
                r#"{"cpu": {"usage": {"percent": 40}},
                    "network": {"speed": {"upload_speed": 1024, "download_speed": 3072}}}"#,
            )],
            None,
        );
        app.update();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(EXPORT_FILE);
        app.export_state(&path).unwrap();

        let exported: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(exported["cpu"]["labels"][0], "1s");
        assert_eq!(exported["cpu"]["values"][0], 40.0);
        assert_eq!(exported["memory"]["values"].as_array().unwrap().len(), 0);
        assert_eq!(exported["network"]["download"][0], 3.0);
        assert_eq!(exported["session"]["phase"], "idle");
        assert!(exported["exported_at"].is_string());
    }

    #[test]
    fn test_storage_selection_clamped() {
        let mut app = app_with(
            vec![frame(
                r#"{"disk": {"partitions": [{"mountpoint": "/"}, {"mountpoint": "/home"}]}}"#,
            )],
            None,
        );
        app.update();
        app.set_view(View::Storage);
        app.select_next();
        app.select_next();
        assert_eq!(app.selected_partition, 1);
        app.select_prev();
        assert_eq!(app.selected_partition, 0);
    }
}
