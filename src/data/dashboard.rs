//! Process-wide dashboard state.
//!
//! [`Dashboard`] is the composition root for the core: it owns the chart
//! series, the latest gauge sections, the monitoring session and the
//! dispatcher, and is explicitly constructed and passed to whoever drives
//! it. Presentation code only reads from it.

use crate::source::{
    Completion, CpuSection, DiskSection, GpuSection, MemorySection, MetricFrame, MonitoringStatus,
    NetworkSection, ProcessSection,
};

use super::dispatch::{DispatchReport, Dispatcher, FrameSink, GaugeSection, SeriesPoint};
use super::series::Charts;
use super::session::{MonitoringSession, SessionTransition};
use super::severity::{SeverityLevel, Thresholds};

/// Latest raw sections for the numeric gauges.
///
/// A section is replaced only when a frame carries it.
#[derive(Debug, Clone, Default)]
pub struct Gauges {
    pub cpu: Option<CpuSection>,
    pub gpu: Option<GpuSection>,
    pub memory: Option<MemorySection>,
    pub network: Option<NetworkSection>,
    pub disk: Option<DiskSection>,
    pub processes: Option<ProcessSection>,
}

impl Gauges {
    fn update(&mut self, section: GaugeSection<'_>) {
        match section {
            GaugeSection::Cpu(s) => self.cpu = Some(s.clone()),
            GaugeSection::Gpu(s) => self.gpu = Some(s.clone()),
            GaugeSection::Memory(s) => self.memory = Some(s.clone()),
            GaugeSection::Network(s) => self.network = Some(s.clone()),
            GaugeSection::Disk(s) => self.disk = Some(s.clone()),
            GaugeSection::Processes(s) => self.processes = Some(s.clone()),
        }
    }
}

/// Everything the dashboard knows, owned in one place.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub charts: Charts,
    pub gauges: Gauges,
    pub session: MonitoringSession,
    pub thresholds: Thresholds,
    dispatcher: Dispatcher,
    frames: u64,
    last_transition: Option<SessionTransition>,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}

impl Dashboard {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            charts: Charts::new(),
            gauges: Gauges::default(),
            session: MonitoringSession::new(),
            thresholds,
            dispatcher: Dispatcher::new(),
            frames: 0,
            last_transition: None,
        }
    }

    /// Ingest one frame and report what it carried.
    pub fn ingest(&mut self, frame: &MetricFrame) -> Ingested {
        self.frames += 1;
        self.last_transition = None;

        // Take the dispatcher out so `self` can act as the sink.
        let mut dispatcher = std::mem::take(&mut self.dispatcher);
        let report = dispatcher.dispatch(frame, self);
        self.dispatcher = dispatcher;

        Ingested {
            report,
            transition: self.last_transition.take().unwrap_or(SessionTransition::None),
        }
    }

    /// Total frames ingested.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Severity of overall CPU usage.
    pub fn cpu_severity(&self) -> Option<SeverityLevel> {
        self.gauges.cpu.as_ref().map(|c| self.thresholds.cpu.classify(c.usage.percent))
    }

    /// Severity of virtual memory usage.
    pub fn memory_severity(&self) -> Option<SeverityLevel> {
        self.gauges
            .memory
            .as_ref()
            .map(|m| self.thresholds.memory.classify(m.virtual_memory.percent))
    }

    /// Severity of the primary GPU's load; `None` when no GPU is reported.
    pub fn gpu_severity(&self) -> Option<SeverityLevel> {
        self.gauges
            .gpu
            .as_ref()
            .and_then(GpuSection::primary)
            .map(|g| self.thresholds.gpu.classify(g.load))
    }

    /// Worst severity across all reported gauges.
    pub fn overall_severity(&self) -> SeverityLevel {
        let disks = self
            .gauges
            .disk
            .iter()
            .flat_map(|d| d.partitions.iter())
            .map(|p| self.thresholds.disk.classify(p.percent));

        [self.cpu_severity(), self.memory_severity(), self.gpu_severity()]
            .into_iter()
            .flatten()
            .chain(disks)
            .max()
            .unwrap_or(SeverityLevel::Normal)
    }
}

impl FrameSink for Dashboard {
    fn gauge(&mut self, section: GaugeSection<'_>) {
        self.gauges.update(section);
    }

    fn series(&mut self, label: &str, point: SeriesPoint) {
        match point {
            SeriesPoint::Cpu(value) => self.charts.cpu.append(label, value),
            SeriesPoint::Memory(value) => self.charts.memory.append(label, value),
            SeriesPoint::Network { upload, download } => {
                self.charts.network.append_paired(label, upload, download)
            }
        }
    }

    fn session_status(&mut self, status: &MonitoringStatus) {
        let transition = self.session.on_status_frame(status);
        if transition != SessionTransition::None {
            self.last_transition = Some(transition);
        }
    }

    fn session_complete(&mut self, completion: &Completion) {
        self.last_transition = Some(self.session.on_completion_frame(completion));
    }
}

/// Outcome of ingesting one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    pub report: DispatchReport,
    /// The most significant session transition caused by the frame.
    pub transition: SessionTransition,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::session::SessionPhase;

    fn decode(json: &str) -> MetricFrame {
        MetricFrame::decode(json).unwrap()
    }

    #[test]
    fn test_sparse_frames_example() {
        let mut dashboard = Dashboard::default();
        dashboard.ingest(&decode(r#"{"cpu": {"usage": {"percent": 40}}}"#));
        dashboard.ingest(&decode(r#"{"memory": {"virtual": {"percent": 81}}}"#));
        dashboard.ingest(&decode(
            r#"{"cpu": {"usage": {"percent": 90}},
                "network": {"speed": {"upload_speed": 2048, "download_speed": 4096}}}"#,
        ));

        let cpu = &dashboard.charts.cpu;
        assert_eq!(cpu.labels(), &["1s", "3s"]);
        assert_eq!(cpu.values(), &[40.0, 90.0]);

        let memory = &dashboard.charts.memory;
        assert_eq!(memory.labels(), &["2s"]);
        assert_eq!(memory.values(), &[81.0]);

        let network = &dashboard.charts.network;
        assert_eq!(network.labels(), &["3s"]);
        assert_eq!(network.first(), &[2.0]);
        assert_eq!(network.second(), &[4.0]);

        assert_eq!(dashboard.frames(), 3);
    }

    #[test]
    fn test_gauges_keep_last_present_section() {
        let mut dashboard = Dashboard::default();
        dashboard.ingest(&decode(r#"{"cpu": {"usage": {"percent": 70}}}"#));
        dashboard.ingest(&decode(r#"{"memory": {"virtual": {"percent": 95}}}"#));

        assert_eq!(dashboard.gauges.cpu.as_ref().unwrap().usage.percent, 70.0);
        assert_eq!(dashboard.cpu_severity(), Some(SeverityLevel::Warning));
        assert_eq!(dashboard.memory_severity(), Some(SeverityLevel::Danger));
        assert_eq!(dashboard.gpu_severity(), None);
        assert_eq!(dashboard.overall_severity(), SeverityLevel::Danger);
    }

    #[test]
    fn test_disk_and_gpu_severity() {
        let mut dashboard = Dashboard::default();
        assert_eq!(dashboard.overall_severity(), SeverityLevel::Normal);

        dashboard.ingest(&decode(
            r#"{"gpu": {"available": true, "gpus": [{"load": 10}]},
                "disk": {"partitions": [{"mountpoint": "/", "percent": 85.0}]}}"#,
        ));
        assert_eq!(dashboard.gpu_severity(), Some(SeverityLevel::Normal));
        assert_eq!(dashboard.overall_severity(), SeverityLevel::Warning);
    }

    #[test]
    fn test_session_transitions_reported() {
        let mut dashboard = Dashboard::default();

        let ingested = dashboard.ingest(&decode(r#"{"monitoring": {"active": true}}"#));
        assert_eq!(ingested.transition, SessionTransition::Activated);
        assert_eq!(dashboard.session.phase(), SessionPhase::Running);

        let ingested = dashboard.ingest(&decode(r#"{"monitoring": {"active": true}}"#));
        assert_eq!(ingested.transition, SessionTransition::None);

        let ingested = dashboard.ingest(&decode(
            r#"{"monitoring": {"active": false}, "monitoring_complete": true, "pdf_path": "x.pdf"}"#,
        ));
        assert!(matches!(ingested.transition, SessionTransition::Completed(_)));
        assert_eq!(ingested.report.completion.unwrap().report.as_deref(), Some("x.pdf"));
        assert!(!dashboard.session.is_active());
    }

    #[test]
    fn test_completion_without_start() {
        let mut dashboard = Dashboard::default();
        dashboard.ingest(&decode(r#"{"monitoring_complete": true}"#));
        assert!(!dashboard.session.is_active());
        assert!(dashboard.session.can_start());
    }
}
