//! Routing of decoded frames to their consumers.
//!
//! Every section of a frame is optional and checked independently. Present
//! sections are forwarded; absent ones are skipped without synthesizing a
//! value, so series fed by different sections may diverge in length.

use tracing::debug;

use crate::source::{
    Completion, CpuSection, DiskSection, GpuSection, MemorySection, MetricFrame, MonitoringStatus,
    NetworkSection, ProcessSection,
};

/// Bytes per kilobyte used for the network chart conversion.
const BYTES_PER_KB: f64 = 1024.0;

/// A raw section forwarded to the numeric gauge consumers.
#[derive(Debug, Clone, Copy)]
pub enum GaugeSection<'a> {
    Cpu(&'a CpuSection),
    Gpu(&'a GpuSection),
    Memory(&'a MemorySection),
    Network(&'a NetworkSection),
    Disk(&'a DiskSection),
    Processes(&'a ProcessSection),
}

/// A value extracted for one chart series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeriesPoint {
    /// Overall CPU percent.
    Cpu(f64),
    /// Virtual memory percent.
    Memory(f64),
    /// Upload and download throughput in KB/s.
    Network { upload: f64, download: f64 },
}

/// Consumer side of the dispatcher.
pub trait FrameSink {
    /// Receive a raw section for cards, rings and tables.
    fn gauge(&mut self, section: GaugeSection<'_>);

    /// Receive one chart point; all points of a frame share `label`.
    fn series(&mut self, label: &str, point: SeriesPoint);

    /// Receive the monitoring status section.
    fn session_status(&mut self, status: &MonitoringStatus);

    /// Receive a session completion.
    fn session_complete(&mut self, completion: &Completion);
}

/// Summary of what one dispatch did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// Shared x-axis label, when the frame fed any series.
    pub label: Option<String>,
    /// Completion carried by the frame, if any.
    pub completion: Option<Completion>,
}

/// Routes frames to gauges, series and session state.
///
/// The only state is the x-axis label counter, which advances once per
/// frame carrying a cpu, memory or network section.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    counter: u64,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of labels issued so far.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Route one frame into `sink`.
    pub fn dispatch<S: FrameSink + ?Sized>(
        &mut self,
        frame: &MetricFrame,
        sink: &mut S,
    ) -> DispatchReport {
        if let Some(cpu) = &frame.cpu {
            sink.gauge(GaugeSection::Cpu(cpu));
        }
        if let Some(gpu) = &frame.gpu {
            sink.gauge(GaugeSection::Gpu(gpu));
        }
        if let Some(memory) = &frame.memory {
            sink.gauge(GaugeSection::Memory(memory));
        }
        if let Some(network) = &frame.network {
            sink.gauge(GaugeSection::Network(network));
        }
        if let Some(disk) = &frame.disk {
            sink.gauge(GaugeSection::Disk(disk));
        }
        if let Some(processes) = &frame.processes {
            sink.gauge(GaugeSection::Processes(processes));
        }

        let label = self.route_series(frame, sink);

        if let Some(status) = &frame.monitoring_status {
            sink.session_status(status);
        }

        let completion = frame.completion();
        if let Some(ref completion) = completion {
            sink.session_complete(completion);
        }

        DispatchReport { label, completion }
    }

    fn route_series<S: FrameSink + ?Sized>(
        &mut self,
        frame: &MetricFrame,
        sink: &mut S,
    ) -> Option<String> {
        if !frame.has_series_data() {
            return None;
        }

        self.counter += 1;
        let label = format!("{}s", self.counter);

        if let Some(cpu) = &frame.cpu {
            sink.series(&label, SeriesPoint::Cpu(cpu.usage.percent));
        }
        if let Some(memory) = &frame.memory {
            sink.series(&label, SeriesPoint::Memory(memory.virtual_memory.percent));
        }
        if let Some(network) = &frame.network {
            sink.series(
                &label,
                SeriesPoint::Network {
                    upload: network.speed.upload_speed / BYTES_PER_KB,
                    download: network.speed.download_speed / BYTES_PER_KB,
                },
            );
        }

        debug!(label = %label, "Routed series data");
        Some(label)
    }
}
