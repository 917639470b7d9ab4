//! Metric frame wire types.
//!
//! These types match the JSON objects pushed by the telemetry backend once
//! per second. Every section is optional and every nested field defaults,
//! so a frame carrying only `{"cpu": {...}}` or unknown extra keys still
//! decodes. A `null` value counts as an absent key. Absence of a section is
//! kept as `None`; consumers skip it rather than synthesizing zeros.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// One decoded inbound telemetry message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricFrame {
    /// Backend sampling time (ISO-8601 local time), informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<GpuSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemorySection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<DiskSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processes: Option<ProcessSection>,
    /// Monitoring session status, sent with every frame by the backend.
    #[serde(default, rename = "monitoring", skip_serializing_if = "Option::is_none")]
    pub monitoring_status: Option<MonitoringStatus>,
    /// Set to `true` on the frame that closes a timed session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring_complete: Option<bool>,
    /// Report reference accompanying a completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_path: Option<String>,
    /// Report generation failure accompanying a completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_error: Option<String>,
}

impl MetricFrame {
    /// Decode a frame from a JSON text payload.
    pub fn decode(payload: &str) -> Result<Self> {
        let mut value: Value =
            serde_json::from_str(payload).map_err(|e| Error::Decode(e.to_string()))?;
        strip_nulls(&mut value);
        serde_json::from_value(value).map_err(|e| Error::Decode(e.to_string()))
    }

    /// The completion section, present only when `monitoring_complete` is true.
    pub fn completion(&self) -> Option<Completion> {
        if self.monitoring_complete != Some(true) {
            return None;
        }
        Some(Completion {
            report: self.pdf_path.clone(),
            error: self.pdf_error.clone(),
        })
    }

    /// Whether this frame carries any section that feeds a chart series.
    pub fn has_series_data(&self) -> bool {
        self.cpu.is_some() || self.memory.is_some() || self.network.is_some()
    }
}

/// Drop every object member whose value is `null`, at any depth, so the
/// field falls back to its default.
fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}

/// Terminal event of a monitoring session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Opaque report reference (backend file path).
    pub report: Option<String>,
    /// Report generation error, if the backend failed to produce one.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuSection {
    pub usage: CpuUsage,
    pub temperature: Temperature,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuUsage {
    /// Overall utilisation in percent.
    pub percent: f64,
    pub per_core: Vec<f64>,
    pub frequency: CpuFrequency,
    pub cores: CpuCores,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuFrequency {
    /// MHz.
    pub current: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuCores {
    pub logical: u32,
    pub physical: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Temperature {
    pub available: bool,
    pub value: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuSection {
    pub available: bool,
    pub count: u32,
    pub gpus: Vec<GpuInfo>,
}

impl GpuSection {
    /// The GPU shown on the dashboard card, if any is reported.
    pub fn primary(&self) -> Option<&GpuInfo> {
        if self.available {
            self.gpus.first()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuInfo {
    pub id: u32,
    pub name: String,
    /// Load in percent.
    pub load: f64,
    /// MB.
    pub memory_total: f64,
    pub memory_used: f64,
    pub temperature: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    #[serde(rename = "virtual")]
    pub virtual_memory: VirtualMemory,
    pub swap: SwapMemory,
}

/// RAM usage; sizes in GB.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualMemory {
    pub total: f64,
    pub available: f64,
    pub used: f64,
    pub free: f64,
    pub percent: f64,
    pub total_bytes: u64,
    pub used_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapMemory {
    pub total: f64,
    pub used: f64,
    pub free: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    pub io: NetworkIo,
    pub speed: NetworkSpeed,
    pub connections: NetworkConnections,
    pub interfaces: BTreeMap<String, NetworkInterface>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkIo {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errin: u64,
    pub errout: u64,
    pub dropin: u64,
    pub dropout: u64,
    pub bytes_sent_formatted: String,
    pub bytes_recv_formatted: String,
}

/// Throughput in bytes per second.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSpeed {
    pub upload_speed: f64,
    pub download_speed: f64,
    pub upload_speed_formatted: String,
    pub download_speed_formatted: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConnections {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkInterface {
    pub is_up: bool,
    pub speed: u64,
    pub addresses: Vec<InterfaceAddress>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceAddress {
    pub family: String,
    pub address: String,
    pub netmask: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskSection {
    pub partitions: Vec<DiskPartition>,
    pub io: DiskIo,
}

/// One mounted filesystem; sizes in GB.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskPartition {
    pub device: String,
    pub mountpoint: String,
    pub fstype: String,
    pub total: f64,
    pub used: f64,
    pub free: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskIo {
    pub read_count: u64,
    pub write_count: u64,
    /// MB.
    pub read_bytes: f64,
    pub write_bytes: f64,
    pub read_time: u64,
    pub write_time: u64,
}

/// Top-N process tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessSection {
    /// `value` is CPU percent.
    pub cpu_top: Vec<ProcessEntry>,
    /// `value` is memory percent.
    pub memory_top: Vec<ProcessEntry>,
    /// `value` is cumulative read+write MB.
    pub disk_top: Vec<ProcessEntry>,
    /// `value` is the number of open connections.
    pub network_top: Vec<ProcessEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub value: f64,
}

/// Status of the timed monitoring session as seen by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringStatus {
    pub active: bool,
    pub elapsed_seconds: f64,
    pub remaining_seconds: f64,
    pub data_points: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_frame() {
        let json = r#"{
            "timestamp": "2024-05-01T10:00:00.000001",
            "cpu": {
                "usage": {
                    "percent": 42.5,
                    "per_core": [40.0, 45.0],
                    "frequency": {"current": 2400.0, "min": 800.0, "max": 3600.0},
                    "cores": {"logical": 8, "physical": 4}
                },
                "temperature": {"available": true, "value": 55.0, "unit": "°C"}
            },
            "memory": {
                "virtual": {"total": 16.0, "available": 8.5, "used": 7.5, "free": 6.0, "percent": 46.9,
                            "total_bytes": 17179869184, "used_bytes": 8053063680},
                "swap": {"total": 2.0, "used": 0.0, "free": 2.0, "percent": 0.0}
            },
            "network": {
                "speed": {"upload_speed": 2048, "download_speed": 4096,
                          "upload_speed_formatted": "2.00 KB/s", "download_speed_formatted": "4.00 KB/s"},
                "connections": {"total": 12, "by_status": {"ESTABLISHED": 10, "LISTEN": 2}}
            },
            "monitoring": {"active": true, "elapsed_seconds": 12.5, "remaining_seconds": 287.5, "data_points": 12}
        }"#;

        let frame = MetricFrame::decode(json).unwrap();
        let cpu = frame.cpu.as_ref().unwrap();
        assert_eq!(cpu.usage.percent, 42.5);
        assert_eq!(cpu.usage.cores.physical, Some(4));
        assert!(cpu.temperature.available);

        let memory = frame.memory.as_ref().unwrap();
        assert_eq!(memory.virtual_memory.percent, 46.9);

        let network = frame.network.as_ref().unwrap();
        assert_eq!(network.speed.upload_speed, 2048.0);
        assert_eq!(network.connections.by_status.get("LISTEN"), Some(&2));
        // Sub-objects missing from the section fall back to defaults
        assert_eq!(network.io.bytes_sent, 0);

        assert!(frame.gpu.is_none());
        assert!(frame.disk.is_none());
        assert!(frame.processes.is_none());
        assert!(frame.monitoring_status.as_ref().unwrap().active);
        assert!(frame.completion().is_none());
    }

    #[test]
    fn test_decode_empty_and_unknown_keys() {
        let frame = MetricFrame::decode("{}").unwrap();
        assert_eq!(frame, MetricFrame::default());
        assert!(!frame.has_series_data());

        let frame = MetricFrame::decode(r#"{"fan": {"rpm": 1200}, "cpu": {}}"#).unwrap();
        assert!(frame.cpu.is_some());
        assert_eq!(frame.cpu.unwrap().usage.percent, 0.0);
    }

    #[test]
    fn test_decode_failures() {
        assert!(matches!(MetricFrame::decode("not json"), Err(Error::Decode(_))));
        assert!(MetricFrame::decode(r#"{"cpu": "busy"}"#).is_err());
        assert!(MetricFrame::decode("[1, 2, 3]").is_err());
    }

    #[test]
    fn test_decode_null_fields_as_absent() {
        let json = r#"{
            "cpu": {"usage": {"percent": 40, "cores": {"logical": null, "physical": null}}},
            "processes": {"cpu_top": [{"pid": 1, "name": null, "value": 0.0}]},
            "memory": null,
            "pdf_error": null
        }"#;

        let frame = MetricFrame::decode(json).unwrap();
        let cpu = frame.cpu.as_ref().unwrap();
        assert_eq!(cpu.usage.percent, 40.0);
        assert_eq!(cpu.usage.cores.logical, 0);
        assert_eq!(cpu.usage.cores.physical, None);

        let top = &frame.processes.as_ref().unwrap().cpu_top;
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].pid, 1);
        assert_eq!(top[0].name, "");

        assert!(frame.memory.is_none());
        assert!(frame.pdf_error.is_none());

        // The rest of the frame still reaches the charts
        let mut dashboard = crate::data::Dashboard::new(crate::data::Thresholds::default());
        dashboard.ingest(&frame);
        assert_eq!(dashboard.charts.cpu.len(), 1);
    }

    #[test]
    fn test_completion_section() {
        let frame =
            MetricFrame::decode(r#"{"monitoring_complete": true, "pdf_path": "../reports/r1.pdf"}"#)
                .unwrap();
        let completion = frame.completion().unwrap();
        assert_eq!(completion.report.as_deref(), Some("../reports/r1.pdf"));
        assert!(completion.error.is_none());

        let frame =
            MetricFrame::decode(r#"{"monitoring_complete": true, "pdf_error": "disk full"}"#)
                .unwrap();
        assert_eq!(frame.completion().unwrap().error.as_deref(), Some("disk full"));

        let frame = MetricFrame::decode(r#"{"monitoring_complete": false}"#).unwrap();
        assert!(frame.completion().is_none());
    }

    #[test]
    fn test_gpu_primary() {
        let frame = MetricFrame::decode(
            r#"{"gpu": {"available": true, "count": 1, "gpus": [{"id": 0, "name": "RTX", "load": 33.0}]}}"#,
        )
        .unwrap();
        assert_eq!(frame.gpu.as_ref().unwrap().primary().unwrap().load, 33.0);

        let unavailable = GpuSection {
            available: false,
            count: 0,
            gpus: vec![],
        };
        assert!(unavailable.primary().is_none());
    }
}
