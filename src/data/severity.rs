//! Threshold-based severity classification.

use serde::{Deserialize, Serialize};

/// Severity of a metric value.
///
/// Derived on every update, never stored alongside the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeverityLevel {
    Normal,
    Warning,
    Danger,
}

impl SeverityLevel {
    /// Returns the badge text for display.
    pub fn label(&self) -> &'static str {
        match self {
            SeverityLevel::Normal => "Normal",
            SeverityLevel::Warning => "Warning",
            SeverityLevel::Danger => "Critical",
        }
    }
}

/// Classify `value` against a warning and a danger threshold.
///
/// Both boundaries are inclusive: a value equal to `danger_threshold` is
/// [`SeverityLevel::Danger`], a value equal to `warn_threshold` is
/// [`SeverityLevel::Warning`]. NaN compares false and classifies as normal.
pub fn classify(value: f64, warn_threshold: f64, danger_threshold: f64) -> SeverityLevel {
    if value >= danger_threshold {
        SeverityLevel::Danger
    } else if value >= warn_threshold {
        SeverityLevel::Warning
    } else {
        SeverityLevel::Normal
    }
}

/// A warning/danger threshold pair for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub warn: f64,
    pub danger: f64,
}

impl Threshold {
    pub const fn new(warn: f64, danger: f64) -> Self {
        Self { warn, danger }
    }

    pub fn classify(&self, value: f64) -> SeverityLevel {
        classify(value, self.warn, self.danger)
    }

    /// A pair is usable only when the warning level sits strictly below danger.
    pub fn is_valid(&self) -> bool {
        self.warn.is_finite() && self.danger.is_finite() && self.warn < self.danger
    }
}

/// Per-metric thresholds supplied to the classifier.
///
/// The classifier itself carries no metric knowledge; these defaults are
/// what the dashboard cards and tables use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Overall CPU usage percent.
    pub cpu: Threshold,
    /// Virtual memory usage percent.
    pub memory: Threshold,
    /// Load percent of the primary GPU.
    pub gpu: Threshold,
    /// Partition usage percent.
    pub disk: Threshold,
    /// Per-process CPU percent.
    pub process_cpu: Threshold,
    /// Per-process memory percent.
    pub process_memory: Threshold,
    /// Per-process open connections.
    pub process_network: Threshold,
    /// Per-process disk I/O in MB.
    pub process_disk: Threshold,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu: Threshold::new(60.0, 85.0),
            memory: Threshold::new(70.0, 90.0),
            gpu: Threshold::new(70.0, 90.0),
            disk: Threshold::new(80.0, 90.0),
            process_cpu: Threshold::new(10.0, 20.0),
            process_memory: Threshold::new(10.0, 20.0),
            process_network: Threshold::new(10.0, 50.0),
            process_disk: Threshold::new(50.0, 100.0),
        }
    }
}

impl Thresholds {
    /// Returns the name of the first pair whose warning level is not below danger.
    pub fn first_invalid(&self) -> Option<&'static str> {
        [
            ("cpu", self.cpu),
            ("memory", self.memory),
            ("gpu", self.gpu),
            ("disk", self.disk),
            ("process_cpu", self.process_cpu),
            ("process_memory", self.process_memory),
            ("process_network", self.process_network),
            ("process_disk", self.process_disk),
        ]
        .into_iter()
        .find(|(_, t)| !t.is_valid())
        .map(|(name, _)| name)
    }
}
