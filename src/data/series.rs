//! Bounded time series backing the live charts.

use std::collections::VecDeque;

use serde::Serialize;

/// Maximum number of points kept per series (one minute at one frame per second).
pub const MAX_DATA_POINTS: usize = 60;

/// A capacity-bounded, label-aligned history of `N` parallel value lines.
///
/// Labels and every value line always have the same length. Appending past
/// capacity evicts exactly the oldest entry from all of them.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries<const N: usize> {
    capacity: usize,
    labels: VecDeque<String>,
    values: [VecDeque<f64>; N],
}

/// A series with a single value line (e.g. CPU percent).
pub type SingleSeries = TimeSeries<1>;
/// A series with two value lines sharing one label axis (e.g. upload/download).
pub type PairedSeries = TimeSeries<2>;

impl<const N: usize> Default for TimeSeries<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> TimeSeries<N> {
    /// Create an empty series holding at most [`MAX_DATA_POINTS`] entries.
    pub fn new() -> Self {
        Self::with_capacity(MAX_DATA_POINTS)
    }

    /// Create an empty series with a custom capacity (at least one entry).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            labels: VecDeque::with_capacity(capacity + 1),
            values: std::array::from_fn(|_| VecDeque::with_capacity(capacity + 1)),
        }
    }

    /// Append one aligned entry, then evict the oldest one if over capacity.
    pub fn push(&mut self, label: impl Into<String>, values: [f64; N]) {
        self.labels.push_back(label.into());
        for (line, value) in self.values.iter_mut().zip(values) {
            line.push_back(value);
        }

        if self.labels.len() > self.capacity {
            self.labels.pop_front();
            for line in &mut self.values {
                line.pop_front();
            }
        }

        debug_assert!(self.values.iter().all(|line| line.len() == self.labels.len()));
    }

    /// Clear labels and all value lines.
    pub fn reset(&mut self) {
        self.labels.clear();
        for line in &mut self.values {
            line.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Labels, oldest first.
    pub fn labels(&self) -> &VecDeque<String> {
        &self.labels
    }

    /// The value line at `index`, oldest first.
    ///
    /// Panics if `index >= N`.
    pub fn line(&self, index: usize) -> &VecDeque<f64> {
        &self.values[index]
    }

    /// The most recent label, if any.
    pub fn last_label(&self) -> Option<&str> {
        self.labels.back().map(String::as_str)
    }

    /// Chart points `(index, value)` for one line, oldest first.
    pub fn points(&self, index: usize) -> Vec<(f64, f64)> {
        self.values[index].iter().enumerate().map(|(i, v)| (i as f64, *v)).collect()
    }

    /// Largest value across all lines, or `None` when empty.
    pub fn max_value(&self) -> Option<f64> {
        self.values.iter().flat_map(|line| line.iter().copied()).reduce(f64::max)
    }
}

impl TimeSeries<1> {
    /// Append a single-value entry.
    pub fn append(&mut self, label: impl Into<String>, value: f64) {
        self.push(label, [value]);
    }

    /// Values, oldest first.
    pub fn values(&self) -> &VecDeque<f64> {
        &self.values[0]
    }

    /// Latest value, if any.
    pub fn latest(&self) -> Option<f64> {
        self.values[0].back().copied()
    }
}

impl TimeSeries<2> {
    /// Append a two-value entry sharing one label.
    pub fn append_paired(&mut self, label: impl Into<String>, first: f64, second: f64) {
        self.push(label, [first, second]);
    }

    pub fn first(&self) -> &VecDeque<f64> {
        &self.values[0]
    }

    pub fn second(&self) -> &VecDeque<f64> {
        &self.values[1]
    }
}

/// Names of the chart series tracked by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesName {
    Cpu,
    Memory,
    Network,
}

/// The set of chart series owned by the dashboard.
#[derive(Debug, Clone, Default)]
pub struct Charts {
    /// CPU usage percent.
    pub cpu: SingleSeries,
    /// Virtual memory usage percent.
    pub memory: SingleSeries,
    /// Upload (first) and download (second) in KB/s.
    pub network: PairedSeries,
}

impl Charts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear one named series.
    pub fn reset(&mut self, name: SeriesName) {
        match name {
            SeriesName::Cpu => self.cpu.reset(),
            SeriesName::Memory => self.memory.reset(),
            SeriesName::Network => self.network.reset(),
        }
    }

    /// Clear every series.
    pub fn reset_all(&mut self) {
        self.cpu.reset();
        self.memory.reset();
        self.network.reset();
    }

    pub fn len(&self, name: SeriesName) -> usize {
        match name {
            SeriesName::Cpu => self.cpu.len(),
            SeriesName::Memory => self.memory.len(),
            SeriesName::Network => self.network.len(),
        }
    }
}
