use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::time::SystemTime;

use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_CAPACITY: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cpu,
    Memory,
    CpuFrequency,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Cpu, Metric::Memory, Metric::CpuFrequency];

    pub fn name(self) -> &'static str {
        match self {
            Metric::Cpu => "cpu",
            Metric::Memory => "memory",
            Metric::CpuFrequency => "cpu_frequency",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Metric::ALL.into_iter().find(|m| m.name() == name)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("unknown history series `{0}`")]
    UnknownSeries(String),

    #[error("sample for series `{series}` is older than its newest entry")]
    OutOfOrder { series: Metric },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub timestamp: SystemTime,
    pub value: f64,
}

/// Fixed-capacity rolling series; the oldest point is evicted first.
#[derive(Debug, Clone)]
pub struct HistorySeries {
    points: VecDeque<HistoryPoint>,
    capacity: usize,
}

impl HistorySeries {
    fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, point: HistoryPoint) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    fn newest(&self) -> Option<&HistoryPoint> {
        self.points.back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryPoint> {
        self.points.iter()
    }
}

#[derive(Debug)]
pub struct HistoryBuffer {
    series: BTreeMap<Metric, HistorySeries>,
    capacity: usize,
}

impl HistoryBuffer {
    /// A capacity of zero is bumped to one so every series keeps its newest point.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let series = Metric::ALL
            .into_iter()
            .map(|m| (m, HistorySeries::new(capacity)))
            .collect();
        Self { series, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn append(
        &mut self,
        metric_name: &str,
        value: f64,
        timestamp: SystemTime,
    ) -> Result<(), HistoryError> {
        let metric = Metric::from_name(metric_name)
            .ok_or_else(|| HistoryError::UnknownSeries(metric_name.to_string()))?;
        self.record(metric, value, timestamp)
    }

    pub fn record(
        &mut self,
        metric: Metric,
        value: f64,
        timestamp: SystemTime,
    ) -> Result<(), HistoryError> {
        let series = self
            .series
            .get_mut(&metric)
            .ok_or_else(|| HistoryError::UnknownSeries(metric.name().to_string()))?;
        if series.newest().is_some_and(|p| p.timestamp > timestamp) {
            return Err(HistoryError::OutOfOrder { series: metric });
        }
        series.push(HistoryPoint { timestamp, value });
        Ok(())
    }

    pub fn series(&self, metric_name: &str) -> Result<Vec<HistoryPoint>, HistoryError> {
        Metric::from_name(metric_name)
            .and_then(|m| self.series.get(&m))
            .map(|s| s.iter().copied().collect())
            .ok_or_else(|| HistoryError::UnknownSeries(metric_name.to_string()))
    }

    pub fn get(&self, metric: Metric) -> Option<&HistorySeries> {
        self.series.get(&metric)
    }

    /// Immutable copy of every series, for publication alongside a tick.
    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            series: self
                .series
                .iter()
                .map(|(m, s)| (*m, s.iter().copied().collect()))
                .collect(),
        }
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HistorySnapshot {
    series: BTreeMap<Metric, Vec<HistoryPoint>>,
}

impl HistorySnapshot {
    pub fn series(&self, metric_name: &str) -> Result<&[HistoryPoint], HistoryError> {
        Metric::from_name(metric_name)
            .and_then(|m| self.series.get(&m))
            .map(Vec::as_slice)
            .ok_or_else(|| HistoryError::UnknownSeries(metric_name.to_string()))
    }

    pub fn get(&self, metric: Metric) -> &[HistoryPoint] {
        self.series.get(&metric).map(Vec::as_slice).unwrap_or(&[])
    }
}
