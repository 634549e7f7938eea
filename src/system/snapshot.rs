use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;

use super::history::HistorySnapshot;
use super::process::ProcessSnapshot;
use super::session::SessionRecord;

/// System-wide aggregates for one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    pub timestamp: SystemTime,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    pub memory_available_bytes: u64,
    pub swap_used_bytes: u64,
    pub swap_total_bytes: u64,
    pub cpu_frequency_mhz: Option<u64>,
}

impl MetricSample {
    pub fn empty(timestamp: SystemTime) -> Self {
        Self {
            timestamp,
            cpu_percent: 0.0,
            memory_percent: 0.0,
            memory_used_bytes: 0,
            memory_total_bytes: 0,
            memory_available_bytes: 0,
            swap_used_bytes: 0,
            swap_total_bytes: 0,
            cpu_frequency_mhz: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HostInfo {
    pub hostname: Option<String>,
    pub kernel_version: Option<String>,
    pub uptime_secs: u64,
    pub load_average: [f64; 3],
    pub cpu_model: String,
    pub logical_cores: usize,
    pub physical_cores: Option<usize>,
    pub cpu_max_frequency_mhz: Option<u64>,
}

/// Everything published by one tick. Readers hold it behind an `Arc`, so a
/// value they obtained is never modified afterwards.
#[derive(Debug, Clone)]
pub struct TickState {
    /// 0 before the first tick has completed.
    pub sequence: u64,
    pub sample: MetricSample,
    pub host: HostInfo,
    pub snapshot: Arc<ProcessSnapshot>,
    pub sessions: Arc<[SessionRecord]>,
    pub history: HistorySnapshot,
}

impl TickState {
    pub fn initial(timestamp: SystemTime) -> Self {
        Self {
            sequence: 0,
            sample: MetricSample::empty(timestamp),
            host: HostInfo::default(),
            snapshot: Arc::new(ProcessSnapshot::empty(timestamp)),
            sessions: Arc::from(Vec::new()),
            history: HistorySnapshot::default(),
        }
    }
}
