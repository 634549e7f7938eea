use std::fmt::Display;
use std::time::SystemTime;

use thiserror::Error;

use super::platform::CpuCounters;
use super::process::{RawProcess, percent_of};
use super::session::{SessionRecord, SessionSource};
use super::snapshot::{HostInfo, MetricSample};

#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("{what} unavailable: {reason}")]
    SourceUnavailable { what: &'static str, reason: String },
}

impl SamplerError {
    pub fn unavailable(what: &'static str, reason: impl Display) -> Self {
        SamplerError::SourceUnavailable {
            what,
            reason: reason.to_string(),
        }
    }
}

/// System-wide raw read. CPU utilisation is derived from the counters when
/// the platform has them, otherwise `cpu_usage_hint` is used as-is.
#[derive(Debug, Clone, Default)]
pub struct RawSystemRead {
    pub cpu_counters: Option<CpuCounters>,
    pub cpu_usage_hint: f32,
    pub cpu_frequency_mhz: Option<u64>,
    pub memory_total: u64,
    pub memory_used: u64,
    pub memory_available: u64,
    pub swap_total: u64,
    pub swap_used: u64,
}

/// The OS metrics source the sampler polls.
pub trait MetricsSource: Send {
    fn read_system(&mut self) -> Result<RawSystemRead, SamplerError>;
    fn read_processes(&mut self) -> Result<Vec<RawProcess>, SamplerError>;
    fn host_info(&mut self) -> HostInfo;
}

#[derive(Debug)]
pub struct SampleOutput {
    pub sample: MetricSample,
    pub host: HostInfo,
    /// `None` when the process list could not be read this tick.
    pub processes: Option<Vec<RawProcess>>,
    /// `None` when sessions could not be enumerated this tick.
    pub sessions: Option<Vec<SessionRecord>>,
}

pub struct Sampler {
    source: Box<dyn MetricsSource>,
    sessions: Box<dyn SessionSource>,
    prev_cpu: Option<CpuCounters>,
}

impl Sampler {
    pub fn new(source: Box<dyn MetricsSource>, sessions: Box<dyn SessionSource>) -> Self {
        Self {
            source,
            sessions,
            prev_cpu: None,
        }
    }

    /// Fails only when the system-wide read fails; process and session
    /// failures are reported as missing fields.
    pub fn sample(&mut self, now: SystemTime) -> Result<SampleOutput, SamplerError> {
        let _span = tracing::debug_span!("sampler.sample").entered();

        let system = self.source.read_system()?;
        let cpu_percent = self.cpu_percent(&system);
        let sample = MetricSample {
            timestamp: now,
            cpu_percent,
            memory_percent: percent_of(system.memory_used, system.memory_total),
            memory_used_bytes: system.memory_used,
            memory_total_bytes: system.memory_total,
            memory_available_bytes: system.memory_available,
            swap_used_bytes: system.swap_used,
            swap_total_bytes: system.swap_total,
            cpu_frequency_mhz: system.cpu_frequency_mhz,
        };
        let host = self.source.host_info();

        let processes = match self.source.read_processes() {
            Ok(processes) => Some(processes),
            Err(err) => {
                tracing::warn!(error = %err, "process list unavailable this tick");
                None
            }
        };
        let sessions = match self.sessions.sessions() {
            Ok(sessions) => Some(sessions),
            Err(err) => {
                tracing::debug!(error = %err, "sessions unavailable this tick");
                None
            }
        };

        Ok(SampleOutput {
            sample,
            host,
            processes,
            sessions,
        })
    }

    fn cpu_percent(&mut self, read: &RawSystemRead) -> f32 {
        let Some(current) = read.cpu_counters else {
            return read.cpu_usage_hint.clamp(0.0, 100.0);
        };
        let percent = match self.prev_cpu {
            // Counters that went backwards mean a reset; re-baseline.
            Some(prev) if current.total > prev.total && current.busy >= prev.busy => {
                let busy = (current.busy - prev.busy) as f64;
                let total = (current.total - prev.total) as f64;
                ((busy / total) * 100.0).clamp(0.0, 100.0) as f32
            }
            _ => 0.0,
        };
        self.prev_cpu = Some(current);
        percent
    }
}
