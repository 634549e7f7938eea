use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::SystemTime;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Running,
    Sleeping,
    Stopped,
    Zombie,
    Unknown,
}

impl ProcessStatus {
    pub fn label(self) -> &'static str {
        match self {
            ProcessStatus::Running => "running",
            ProcessStatus::Sleeping => "sleeping",
            ProcessStatus::Stopped => "stopped",
            ProcessStatus::Zombie => "zombie",
            ProcessStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One per-process read as it comes off the metrics source. Fields the
/// source could not resolve are `None`; a read missing its name, CPU time
/// or memory belongs to a process that exited while it was being read.
#[derive(Debug, Clone, Default)]
pub struct RawProcess {
    pub pid: u32,
    /// Seconds since the epoch; distinguishes a reused pid from its predecessor.
    pub start_time: u64,
    pub name: Option<String>,
    pub owner_user: Option<String>,
    pub status: Option<ProcessStatus>,
    /// Cumulative CPU time in milliseconds.
    pub cpu_time_ms: Option<u64>,
    pub memory_bytes: Option<u64>,
    pub command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    pub owner_user: String,
    pub status: ProcessStatus,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub memory_bytes: u64,
    pub command_line: String,
}

/// The process table of a single tick. Never mutated once built.
#[derive(Debug, Clone)]
pub struct ProcessSnapshot {
    pub timestamp: SystemTime,
    records: BTreeMap<u32, ProcessRecord>,
}

impl ProcessSnapshot {
    pub fn empty(timestamp: SystemTime) -> Self {
        Self {
            timestamp,
            records: BTreeMap::new(),
        }
    }

    /// Builds a snapshot from records; on duplicate pids the first one wins.
    pub fn from_records(
        timestamp: SystemTime,
        records: impl IntoIterator<Item = ProcessRecord>,
    ) -> Self {
        let mut by_pid = BTreeMap::new();
        for record in records {
            by_pid.entry(record.pid).or_insert(record);
        }
        Self {
            timestamp,
            records: by_pid,
        }
    }

    pub fn get(&self, pid: u32) -> Option<&ProcessRecord> {
        self.records.get(&pid)
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.records.contains_key(&pid)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in ascending pid order.
    pub fn iter(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.records.values()
    }
}

#[derive(Debug, Clone, Copy)]
struct CpuBaseline {
    start_time: u64,
    cpu_time_ms: u64,
    at: SystemTime,
}

/// Turns raw per-process reads into a [`ProcessSnapshot`], keeping the
/// per-pid CPU baselines needed for delta-based CPU percentages.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    baselines: HashMap<u32, CpuBaseline>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(
        &mut self,
        reads: Vec<RawProcess>,
        timestamp: SystemTime,
        memory_total: u64,
    ) -> ProcessSnapshot {
        let _span = tracing::debug_span!("snapshot.build", reads = reads.len()).entered();

        let mut next_baselines = HashMap::with_capacity(reads.len());
        let mut records = BTreeMap::new();
        let mut vanished = 0usize;

        for raw in reads {
            if records.contains_key(&raw.pid) {
                continue;
            }
            let (Some(name), Some(cpu_time_ms), Some(memory_bytes)) =
                (raw.name, raw.cpu_time_ms, raw.memory_bytes)
            else {
                tracing::trace!(pid = raw.pid, "process vanished during read");
                vanished += 1;
                continue;
            };

            // Only a pid seen in the previous build with the same start time
            // continues its baseline; anything else starts from zero.
            let cpu_percent = match self.baselines.get(&raw.pid) {
                Some(prev) if prev.start_time == raw.start_time => {
                    cpu_delta_percent(prev, cpu_time_ms, timestamp)
                }
                _ => 0.0,
            };
            next_baselines.insert(
                raw.pid,
                CpuBaseline {
                    start_time: raw.start_time,
                    cpu_time_ms,
                    at: timestamp,
                },
            );

            let command_line = if raw.command.is_empty() {
                name.clone()
            } else {
                raw.command.join(" ")
            };

            records.insert(
                raw.pid,
                ProcessRecord {
                    pid: raw.pid,
                    name,
                    owner_user: raw.owner_user.unwrap_or_else(|| "?".to_string()),
                    status: raw.status.unwrap_or(ProcessStatus::Unknown),
                    cpu_percent,
                    memory_percent: percent_of(memory_bytes, memory_total),
                    memory_bytes,
                    command_line,
                },
            );
        }

        if vanished > 0 {
            tracing::debug!(vanished, "skipped processes that exited mid-read");
        }

        self.baselines = next_baselines;
        ProcessSnapshot { timestamp, records }
    }
}

fn cpu_delta_percent(prev: &CpuBaseline, cpu_time_ms: u64, now: SystemTime) -> f32 {
    let Ok(elapsed) = now.duration_since(prev.at) else {
        return 0.0;
    };
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    if elapsed_ms <= 0.0 || cpu_time_ms < prev.cpu_time_ms {
        return 0.0;
    }
    ((cpu_time_ms - prev.cpu_time_ms) as f64 / elapsed_ms * 100.0) as f32
}

pub(crate) fn percent_of(part: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    ((part as f64 / total as f64) * 100.0).clamp(0.0, 100.0) as f32
}
