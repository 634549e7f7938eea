#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use sysvigil::config::RefreshInterval;
use sysvigil::system::process::{ProcessStatus, RawProcess};
use sysvigil::system::sampler::{MetricsSource, RawSystemRead, SamplerError};
use sysvigil::system::snapshot::HostInfo;
use sysvigil::MonitorOptions;

pub const GIB: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Default)]
struct FakeState {
    busy: u64,
    total: u64,
    processes: Vec<RawProcess>,
    failing_system_reads: usize,
    fail_processes: bool,
}

/// Scripted metrics source; clones share state so a test can change the
/// process table between ticks.
#[derive(Clone, Default)]
pub struct FakeSource {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSource {
    pub fn new(processes: Vec<RawProcess>) -> Self {
        let source = Self::default();
        source.set_processes(processes);
        source
    }

    pub fn set_processes(&self, processes: Vec<RawProcess>) {
        self.state.lock().unwrap().processes = processes;
    }

    pub fn fail_next_system_reads(&self, n: usize) {
        self.state.lock().unwrap().failing_system_reads = n;
    }

    pub fn fail_processes(&self, fail: bool) {
        self.state.lock().unwrap().fail_processes = fail;
    }
}

impl MetricsSource for FakeSource {
    fn read_system(&mut self) -> Result<RawSystemRead, SamplerError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_system_reads > 0 {
            state.failing_system_reads -= 1;
            return Err(SamplerError::unavailable("cpu", "simulated /proc/stat failure"));
        }
        // 25% busy between any two reads.
        state.busy += 25;
        state.total += 100;
        Ok(RawSystemRead {
            cpu_counters: Some(sysvigil::system::platform::CpuCounters {
                busy: state.busy,
                total: state.total,
            }),
            cpu_usage_hint: 0.0,
            cpu_frequency_mhz: Some(2400),
            memory_total: 8 * GIB,
            memory_used: 2 * GIB,
            memory_available: 6 * GIB,
            swap_total: 0,
            swap_used: 0,
        })
    }

    fn read_processes(&mut self) -> Result<Vec<RawProcess>, SamplerError> {
        let state = self.state.lock().unwrap();
        if state.fail_processes {
            return Err(SamplerError::unavailable("processes", "simulated EACCES"));
        }
        Ok(state.processes.clone())
    }

    fn host_info(&mut self) -> HostInfo {
        HostInfo {
            hostname: Some("testhost".to_string()),
            kernel_version: Some("6.1.0".to_string()),
            uptime_secs: 3_600,
            load_average: [0.5, 0.4, 0.3],
            cpu_model: "Test CPU".to_string(),
            logical_cores: 4,
            physical_cores: Some(2),
            cpu_max_frequency_mhz: Some(3600),
        }
    }
}

pub fn raw(pid: u32, name: &str, owner: &str) -> RawProcess {
    RawProcess {
        pid,
        start_time: 1_000,
        name: Some(name.to_string()),
        owner_user: Some(owner.to_string()),
        status: Some(ProcessStatus::Sleeping),
        cpu_time_ms: Some(0),
        memory_bytes: Some(64 * 1024 * 1024),
        command: vec![format!("/usr/bin/{name}")],
    }
}

pub fn options(interval: RefreshInterval) -> MonitorOptions {
    MonitorOptions {
        interval,
        history_capacity: 60,
        user: None,
        collect_sessions: false,
    }
}
