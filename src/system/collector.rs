use std::collections::HashSet;
use std::hash::Hash;

use sysinfo::{
    Pid, Process, ProcessRefreshKind, ProcessStatus as SysStatus, ProcessesToUpdate, System, Uid,
    UpdateKind, Users,
};

use super::platform;
use super::process::{ProcessStatus, RawProcess};
use super::sampler::{MetricsSource, RawSystemRead, SamplerError};
use super::snapshot::HostInfo;

/// [`MetricsSource`] backed by `sysinfo`, with raw CPU counters from the
/// platform layer where available.
pub struct SysinfoCollector {
    sys: System,
    users: Users,
    unresolved: UnresolvedIds<Uid>,
}

/// Ids still missing from the user table after a reload, e.g. container
/// uids with no passwd entry. Only ids outside this set trigger a reload.
#[derive(Debug)]
struct UnresolvedIds<T>(HashSet<T>);

impl<T> Default for UnresolvedIds<T> {
    fn default() -> Self {
        Self(HashSet::new())
    }
}

impl<T: Eq + Hash + Clone> UnresolvedIds<T> {
    fn unseen<'a>(&self, ids: impl IntoIterator<Item = &'a T>, known: impl Fn(&T) -> bool) -> Vec<T>
    where
        T: 'a,
    {
        let mut out: Vec<T> = Vec::new();
        for id in ids {
            if !known(id) && !self.0.contains(id) && !out.contains(id) {
                out.push(id.clone());
            }
        }
        out
    }

    fn remember(&mut self, ids: Vec<T>, known: impl Fn(&T) -> bool) {
        self.0.extend(ids.into_iter().filter(|id| !known(id)));
    }
}

impl Default for SysinfoCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn process_refresh_kind() -> ProcessRefreshKind {
    ProcessRefreshKind::nothing()
        .with_memory()
        .with_cpu()
        .with_user(UpdateKind::OnlyIfNotSet)
        .with_cmd(UpdateKind::OnlyIfNotSet)
}

impl SysinfoCollector {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_all();
        sys.refresh_processes_specifics(ProcessesToUpdate::All, true, process_refresh_kind());
        SysinfoCollector {
            sys,
            users: Users::new_with_refreshed_list(),
            unresolved: UnresolvedIds::default(),
        }
    }

    /// Name of the user running this monitor.
    pub fn current_user(&self) -> Option<String> {
        sysinfo::get_current_pid()
            .ok()
            .and_then(|pid| self.sys.process(pid))
            .and_then(|p| self.owner_name(p))
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("USERNAME").ok())
    }

    fn owner_name(&self, process: &Process) -> Option<String> {
        let uid = process.user_id()?;
        self.users
            .get_user_by_id(uid)
            .map(|user| user.name().to_string())
    }

    fn raw_process(&self, pid: Pid, process: &Process) -> RawProcess {
        let pid = pid.as_u32();
        // A process sysinfo could not update in this refresh has exited.
        if !process.exists() {
            return RawProcess {
                pid,
                ..RawProcess::default()
            };
        }
        RawProcess {
            pid,
            start_time: process.start_time(),
            name: Some(process.name().to_string_lossy().to_string()),
            owner_user: self.owner_name(process),
            status: Some(map_status(process.status())),
            cpu_time_ms: Some(process.accumulated_cpu_time()),
            memory_bytes: Some(process.memory()),
            command: process
                .cmd()
                .iter()
                .map(|s| s.to_string_lossy().to_string())
                .collect(),
        }
    }
}

fn map_status(status: SysStatus) -> ProcessStatus {
    match status {
        SysStatus::Run => ProcessStatus::Running,
        SysStatus::Sleep | SysStatus::Idle | SysStatus::UninterruptibleDiskSleep => {
            ProcessStatus::Sleeping
        }
        SysStatus::Stop | SysStatus::Tracing => ProcessStatus::Stopped,
        SysStatus::Zombie | SysStatus::Dead => ProcessStatus::Zombie,
        _ => ProcessStatus::Unknown,
    }
}

impl MetricsSource for SysinfoCollector {
    fn read_system(&mut self) -> Result<RawSystemRead, SamplerError> {
        self.sys.refresh_memory();
        self.sys.refresh_cpu_all();

        let memory_total = self.sys.total_memory();
        if memory_total == 0 {
            return Err(SamplerError::unavailable(
                "memory",
                "total memory reported as zero",
            ));
        }

        let cpus = self.sys.cpus();
        let cpu_frequency_mhz = if cpus.is_empty() {
            None
        } else {
            Some(cpus.iter().map(|c| c.frequency()).sum::<u64>() / cpus.len() as u64)
                .filter(|mhz| *mhz > 0)
        };

        Ok(RawSystemRead {
            cpu_counters: platform::cpu_counters(),
            cpu_usage_hint: self.sys.global_cpu_usage(),
            cpu_frequency_mhz,
            memory_total,
            memory_used: self.sys.used_memory(),
            memory_available: self.sys.available_memory(),
            swap_total: self.sys.total_swap(),
            swap_used: self.sys.used_swap(),
        })
    }

    fn read_processes(&mut self) -> Result<Vec<RawProcess>, SamplerError> {
        let refreshed = self.sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            process_refresh_kind(),
        );
        if refreshed == 0 && self.sys.processes().is_empty() {
            return Err(SamplerError::unavailable(
                "processes",
                "process table could not be enumerated",
            ));
        }

        // New logins show up as unknown uids; reload the user table once
        // per uid that has not already failed a lookup.
        let unseen = self.unresolved.unseen(
            self.sys.processes().values().filter_map(|p| p.user_id()),
            |uid| self.users.get_user_by_id(uid).is_some(),
        );
        if !unseen.is_empty() {
            self.users = Users::new_with_refreshed_list();
            let users = &self.users;
            self.unresolved
                .remember(unseen, |uid| users.get_user_by_id(uid).is_some());
        }

        Ok(self
            .sys
            .processes()
            .iter()
            .map(|(pid, process)| self.raw_process(*pid, process))
            .collect())
    }

    fn host_info(&mut self) -> HostInfo {
        let load = System::load_average();
        let cpus = self.sys.cpus();
        HostInfo {
            hostname: System::host_name(),
            kernel_version: System::kernel_version(),
            uptime_secs: System::uptime(),
            load_average: [load.one, load.five, load.fifteen],
            cpu_model: cpus
                .first()
                .map(|c| c.brand().trim().to_string())
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            logical_cores: cpus.len(),
            physical_cores: System::physical_core_count(),
            cpu_max_frequency_mhz: platform::cpu_max_frequency_mhz(),
        }
    }
}
