//! Read-side projection over a published [`ProcessSnapshot`]: name filter,
//! user/system partition and column sort. Pure functions only.

use std::cmp::Ordering;

use crate::system::process::{ProcessRecord, ProcessSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    Pid,
    Name,
    User,
    Status,
    #[default]
    Cpu,
    Memory,
    Command,
}

impl SortColumn {
    pub const ALL: [SortColumn; 7] = [
        SortColumn::Pid,
        SortColumn::Name,
        SortColumn::User,
        SortColumn::Status,
        SortColumn::Cpu,
        SortColumn::Memory,
        SortColumn::Command,
    ];

    pub fn next(self) -> Self {
        match self {
            SortColumn::Pid => SortColumn::Name,
            SortColumn::Name => SortColumn::User,
            SortColumn::User => SortColumn::Status,
            SortColumn::Status => SortColumn::Cpu,
            SortColumn::Cpu => SortColumn::Memory,
            SortColumn::Memory => SortColumn::Command,
            SortColumn::Command => SortColumn::Pid,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortColumn::Pid => "PID",
            SortColumn::Name => "Name",
            SortColumn::User => "User",
            SortColumn::Status => "Status",
            SortColumn::Cpu => "CPU",
            SortColumn::Memory => "Memory",
            SortColumn::Command => "Command",
        }
    }

    /// Unknown names fall back to CPU.
    pub fn from_str_config(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pid" => SortColumn::Pid,
            "name" => SortColumn::Name,
            "user" | "owner" => SortColumn::User,
            "status" | "state" => SortColumn::Status,
            "memory" | "mem" => SortColumn::Memory,
            "command" | "cmd" => SortColumn::Command,
            _ => SortColumn::Cpu,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuerySpec {
    /// Case-insensitive substring of the process name; empty matches all.
    pub name_filter: String,
    pub include_system_processes: bool,
    pub sort_column: SortColumn,
    pub sort_ascending: bool,
}

/// A system process is one owned by anybody other than the invoking user
/// (root and service accounts included).
pub fn is_system_process(owner_user: &str, invoking_user: &str) -> bool {
    owner_user != invoking_user
}

pub fn name_matches(record: &ProcessRecord, filter_lower: &str) -> bool {
    filter_lower.is_empty() || record.name.to_lowercase().contains(filter_lower)
}

pub fn query(
    snapshot: &ProcessSnapshot,
    spec: &QuerySpec,
    invoking_user: &str,
) -> Vec<ProcessRecord> {
    let filter_lower = spec.name_filter.to_lowercase();
    let rows = snapshot.iter().filter(|r| {
        name_matches(r, &filter_lower)
            && (spec.include_system_processes || !is_system_process(&r.owner_user, invoking_user))
    });
    sorted(rows, spec)
}

/// The invoking user's processes and everyone else's, each filtered and
/// sorted by `spec`. The system half stays empty unless
/// `include_system_processes` is set.
pub fn partition(
    snapshot: &ProcessSnapshot,
    spec: &QuerySpec,
    invoking_user: &str,
) -> (Vec<ProcessRecord>, Vec<ProcessRecord>) {
    let filter_lower = spec.name_filter.to_lowercase();
    let (system, mine): (Vec<&ProcessRecord>, Vec<&ProcessRecord>) = snapshot
        .iter()
        .filter(|r| name_matches(r, &filter_lower))
        .partition(|r| is_system_process(&r.owner_user, invoking_user));

    let system = if spec.include_system_processes {
        sorted(system, spec)
    } else {
        Vec::new()
    };
    (sorted(mine, spec), system)
}

fn sorted<'a>(rows: impl IntoIterator<Item = &'a ProcessRecord>, spec: &QuerySpec) -> Vec<ProcessRecord> {
    let mut rows: Vec<&ProcessRecord> = rows.into_iter().collect();
    rows.sort_by(|a, b| compare(a, b, spec.sort_column, spec.sort_ascending));
    rows.into_iter().cloned().collect()
}

pub fn compare(a: &ProcessRecord, b: &ProcessRecord, column: SortColumn, ascending: bool) -> Ordering {
    let key = match column {
        SortColumn::Pid => a.pid.cmp(&b.pid),
        SortColumn::Name => cmp_caseless(&a.name, &b.name),
        SortColumn::User => cmp_caseless(&a.owner_user, &b.owner_user),
        SortColumn::Status => a.status.cmp(&b.status),
        SortColumn::Cpu => a.cpu_percent.total_cmp(&b.cpu_percent),
        SortColumn::Memory => a.memory_bytes.cmp(&b.memory_bytes),
        SortColumn::Command => cmp_caseless(&a.command_line, &b.command_line),
    };
    let key = if ascending { key } else { key.reverse() };
    // Ties always resolve by ascending pid, whatever the direction.
    key.then_with(|| a.pid.cmp(&b.pid))
}

fn cmp_caseless(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}
