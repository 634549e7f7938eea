use super::{CpuCounters, PlatformExtensions, SignalFailure};

pub struct Platform;

impl PlatformExtensions for Platform {
    fn cpu_counters() -> Option<CpuCounters> {
        let contents = std::fs::read_to_string("/proc/stat").ok()?;
        parse_proc_stat(&contents)
    }

    fn cpu_max_frequency_mhz() -> Option<u64> {
        let contents =
            std::fs::read_to_string("/sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_max_freq").ok()?;
        parse_max_freq_khz(&contents)
    }

    fn send_signal(pid: u32, force: bool) -> Result<(), SignalFailure> {
        super::unix::send_signal(pid, force)
    }
}

/// Parse the aggregate `cpu` line of `/proc/stat`.
fn parse_proc_stat(contents: &str) -> Option<CpuCounters> {
    let line = contents.lines().find(|l| l.starts_with("cpu "))?;
    // user nice system idle iowait irq softirq steal guest guest_nice
    // guest time is already accounted in user/nice, so only the first 8 count.
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|f| f.parse().ok())
        .collect::<Option<_>>()?;
    if fields.len() < 4 {
        return None;
    }
    let total: u64 = fields.iter().sum();
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Some(CpuCounters {
        busy: total.saturating_sub(idle),
        total,
    })
}

/// `cpuinfo_max_freq` holds a single value in kHz.
fn parse_max_freq_khz(contents: &str) -> Option<u64> {
    let khz: u64 = contents.trim().parse().ok()?;
    (khz > 0).then_some(khz / 1000)
}
