use super::{CpuCounters, PlatformExtensions, SignalFailure};

pub struct Platform;

impl PlatformExtensions for Platform {
    fn cpu_counters() -> Option<CpuCounters> {
        // host_statistics is not exposed through libc; the sampler falls back
        // to sysinfo's own utilisation figure.
        None
    }

    fn cpu_max_frequency_mhz() -> Option<u64> {
        None
    }

    fn send_signal(pid: u32, force: bool) -> Result<(), SignalFailure> {
        super::unix::send_signal(pid, force)
    }
}
