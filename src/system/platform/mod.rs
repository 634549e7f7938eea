use std::io;

/// Cumulative CPU time counters, in whatever unit the platform reports.
/// Only differences between two reads are meaningful.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CpuCounters {
    pub busy: u64,
    pub total: u64,
}

#[derive(Debug)]
pub enum SignalFailure {
    PermissionDenied,
    NoSuchProcess,
    Other(io::Error),
}

pub trait PlatformExtensions {
    /// System-wide CPU counters, or `None` when the platform does not expose
    /// raw counters.
    fn cpu_counters() -> Option<CpuCounters>;
    /// Rated maximum clock of the first CPU, in MHz.
    fn cpu_max_frequency_mhz() -> Option<u64>;
    fn send_signal(pid: u32, force: bool) -> Result<(), SignalFailure>;
}

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(unix)]
mod unix;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
use linux as platform_impl;
#[cfg(target_os = "macos")]
use macos as platform_impl;
#[cfg(target_os = "windows")]
use windows as platform_impl;

pub fn cpu_counters() -> Option<CpuCounters> {
    platform_impl::Platform::cpu_counters()
}

pub fn cpu_max_frequency_mhz() -> Option<u64> {
    platform_impl::Platform::cpu_max_frequency_mhz()
}

pub fn send_signal(pid: u32, force: bool) -> Result<(), SignalFailure> {
    platform_impl::Platform::send_signal(pid, force)
}
