use std::io;

use super::{CpuCounters, PlatformExtensions, SignalFailure};

pub struct Platform;

use windows_sys::Win32::{
    Foundation::{CloseHandle, ERROR_ACCESS_DENIED, ERROR_INVALID_PARAMETER, FILETIME},
    System::Threading::{GetSystemTimes, OpenProcess, PROCESS_TERMINATE, TerminateProcess},
};

fn filetime_to_u64(ft: &FILETIME) -> u64 {
    ((ft.dwHighDateTime as u64) << 32) | ft.dwLowDateTime as u64
}

fn classify(err: io::Error) -> SignalFailure {
    match err.raw_os_error().map(|code| code as u32) {
        Some(ERROR_ACCESS_DENIED) => SignalFailure::PermissionDenied,
        Some(ERROR_INVALID_PARAMETER) => SignalFailure::NoSuchProcess,
        _ => SignalFailure::Other(err),
    }
}

impl PlatformExtensions for Platform {
    fn cpu_counters() -> Option<CpuCounters> {
        unsafe {
            let mut idle = std::mem::zeroed::<FILETIME>();
            let mut kernel = std::mem::zeroed::<FILETIME>();
            let mut user = std::mem::zeroed::<FILETIME>();
            if GetSystemTimes(&mut idle, &mut kernel, &mut user) == 0 {
                return None;
            }
            // Kernel time includes idle time.
            let total = filetime_to_u64(&kernel) + filetime_to_u64(&user);
            Some(CpuCounters {
                busy: total.saturating_sub(filetime_to_u64(&idle)),
                total,
            })
        }
    }

    fn cpu_max_frequency_mhz() -> Option<u64> {
        None
    }

    fn send_signal(pid: u32, _force: bool) -> Result<(), SignalFailure> {
        // PID 0 is the System Idle process.
        if pid == 0 {
            return Err(SignalFailure::NoSuchProcess);
        }
        unsafe {
            let handle = OpenProcess(PROCESS_TERMINATE, 0, pid);
            if handle.is_null() {
                return Err(classify(io::Error::last_os_error()));
            }
            let ok = TerminateProcess(handle, 1);
            let err = (ok == 0).then(io::Error::last_os_error);
            CloseHandle(handle);
            match err {
                Some(err) => Err(classify(err)),
                None => Ok(()),
            }
        }
    }
}
