use std::io;

use super::SignalFailure;

pub(super) fn send_signal(pid: u32, force: bool) -> Result<(), SignalFailure> {
    // kill(0) and kill(-1) address process groups, never a single pid.
    let raw = match libc::pid_t::try_from(pid) {
        Ok(raw) if raw > 0 => raw,
        _ => return Err(SignalFailure::NoSuchProcess),
    };
    let signal = if force { libc::SIGKILL } else { libc::SIGTERM };

    // SAFETY: kill(2) takes plain integers and touches no memory of ours.
    let rc = unsafe { libc::kill(raw, signal) };
    if rc == 0 {
        return Ok(());
    }
    Err(classify(io::Error::last_os_error()))
}

fn classify(err: io::Error) -> SignalFailure {
    match err.raw_os_error() {
        Some(libc::ESRCH) => SignalFailure::NoSuchProcess,
        Some(libc::EPERM) => SignalFailure::PermissionDenied,
        _ => SignalFailure::Other(err),
    }
}
