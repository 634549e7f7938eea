use thiserror::Error;

use super::platform::{self, SignalFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Signal {
    /// Polite request (SIGTERM, or TerminateProcess on Windows).
    #[default]
    Term,
    /// SIGKILL. Same as `Term` on Windows.
    Kill,
}

impl Signal {
    pub fn name(self) -> &'static str {
        match self {
            Signal::Term => "SIGTERM",
            Signal::Kill => "SIGKILL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Terminated {
    pub pid: u32,
    pub signal: Signal,
}

#[derive(Debug, Error)]
pub enum TerminateError {
    #[error("permission denied: cannot terminate PID {pid}")]
    PermissionDenied { pid: u32 },

    #[error("process {pid} no longer exists")]
    NotFound { pid: u32 },

    #[error("failed to terminate PID {pid}: {source}")]
    Other {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

impl TerminateError {
    pub fn pid(&self) -> u32 {
        match self {
            TerminateError::PermissionDenied { pid }
            | TerminateError::NotFound { pid }
            | TerminateError::Other { pid, .. } => *pid,
        }
    }

    fn from_failure(pid: u32, failure: SignalFailure) -> Self {
        match failure {
            SignalFailure::PermissionDenied => TerminateError::PermissionDenied { pid },
            SignalFailure::NoSuchProcess => TerminateError::NotFound { pid },
            SignalFailure::Other(source) => TerminateError::Other { pid, source },
        }
    }
}

pub fn terminate(pid: u32) -> Result<Terminated, TerminateError> {
    terminate_with(pid, Signal::Term)
}

pub fn terminate_with(pid: u32, signal: Signal) -> Result<Terminated, TerminateError> {
    let force = signal == Signal::Kill;
    match platform::send_signal(pid, force) {
        Ok(()) => {
            tracing::info!(pid, signal = signal.name(), "termination signal sent");
            Ok(Terminated { pid, signal })
        }
        Err(failure) => {
            let err = TerminateError::from_failure(pid, failure);
            tracing::warn!(pid, signal = signal.name(), error = %err, "termination failed");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_pids_are_not_found() {
        assert!(matches!(
            terminate(u32::MAX),
            Err(TerminateError::NotFound { pid: u32::MAX })
        ));
        assert!(matches!(terminate(0), Err(TerminateError::NotFound { pid: 0 })));
    }

    #[test]
    fn error_reports_its_pid() {
        let err = TerminateError::PermissionDenied { pid: 42 };
        assert_eq!(err.pid(), 42);
        assert_eq!(err.to_string(), "permission denied: cannot terminate PID 42");
    }

    #[test]
    fn platform_failures_map_to_error_kinds() {
        assert!(matches!(
            TerminateError::from_failure(7, SignalFailure::PermissionDenied),
            TerminateError::PermissionDenied { pid: 7 }
        ));
        assert!(matches!(
            TerminateError::from_failure(7, SignalFailure::NoSuchProcess),
            TerminateError::NotFound { pid: 7 }
        ));
        let err = TerminateError::from_failure(
            7,
            SignalFailure::Other(std::io::Error::other("device busy")),
        );
        assert!(matches!(err, TerminateError::Other { pid: 7, .. }));
        assert_eq!(err.to_string(), "failed to terminate PID 7: device busy");
    }

    #[test]
    fn signal_names() {
        assert_eq!(Signal::default(), Signal::Term);
        assert_eq!(Signal::Term.name(), "SIGTERM");
        assert_eq!(Signal::Kill.name(), "SIGKILL");
    }
}
