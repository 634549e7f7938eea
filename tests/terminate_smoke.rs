use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use sysvigil::system::kill::{Signal, TerminateError, terminate, terminate_with};

fn spawn_long_lived_child() -> Child {
    #[cfg(windows)]
    let mut cmd = {
        let mut c = Command::new("powershell");
        c.args([
            "-NoProfile",
            "-NonInteractive",
            "-Command",
            "Start-Sleep -Seconds 30",
        ]);
        c
    };

    #[cfg(not(windows))]
    let mut cmd = {
        let mut c = Command::new("sleep");
        c.arg("30");
        c
    };

    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn child process")
}

fn wait_for_exit(child: &mut Child, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(50)),
            Ok(None) => {
                let _ = child.kill();
                panic!("child process did not exit before timeout");
            }
            Err(err) => {
                let _ = child.kill();
                panic!("failed waiting for child exit: {err}");
            }
        }
    }
}

#[test]
fn terminate_nonexistent_pid_returns_not_found() {
    let result = terminate(u32::MAX);
    assert!(matches!(result, Err(TerminateError::NotFound { pid: u32::MAX })));
}

#[test]
fn terminate_pid_zero_is_not_a_broadcast() {
    assert!(matches!(terminate(0), Err(TerminateError::NotFound { pid: 0 })));
}

#[test]
fn terminate_spawned_child() {
    let mut child = spawn_long_lived_child();
    let pid = child.id();

    match terminate(pid) {
        Ok(done) => {
            assert_eq!(done.pid, pid);
            assert_eq!(done.signal, Signal::Term);
        }
        Err(err) => {
            let _ = child.kill();
            panic!("terminate reported failure: {err}");
        }
    }
    wait_for_exit(&mut child, Duration::from_secs(5));
}

#[cfg(unix)]
#[test]
fn terminating_an_exited_process_twice_reports_not_found() {
    let mut child = spawn_long_lived_child();
    let pid = child.id();

    terminate_with(pid, Signal::Kill).expect("first terminate should succeed");
    wait_for_exit(&mut child, Duration::from_secs(5));
    drop(child);

    for _ in 0..2 {
        let err = terminate(pid).unwrap_err();
        assert!(matches!(err, TerminateError::NotFound { .. }), "{err}");
        assert_eq!(err.pid(), pid);
    }
}
