use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::sampler::SamplerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRecord {
    pub user: String,
    pub terminal: String,
    pub login_time: String,
    pub idle_time: String,
    pub from_host: Option<String>,
    pub command: Option<String>,
}

/// Enumerates logged-in user sessions.
pub trait SessionSource: Send {
    fn sessions(&mut self) -> Result<Vec<SessionRecord>, SamplerError>;
}

/// Session source that reports nobody logged in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSessions;

impl SessionSource for NoSessions {
    fn sessions(&mut self) -> Result<Vec<SessionRecord>, SamplerError> {
        Ok(Vec::new())
    }
}

/// Runs `w -h` (or a compatible command) and parses its columns:
/// `USER TTY FROM LOGIN@ IDLE JCPU PCPU WHAT`.
#[derive(Debug, Clone)]
pub struct CommandSessionSource {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

impl Default for CommandSessionSource {
    fn default() -> Self {
        Self::new("w", ["-h"])
    }
}

impl CommandSessionSource {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// A command still running after `timeout` is killed and the tick goes
    /// without sessions.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn run(&self) -> Result<String, SamplerError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SamplerError::unavailable("sessions", e))?;

        // Drain stdout while waiting so a full pipe cannot stall the child.
        let reader = child.stdout.take().map(|mut stdout| {
            thread::spawn(move || {
                let mut out = Vec::new();
                let _ = stdout.read_to_end(&mut out);
                out
            })
        });

        let start = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if start.elapsed() < self.timeout => {
                    thread::sleep(Duration::from_millis(10));
                }
                Ok(None) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(SamplerError::unavailable(
                        "sessions",
                        format!("`{}` timed out after {:?}", self.program, self.timeout),
                    ));
                }
                Err(err) => {
                    let _ = child.kill();
                    return Err(SamplerError::unavailable("sessions", err));
                }
            }
        };

        if !status.success() {
            return Err(SamplerError::unavailable(
                "sessions",
                format!("`{}` exited with {}", self.program, status),
            ));
        }
        let out = reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

impl SessionSource for CommandSessionSource {
    fn sessions(&mut self) -> Result<Vec<SessionRecord>, SamplerError> {
        Ok(parse_w_output(&self.run()?))
    }
}

pub fn parse_w_output(output: &str) -> Vec<SessionRecord> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 5 {
                return None;
            }
            let command = match parts.len() {
                n if n > 7 => Some(parts[7..].join(" ")),
                7 => Some(parts[6].to_string()),
                _ => None,
            };
            let from_host = match parts[2] {
                "-" | "" => None,
                host => Some(host.to_string()),
            };
            Some(SessionRecord {
                user: parts[0].to_string(),
                terminal: parts[1].to_string(),
                from_host,
                login_time: parts[3].to_string(),
                idle_time: parts[4].to_string(),
                command,
            })
        })
        .collect()
}
