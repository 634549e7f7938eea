use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::RefreshInterval;
use crate::system::history::{HistoryBuffer, Metric};
use crate::system::process::SnapshotBuilder;
use crate::system::sampler::{Sampler, SamplerError};
use crate::system::snapshot::TickState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Sampler, history and snapshot builder: the state one tick mutates.
pub struct Engine {
    sampler: Sampler,
    history: HistoryBuffer,
    builder: SnapshotBuilder,
    sequence: u64,
}

impl Engine {
    pub fn new(sampler: Sampler, history_capacity: usize) -> Self {
        Self {
            sampler,
            history: HistoryBuffer::new(history_capacity),
            builder: SnapshotBuilder::new(),
            sequence: 0,
        }
    }

    /// Runs one sampling pass. Process or session fields that could not be
    /// read are carried over from `previous`.
    pub fn tick(&mut self, now: SystemTime, previous: &TickState) -> Result<TickState, SamplerError> {
        let _span = tracing::debug_span!("scheduler.tick", sequence = self.sequence + 1).entered();

        let out = self.sampler.sample(now)?;

        let mut points = vec![
            (Metric::Cpu, out.sample.cpu_percent as f64),
            (Metric::Memory, out.sample.memory_percent as f64),
        ];
        if let Some(mhz) = out.sample.cpu_frequency_mhz {
            points.push((Metric::CpuFrequency, mhz as f64));
        }
        for (metric, value) in points {
            if let Err(err) = self.history.record(metric, value, now) {
                tracing::warn!(%err, "history point dropped");
            }
        }

        let snapshot = match out.processes {
            Some(reads) => Arc::new(self.builder.build(reads, now, out.sample.memory_total_bytes)),
            None => Arc::clone(&previous.snapshot),
        };
        let sessions = match out.sessions {
            Some(sessions) => Arc::from(sessions),
            None => Arc::clone(&previous.sessions),
        };

        self.sequence += 1;
        tracing::debug!(
            sequence = self.sequence,
            processes = snapshot.len(),
            cpu = out.sample.cpu_percent,
            memory = out.sample.memory_percent,
            "tick complete"
        );

        Ok(TickState {
            sequence: self.sequence,
            sample: out.sample,
            host: out.host,
            snapshot,
            sessions,
            history: self.history.snapshot(),
        })
    }
}

/// Wall-clock timestamps derived from tokio's monotonic clock, so they never
/// go backwards and follow a paused test clock.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TickClock {
    wall_origin: SystemTime,
    mono_origin: Instant,
}

impl TickClock {
    pub(crate) fn start() -> Self {
        Self {
            wall_origin: SystemTime::now(),
            mono_origin: Instant::now(),
        }
    }

    pub(crate) fn wall_origin(&self) -> SystemTime {
        self.wall_origin
    }

    pub(crate) fn now(&self) -> SystemTime {
        self.wall_origin + self.mono_origin.elapsed()
    }
}

/// Deadline of the tick after one that started at `started`. A tick that
/// overran its interval makes the next one due immediately, never twice.
pub(crate) fn next_deadline(started: Instant, interval: Duration, now: Instant) -> Instant {
    let due = started + interval;
    if due < now { now } else { due }
}

pub(crate) struct TickLoop {
    pub engine: Engine,
    pub clock: TickClock,
    pub published: watch::Sender<Arc<TickState>>,
    pub interval: watch::Receiver<RefreshInterval>,
    pub state: watch::Sender<SchedulerState>,
    pub shutdown: watch::Receiver<bool>,
}

impl TickLoop {
    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let TickLoop {
            engine,
            clock,
            published,
            mut interval,
            state,
            mut shutdown,
        } = self;
        let engine = Arc::new(Mutex::new(engine));
        let mut next_tick = Instant::now();

        loop {
            tokio::select! {
                biased;
                // Only ever flipped to true; a dropped sender also stops us.
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep_until(next_tick) => {}
            }

            let started = Instant::now();
            let period = interval.borrow_and_update().as_duration();
            state.send_replace(SchedulerState::Running);

            let now = clock.now();
            let previous = published.borrow().clone();
            let worker = Arc::clone(&engine);
            let result = tokio::task::spawn_blocking(move || {
                // A panic in an earlier tick leaves the lock poisoned; the
                // engine itself is still usable.
                let mut engine = worker.lock().unwrap_or_else(PoisonError::into_inner);
                engine.tick(now, &previous)
            })
            .await;

            match result {
                Ok(Ok(tick)) => {
                    published.send_replace(Arc::new(tick));
                }
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "tick skipped");
                }
                Err(err) => {
                    tracing::error!(error = %err, "tick task failed");
                }
            }

            let finished = Instant::now();
            next_tick = next_deadline(started, period, finished);
            if next_tick == finished {
                tracing::debug!(
                    elapsed_ms = (finished - started).as_millis() as u64,
                    "tick overran its interval"
                );
            }
            state.send_replace(SchedulerState::Idle);
        }

        state.send_replace(SchedulerState::Stopped);
        tracing::info!("scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_is_measured_from_tick_start() {
        let start = Instant::now();
        let interval = Duration::from_secs(5);
        let now = start + Duration::from_millis(300);
        assert_eq!(next_deadline(start, interval, now), start + interval);
    }

    #[test]
    fn overrun_tick_is_due_immediately() {
        let start = Instant::now();
        let now = start + Duration::from_secs(7);
        assert_eq!(next_deadline(start, Duration::from_secs(5), now), now);
    }

    #[tokio::test(start_paused = true)]
    async fn clock_follows_paused_time() {
        let clock = TickClock::start();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(
            clock.now().duration_since(clock.wall_origin()).unwrap(),
            Duration::from_secs(5)
        );
    }
}
