use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{Config, ConfigError, RefreshInterval};
use crate::query::{self, QuerySpec};
use crate::scheduler::{Engine, SchedulerState, TickClock, TickLoop};
use crate::system::collector::SysinfoCollector;
use crate::system::history::{HistoryError, HistoryPoint};
use crate::system::kill::{self, Signal, TerminateError, Terminated};
use crate::system::process::ProcessRecord;
use crate::system::sampler::{MetricsSource, Sampler};
use crate::system::session::{CommandSessionSource, NoSessions, SessionSource};
use crate::system::snapshot::TickState;

#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub interval: RefreshInterval,
    pub history_capacity: usize,
    /// Invoking user for the user/system split; detected when `None`.
    pub user: Option<String>,
    pub collect_sessions: bool,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl MonitorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.general.refresh_interval(),
            history_capacity: config.general.history_capacity,
            user: config.general.user.clone(),
            collect_sessions: config.general.collect_sessions,
        }
    }
}

/// Handle to a running sampling engine. Every read goes through the most
/// recently published [`TickState`] and never waits for a tick in progress.
pub struct Monitor {
    latest: watch::Receiver<Arc<TickState>>,
    interval: watch::Sender<RefreshInterval>,
    state: watch::Receiver<SchedulerState>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    user: String,
}

impl Monitor {
    /// Starts monitoring the local host. Must be called from within a tokio
    /// runtime.
    pub fn start(options: MonitorOptions) -> Self {
        let collector = SysinfoCollector::new();
        let user = options
            .user
            .clone()
            .or_else(|| collector.current_user())
            .unwrap_or_else(|| "unknown".to_string());
        let sessions: Box<dyn SessionSource> = if options.collect_sessions {
            Box::new(CommandSessionSource::default())
        } else {
            Box::new(NoSessions)
        };
        Self::with_sources(options, Box::new(collector), sessions, user)
    }

    /// Starts the engine over arbitrary sources. `options.user` is ignored in
    /// favour of `user`.
    pub fn with_sources(
        options: MonitorOptions,
        source: Box<dyn MetricsSource>,
        sessions: Box<dyn SessionSource>,
        user: impl Into<String>,
    ) -> Self {
        let user = user.into();
        let clock = TickClock::start();
        let engine = Engine::new(Sampler::new(source, sessions), options.history_capacity);

        let (published_tx, published_rx) =
            watch::channel(Arc::new(TickState::initial(clock.wall_origin())));
        let (interval_tx, interval_rx) = watch::channel(options.interval);
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = TickLoop {
            engine,
            clock,
            published: published_tx,
            interval: interval_rx,
            state: state_tx,
            shutdown: shutdown_rx,
        }
        .spawn();

        tracing::info!(
            user = %user,
            interval_secs = options.interval.secs(),
            history_capacity = options.history_capacity,
            "monitor started"
        );

        Self {
            latest: published_rx,
            interval: interval_tx,
            state: state_rx,
            shutdown: shutdown_tx,
            task: Some(task),
            user,
        }
    }

    pub fn latest(&self) -> Arc<TickState> {
        Arc::clone(&self.latest.borrow())
    }

    /// Receiver notified on every publication.
    pub fn subscribe(&self) -> watch::Receiver<Arc<TickState>> {
        self.latest.clone()
    }

    pub fn history(&self, metric_name: &str) -> Result<Vec<HistoryPoint>, HistoryError> {
        Ok(self.latest().history.series(metric_name)?.to_vec())
    }

    pub fn query(&self, spec: &QuerySpec) -> Vec<ProcessRecord> {
        query::query(&self.latest().snapshot, spec, &self.user)
    }

    pub fn partition(&self, spec: &QuerySpec) -> (Vec<ProcessRecord>, Vec<ProcessRecord>) {
        query::partition(&self.latest().snapshot, spec, &self.user)
    }

    pub fn invoking_user(&self) -> &str {
        &self.user
    }

    pub fn refresh_interval(&self) -> RefreshInterval {
        *self.interval.borrow()
    }

    /// Takes effect when the next tick starts; a wait in progress is not cut short.
    pub fn set_refresh_interval(&self, interval: RefreshInterval) {
        let previous = self.interval.send_replace(interval);
        if previous != interval {
            tracing::info!(
                from = previous.secs(),
                to = interval.secs(),
                "refresh interval changed"
            );
        }
    }

    pub fn set_refresh_interval_secs(&self, secs: u64) -> Result<(), ConfigError> {
        self.set_refresh_interval(RefreshInterval::try_from(secs)?);
        Ok(())
    }

    pub fn terminate_process(&self, pid: u32) -> Result<Terminated, TerminateError> {
        kill::terminate(pid)
    }

    pub fn terminate_process_with(
        &self,
        pid: u32,
        signal: Signal,
    ) -> Result<Terminated, TerminateError> {
        kill::terminate_with(pid, signal)
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Stops the tick loop and waits for it to finish.
    pub async fn shutdown(mut self) {
        self.shutdown.send_replace(true);
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            tracing::warn!(error = %err, "scheduler task ended abnormally");
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}
