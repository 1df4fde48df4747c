use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::MIN_UPDATE_INTERVAL_SECS;

/// A unit of work the scheduler repeats on an interval.
#[async_trait]
pub trait Cycle: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Sleeping,
    ShuttingDown,
    Stopped,
}

/// Runs a [`Cycle`] back to back with a fixed pause in between.
///
/// Cycle failures are logged and the schedule carries on. The `stop` token
/// cuts the pause short and prevents further cycles but lets a running cycle
/// finish; the `abort` token drops the running cycle as well.
pub struct Scheduler {
    cycle: Arc<dyn Cycle>,
    interval: Duration,
    stop: CancellationToken,
    abort: CancellationToken,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    /// `interval` is raised to at least [`MIN_UPDATE_INTERVAL_SECS`].
    pub fn new(cycle: Arc<dyn Cycle>, interval: Duration, stop: CancellationToken) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            cycle,
            interval: interval.max(Duration::from_secs(MIN_UPDATE_INTERVAL_SECS)),
            stop,
            abort: CancellationToken::new(),
            state,
        }
    }

    pub fn with_abort(mut self, abort: CancellationToken) -> Self {
        self.abort = abort;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub async fn run(self) {
        let name = self.cycle.name().to_string();

        while !self.stop.is_cancelled() {
            self.state.send_replace(SchedulerState::Running);
            tracing::info!("Starting {} cycle", name);

            tokio::select! {
                biased;
                _ = self.abort.cancelled() => {
                    tracing::warn!("Abandoning in-flight {} cycle", name);
                    break;
                }
                result = self.cycle.run() => match result {
                    Ok(()) => tracing::info!("{} cycle completed", name),
                    Err(e) => tracing::error!("{} cycle failed: {:#}", name, e),
                },
            }

            if self.stop.is_cancelled() {
                break;
            }

            self.state.send_replace(SchedulerState::Sleeping);
            tracing::info!(
                "Sleeping {}s until next update...",
                self.interval.as_secs()
            );
            tokio::select! {
                _ = self.stop.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        self.state.send_replace(SchedulerState::ShuttingDown);
        tracing::info!("Shutting down gracefully");
        self.state.send_replace(SchedulerState::Stopped);
    }
}
