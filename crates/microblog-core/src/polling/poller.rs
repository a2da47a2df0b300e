use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::VisibilityMonitor;
use crate::constants::MIN_POLL_INTERVAL_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub enabled: bool,
    /// Drop the timer while the surface is hidden
    pub pause_when_hidden: bool,
    /// Fire once right away on every activation
    pub immediate: bool,
}

impl PollerConfig {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            enabled: true,
            pause_when_hidden: true,
            immediate: false,
        }
    }

    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    pub fn pause_when_hidden(mut self, pause: bool) -> Self {
        self.pause_when_hidden = pause;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Runs a callback on a fixed interval while enabled and (optionally) visible.
///
/// Each invocation runs in its own task and is never awaited by the
/// scheduler, so a slow callback can overlap the next tick. Errors are
/// logged and swallowed, and a panicking callback only loses its own task.
/// Intervals below one second are raised to one second. Dropping the handle
/// stops the schedule.
pub struct Poller {
    enabled: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Poller {
    pub fn spawn<F, Fut>(
        mut config: PollerConfig,
        visibility: &VisibilityMonitor,
        callback: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let floor = Duration::from_millis(MIN_POLL_INTERVAL_MS);
        if config.interval < floor {
            tracing::warn!(
                "Poll interval {:?} is too short, using {:?}",
                config.interval,
                floor
            );
            config.interval = floor;
        }

        let (enabled, enabled_rx) = watch::channel(config.enabled);
        let task = tokio::spawn(run_schedule(
            config,
            enabled_rx,
            visibility.subscribe(),
            Arc::new(callback),
        ));
        Self { enabled, task }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.send_if_modified(|current| {
            if *current == enabled {
                false
            } else {
                *current = enabled;
                true
            }
        });
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    /// Cancel the schedule. Invocations already running are left to finish.
    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn is_active(
    config: &PollerConfig,
    enabled: &watch::Receiver<bool>,
    visible: &watch::Receiver<bool>,
) -> bool {
    *enabled.borrow() && (!config.pause_when_hidden || *visible.borrow())
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn fire<F, Fut>(callback: &Arc<F>)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let callback = Arc::clone(callback);
    tokio::spawn(async move {
        if let Err(err) = callback().await {
            tracing::error!("Error in polling callback: {:#}", err);
        }
    });
}

async fn run_schedule<F, Fut>(
    config: PollerConfig,
    mut enabled_rx: watch::Receiver<bool>,
    mut visible_rx: watch::Receiver<bool>,
    callback: Arc<F>,
) where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    // A closed channel keeps its last value
    let mut enabled_open = true;
    let mut visible_open = true;

    loop {
        let active = is_active(&config, &enabled_rx, &visible_rx);
        let mut ticker = if active {
            if config.immediate {
                fire(&callback);
            }
            let start = Instant::now() + config.interval;
            let mut ticker = tokio::time::interval_at(start, config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Some(ticker)
        } else {
            None
        };
        tracing::debug!("Poller {}", if active { "active" } else { "paused" });

        loop {
            tokio::select! {
                _ = next_tick(&mut ticker) => fire(&callback),
                changed = enabled_rx.changed(), if enabled_open => {
                    if changed.is_err() {
                        enabled_open = false;
                    }
                }
                changed = visible_rx.changed(), if visible_open => {
                    if changed.is_err() {
                        visible_open = false;
                    }
                }
            }
            if is_active(&config, &enabled_rx, &visible_rx) != active {
                break;
            }
        }
    }
}
