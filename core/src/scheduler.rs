// Refresh scheduler
//
// A single repeating timer. Each tick triggers `refresh_widget` for every
// eligible widget in its own task; slow or failing widgets never hold up the
// others, and a tick never fails as a whole.

use crate::store::{RefreshOutcome, WidgetStore};
use crate::widget::WidgetId;
use crate::{GridwatchError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Which widgets a tick refreshes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshCadence {
    /// Every idle widget on every tick; per-widget intervals are advisory
    #[default]
    GlobalTick,
    /// Only widgets whose own refresh interval has elapsed
    PerWidget,
}

/// Scheduler configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    pub cadence: RefreshCadence,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let per_widget = std::env::var("GRIDWATCH_PER_WIDGET_CADENCE")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            tick_interval: Duration::from_secs(
                std::env::var("GRIDWATCH_TICK_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .filter(|v| *v > 0)
                    .unwrap_or(30),
            ),
            cadence: if per_widget {
                RefreshCadence::PerWidget
            } else {
                RefreshCadence::GlobalTick
            },
        }
    }
}

/// Summary of one completed tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Widgets a refresh was started for, in grid order
    pub triggered: Vec<WidgetId>,
    pub succeeded: usize,
    pub failed: usize,
    /// Refreshes that found the widget busy or gone
    pub skipped: usize,
}

#[derive(Clone)]
struct TickContext {
    store: WidgetStore,
    cadence: RefreshCadence,
}

impl TickContext {
    async fn dispatch(&self) -> (Vec<WidgetId>, JoinSet<RefreshOutcome>) {
        let now = self.store.clock().now();
        let ids = self.store.refresh_candidates(now, self.cadence).await;

        let mut set = JoinSet::new();
        for id in &ids {
            let store = self.store.clone();
            let id = *id;
            set.spawn(async move { store.refresh_widget(id).await });
        }

        debug!(target: "scheduler", triggered = ids.len(), "Tick dispatched");
        (ids, set)
    }
}

struct Running {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Periodic driver for widget refreshes
pub struct RefreshScheduler {
    ctx: TickContext,
    tick_interval: Duration,
    running: Option<Running>,
}

impl RefreshScheduler {
    pub fn new(store: WidgetStore, config: SchedulerConfig) -> Self {
        Self {
            ctx: TickContext {
                store,
                cadence: config.cadence,
            },
            tick_interval: config.tick_interval,
            running: None,
        }
    }

    pub fn cadence(&self) -> RefreshCadence {
        self.ctx.cadence
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// True while the timer loop is alive
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Run one tick now and wait for every refresh it started
    pub async fn tick(&self) -> TickReport {
        let (triggered, mut set) = self.ctx.dispatch().await;
        let mut report = TickReport {
            triggered,
            ..Default::default()
        };

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(RefreshOutcome::Succeeded) => report.succeeded += 1,
                Ok(RefreshOutcome::Failed(_)) => report.failed += 1,
                Ok(_) | Err(_) => report.skipped += 1,
            }
        }
        report
    }

    /// Start the timer loop. The first tick fires one interval after start.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(GridwatchError::Scheduler(
                "scheduler already running".to_string(),
            ));
        }
        if self.tick_interval.is_zero() {
            return Err(GridwatchError::Scheduler(
                "tick interval must be positive".to_string(),
            ));
        }

        let period = self.tick_interval;
        // The timer schedules up to two periods ahead of now
        let first_tick = Instant::now()
            .checked_add(period)
            .filter(|first| first.checked_add(period).is_some())
            .ok_or_else(|| {
                GridwatchError::Scheduler(format!(
                    "tick interval of {}s is too large",
                    period.as_secs()
                ))
            })?;
        let ctx = self.ctx.clone();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let (_, mut set) = ctx.dispatch().await;
                        // Refreshes outlive the tick; only the timeout bounds them
                        set.detach_all();
                    }
                    _ = &mut stop_rx => break,
                }
            }
            debug!(target: "scheduler", "Timer loop exited");
        });

        info!(
            target: "scheduler",
            tick_secs = period.as_secs_f64(),
            cadence = ?self.ctx.cadence,
            "Refresh scheduler started"
        );
        self.running = Some(Running { stop_tx, handle });
        Ok(())
    }

    /// Stop the timer loop. Refreshes already in flight run to completion.
    pub async fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.stop_tx.send(());
            match running.handle.await {
                Ok(()) => info!(target: "scheduler", "Refresh scheduler stopped"),
                Err(e) => error!(target: "scheduler", error = %e, "Timer loop ended abnormally"),
            }
        }
    }
}
