// Widget store
//
// Owns the ordered widget collection. Every mutation runs inside one write
// section of a tokio RwLock, so observers never see a half-applied change;
// the lock is never held across a network call.

use crate::clock::{Clock, SystemClock};
use crate::events::{EventBroadcaster, StoreEvent};
use crate::probe::{loggable_url, FetchError, Fetcher, ProbeResponse};
use crate::scheduler::RefreshCadence;
use crate::widget::{FetchStatus, Widget, WidgetConfig, WidgetId, WidgetKind};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

/// Result of a single `refresh_widget` call
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Fetch succeeded; `last_data` replaced
    Succeeded,
    /// Fetch failed; `last_error` replaced, `last_data` kept
    Failed(FetchError),
    /// A refresh for this widget was already outstanding; nothing fetched
    AlreadyInFlight,
    NotFound,
    /// Widget was removed while its fetch was in flight
    Discarded,
}

/// Header counters for the dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total: usize,
    pub cards: usize,
    pub tables: usize,
    pub charts: usize,
    pub loading: usize,
    pub failing: usize,
}

#[derive(Debug)]
struct StoreState {
    /// Kept sorted by position
    widgets: Vec<Widget>,
    next_id: u64,
}

impl StoreState {
    fn find_mut(&mut self, id: WidgetId) -> Option<&mut Widget> {
        self.widgets.iter_mut().find(|w| w.id == id)
    }
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            widgets: Vec::new(),
            next_id: 1,
        }
    }
}

/// Shared handle to the widget collection
#[derive(Clone)]
pub struct WidgetStore {
    state: Arc<RwLock<StoreState>>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    events: EventBroadcaster,
}

impl WidgetStore {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_clock(fetcher, Arc::new(SystemClock))
    }

    pub fn with_clock(fetcher: Arc<dyn Fetcher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            fetcher,
            clock,
            events: EventBroadcaster::default(),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Validate and insert a widget at the end of the grid
    pub async fn add_widget(&self, config: WidgetConfig) -> Result<WidgetId> {
        if let Err(e) = config.validate() {
            warn!(target: "store", name = %config.name, error = %e, "Rejected widget");
            return Err(e.into());
        }

        let mut state = self.state.write().await;
        let id = WidgetId::new(state.next_id);
        state.next_id += 1;

        let position = state
            .widgets
            .iter()
            .map(|w| w.position)
            .max()
            .map_or(0, |p| p + 1);

        let widget = Widget::from_config(config, id, position);
        info!(
            target: "store",
            id = %id,
            name = %widget.name,
            kind = %widget.kind,
            url = %loggable_url(&widget.api_url),
            position = position,
            "Added widget"
        );
        state.widgets.push(widget);
        self.events.broadcast(StoreEvent::WidgetAdded { id });

        Ok(id)
    }

    /// Remove a widget. Unknown ids are a no-op and return `false`.
    ///
    /// Surviving positions are not renumbered.
    pub async fn remove_widget(&self, id: WidgetId) -> bool {
        let mut state = self.state.write().await;
        let before = state.widgets.len();
        state.widgets.retain(|w| w.id != id);

        if state.widgets.len() == before {
            debug!(target: "store", id = %id, "Remove ignored: no such widget");
            return false;
        }

        info!(target: "store", id = %id, "Removed widget");
        self.events.broadcast(StoreEvent::WidgetRemoved { id });
        true
    }

    /// Move the widget at `from` to `to`, both indices into the
    /// sorted-by-position view, then renumber positions `0..n`.
    pub async fn reorder_widgets(&self, from: usize, to: usize) -> bool {
        let mut state = self.state.write().await;
        let len = state.widgets.len();
        if from == to || from >= len || to >= len {
            debug!(target: "store", from, to, len, "Reorder ignored");
            return false;
        }

        state.widgets.sort_by_key(|w| w.position);
        let moved = state.widgets.remove(from);
        state.widgets.insert(to, moved);
        for (index, widget) in state.widgets.iter_mut().enumerate() {
            widget.position = index as u64;
        }

        debug!(target: "store", from, to, "Reordered widgets");
        self.events.broadcast(StoreEvent::WidgetsReordered);
        true
    }

    /// Fetch fresh data for one widget.
    ///
    /// At most one refresh per widget is outstanding; a call made while one is
    /// in flight returns [`RefreshOutcome::AlreadyInFlight`] without fetching.
    /// The fetch runs in its own task, so dropping this future does not leave
    /// the widget stuck in the loading state.
    pub async fn refresh_widget(&self, id: WidgetId) -> RefreshOutcome {
        let url = {
            let mut state = self.state.write().await;
            let Some(widget) = state.find_mut(id) else {
                debug!(target: "store", id = %id, "Refresh ignored: no such widget");
                return RefreshOutcome::NotFound;
            };
            if widget.is_loading {
                debug!(target: "store", id = %id, "Refresh already in flight");
                return RefreshOutcome::AlreadyInFlight;
            }
            widget.is_loading = true;
            self.events.broadcast(StoreEvent::RefreshStarted { id });
            widget.api_url.clone()
        };

        let store = self.clone();
        let task = tokio::spawn(async move {
            let result = store.fetcher.fetch(&url).await;
            store.complete_refresh(id, result).await
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(target: "store", id = %id, error = %e, "Refresh task failed");
                let mut state = self.state.write().await;
                if let Some(widget) = state.find_mut(id) {
                    widget.is_loading = false;
                }
                RefreshOutcome::Discarded
            }
        }
    }

    async fn complete_refresh(
        &self,
        id: WidgetId,
        result: std::result::Result<ProbeResponse, FetchError>,
    ) -> RefreshOutcome {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let Some(widget) = state.find_mut(id) else {
            debug!(target: "store", id = %id, "Widget removed during refresh; result dropped");
            return RefreshOutcome::Discarded;
        };

        widget.is_loading = false;
        widget.last_fetched_at = Some(now);

        match result {
            Ok(response) => {
                debug!(
                    target: "store",
                    id = %id,
                    status = response.status,
                    elapsed_ms = response.elapsed.as_millis() as u64,
                    "Refresh succeeded"
                );
                widget.last_data = Some(response.data);
                widget.status = FetchStatus::Fresh;
                self.events
                    .broadcast(StoreEvent::RefreshFinished { id, success: true });
                RefreshOutcome::Succeeded
            }
            Err(e) => {
                warn!(target: "store", id = %id, kind = e.kind(), error = %e, "Refresh failed");
                widget.last_error = Some(e.clone());
                widget.status = FetchStatus::Failed;
                self.events
                    .broadcast(StoreEvent::RefreshFinished { id, success: false });
                RefreshOutcome::Failed(e)
            }
        }
    }

    pub async fn get(&self, id: WidgetId) -> Option<Widget> {
        let state = self.state.read().await;
        state.widgets.iter().find(|w| w.id == id).cloned()
    }

    /// All widgets ordered by position
    pub async fn snapshot(&self) -> Vec<Widget> {
        self.state.read().await.widgets.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.widgets.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.widgets.is_empty()
    }

    pub async fn stats(&self) -> DashboardStats {
        let state = self.state.read().await;
        let mut stats = DashboardStats {
            total: state.widgets.len(),
            ..Default::default()
        };
        for widget in &state.widgets {
            match widget.kind {
                WidgetKind::Card => stats.cards += 1,
                WidgetKind::Table => stats.tables += 1,
                WidgetKind::Chart => stats.charts += 1,
            }
            if widget.is_loading {
                stats.loading += 1;
            }
            if widget.status == FetchStatus::Failed {
                stats.failing += 1;
            }
        }
        stats
    }

    /// Widgets a scheduler tick at `now` should refresh, in grid order
    pub async fn refresh_candidates(
        &self,
        now: DateTime<Utc>,
        cadence: RefreshCadence,
    ) -> Vec<WidgetId> {
        let state = self.state.read().await;
        state
            .widgets
            .iter()
            .filter(|w| !w.is_loading && !w.api_url.trim().is_empty())
            .filter(|w| match cadence {
                RefreshCadence::GlobalTick => true,
                RefreshCadence::PerWidget => w.is_due(now),
            })
            .map(|w| w.id)
            .collect()
    }
}
