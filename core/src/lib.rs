// Gridwatch Core Library
// JSON API dashboard runtime: field discovery, probing, widget state, refresh scheduling

pub mod catalog;
pub mod clock;
pub mod events;
pub mod fields;
pub mod probe;
pub mod scheduler;
pub mod store;
pub mod telemetry;
pub mod widget;

// Export core types
pub use catalog::{default_selection, test_api, ProbeReport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{EventBroadcaster, StoreEvent};
pub use fields::{extract_fields, resolve_path, ExtractOptions, FieldDescriptor, FieldType};
pub use probe::{FetchError, Fetcher, ProbeClient, ProbeConfig, ProbeResponse};
pub use scheduler::{RefreshCadence, RefreshScheduler, SchedulerConfig, TickReport};
pub use store::{DashboardStats, RefreshOutcome, WidgetStore};
pub use widget::{
    FetchStatus, RefreshInterval, ValidationError, Widget, WidgetConfig, WidgetId, WidgetKind,
    WidgetTheme,
};

use std::sync::Arc;

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridwatchError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, GridwatchError>;

/// Dashboard runtime: one store plus the scheduler that keeps it fresh
pub struct Gridwatch {
    pub store: WidgetStore,
    pub scheduler: RefreshScheduler,
    extract_options: ExtractOptions,
}

impl Gridwatch {
    /// Runtime backed by a real HTTP probe client
    pub fn new(probe: ProbeConfig, scheduler: SchedulerConfig) -> Self {
        Self::with_parts(
            Arc::new(ProbeClient::with_config(probe)),
            Arc::new(SystemClock),
            scheduler,
        )
    }

    pub fn with_parts(
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
        scheduler: SchedulerConfig,
    ) -> Self {
        let store = WidgetStore::with_clock(fetcher, clock);
        Self {
            scheduler: RefreshScheduler::new(store.clone(), scheduler),
            store,
            extract_options: ExtractOptions::default(),
        }
    }

    pub fn with_extract_options(mut self, options: ExtractOptions) -> Self {
        self.extract_options = options;
        self
    }

    /// Probe a candidate URL and build its field catalog
    pub async fn test_api(&self, url: &str) -> ProbeReport {
        catalog::test_api(self.store.fetcher().as_ref(), url, &self.extract_options).await
    }

    pub async fn start(&mut self) -> Result<()> {
        tracing::info!("Starting Gridwatch...");
        self.scheduler.start()?;
        tracing::info!("Gridwatch started successfully");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Shutting down Gridwatch...");
        self.scheduler.stop().await;
        tracing::info!("Gridwatch shut down successfully");
        Ok(())
    }
}
