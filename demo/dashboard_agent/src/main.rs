mod config;
use config::DashboardAgentConfig;
use gridwatch_core::catalog::SAMPLE_SOURCES;
use gridwatch_core::telemetry::init_tracing_with;
use gridwatch_core::{
    default_selection, Gridwatch, StoreEvent, Widget, WidgetConfig, WidgetStore,
};
use serde_json::Value;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Logging / tracing
    init_tracing_with("info,gridwatch_core=info,dashboard_agent=info")?;

    info!(target: "dashboard_agent", "Starting dashboard agent");

    // Load configuration (defaults + env + optional TOML overlay)
    let cfg = DashboardAgentConfig::load();
    let mut gridwatch = Gridwatch::new(cfg.probe.clone(), cfg.scheduler.clone());

    let widgets = if cfg.widgets.is_empty() {
        info!(target: "dashboard_agent", "No widgets configured; using sample sources");
        SAMPLE_SOURCES
            .iter()
            .map(|s| WidgetConfig::new(s.name, s.url).kind(s.kind))
            .collect()
    } else {
        cfg.widgets.clone()
    };

    // 1) Test each API and fill in a field selection where none was given
    for mut widget in widgets {
        if widget.selected_fields.is_empty() {
            let report = gridwatch.test_api(&widget.api_url).await;
            if !report.success {
                warn!(target: "dashboard_agent", widget = %widget.name, message = %report.message, "Skipping widget");
                continue;
            }
            info!(target: "dashboard_agent", widget = %widget.name, "{}", report.message);
            widget.selected_fields = default_selection(report.selectable(), widget.kind);
        }

        let name = widget.name.clone();
        if let Err(e) = gridwatch.store.add_widget(widget).await {
            warn!(target: "dashboard_agent", widget = %name, error = %e, "Widget rejected");
        }
    }

    // 2) Print every finished refresh
    let store = gridwatch.store.clone();
    let mut events = store.subscribe();
    let render_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(StoreEvent::RefreshFinished { id, .. }) => {
                    if let Some(widget) = store.get(id).await {
                        render(&widget);
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => {
                    warn!(target: "dashboard_agent", skipped = n, "Render loop lagging")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // 3) Initial fill, then hand over to the timer
    let report = gridwatch.scheduler.tick().await;
    info!(
        target: "dashboard_agent",
        refreshed = report.triggered.len(),
        succeeded = report.succeeded,
        failed = report.failed,
        "Initial refresh complete"
    );
    print_stats(&gridwatch.store).await;

    gridwatch.start().await?;

    info!(target: "dashboard_agent", "Dashboard running. Press Ctrl+C to exit");
    if let Err(e) = signal::ctrl_c().await {
        error!(target: "dashboard_agent", error = %e, "Failed to listen for Ctrl+C");
    }

    gridwatch.shutdown().await?;
    render_task.abort();
    print_stats(&gridwatch.store).await;
    info!(target: "dashboard_agent", "Dashboard agent stopped");
    Ok(())
}

fn render(widget: &Widget) {
    let state = if widget.is_stale() {
        " (stale)"
    } else if widget.last_data.is_none() && widget.last_error.is_some() {
        " (error)"
    } else {
        ""
    };
    println!("[{}] {} ({}){}", widget.position, widget.name, widget.kind, state);
    for (path, value) in widget.selected_values() {
        println!("    {:<32} {}", path, display_value(value));
    }
    if let Some(e) = &widget.last_error {
        if widget.status == gridwatch_core::FetchStatus::Failed {
            println!("    last error: {}", e);
        }
    }
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "—".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

async fn print_stats(store: &WidgetStore) {
    let stats = store.stats().await;
    println!(
        "widgets: {} total, {} cards, {} tables, {} charts, {} failing",
        stats.total, stats.cards, stats.tables, stats.charts, stats.failing
    );
}
