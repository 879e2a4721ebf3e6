mod common;

use chrono::Utc;
use common::{ok, GatedFetcher, ScriptedFetcher};
use gridwatch_core::{
    FetchError, FetchStatus, GridwatchError, ManualClock, RefreshCadence, RefreshScheduler,
    SchedulerConfig, WidgetConfig, WidgetStore,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn url(name: &str) -> String {
    format!("https://example.com/{}", name)
}

fn widget(name: &str) -> WidgetConfig {
    WidgetConfig::new(name, url(name)).fields(["value"])
}

fn config(tick_secs: u64, cadence: RefreshCadence) -> SchedulerConfig {
    SchedulerConfig {
        tick_interval: Duration::from_secs(tick_secs),
        cadence,
    }
}

/// Let spawned tasks run to their next await point
async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn tick_refreshes_every_idle_widget_and_tallies_outcomes() {
    let fetcher = ScriptedFetcher::new()
        .reply(&url("a"), ok(json!({"value": 1})))
        .reply(&url("b"), ok(json!({"value": 2})))
        .reply(&url("c"), Err(FetchError::HttpStatus { code: 502 }));
    let store = WidgetStore::new(Arc::new(fetcher));
    let a = store.add_widget(widget("a")).await.unwrap();
    let b = store.add_widget(widget("b")).await.unwrap();
    let c = store.add_widget(widget("c")).await.unwrap();

    let scheduler = RefreshScheduler::new(store.clone(), config(30, RefreshCadence::GlobalTick));
    let report = scheduler.tick().await;

    assert_eq!(report.triggered, vec![a, b, c]);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(store.get(c).await.unwrap().status, FetchStatus::Failed);
}

#[tokio::test]
async fn tick_with_no_widgets_does_nothing() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let store = WidgetStore::new(fetcher.clone());
    let scheduler = RefreshScheduler::new(store, config(30, RefreshCadence::GlobalTick));

    let report = scheduler.tick().await;
    assert!(report.triggered.is_empty());
    assert_eq!(fetcher.total_calls(), 0);
}

#[tokio::test]
async fn tick_skips_widgets_already_loading() {
    let gated = Arc::new(GatedFetcher::new(json!({"value": 1})));
    let store = WidgetStore::new(gated.clone());
    let busy = store.add_widget(widget("busy")).await.unwrap();

    let pending = {
        let store = store.clone();
        tokio::spawn(async move { store.refresh_widget(busy).await })
    };
    gated.wait_for_calls(1).await;

    let scheduler = RefreshScheduler::new(store.clone(), config(30, RefreshCadence::GlobalTick));
    let report = scheduler.tick().await;
    assert!(report.triggered.is_empty());
    assert_eq!(gated.calls(), 1);

    gated.release(1);
    pending.await.unwrap();
    assert!(!store.get(busy).await.unwrap().is_loading);
}

#[tokio::test]
async fn global_tick_ignores_per_widget_intervals() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .reply(&url("fast"), ok(json!({"value": 1})))
            .reply(&url("slow"), ok(json!({"value": 2}))),
    );
    let clock = ManualClock::new(Utc::now());
    let store = WidgetStore::with_clock(fetcher.clone(), Arc::new(clock.clone()));
    store.add_widget(widget("fast").refresh_every(10)).await.unwrap();
    store.add_widget(widget("slow").refresh_every(600)).await.unwrap();

    let scheduler = RefreshScheduler::new(store, config(30, RefreshCadence::GlobalTick));
    assert_eq!(scheduler.tick().await.triggered.len(), 2);
    assert_eq!(scheduler.tick().await.triggered.len(), 2);
    assert_eq!(fetcher.calls(&url("slow")), 2);
}

#[tokio::test]
async fn per_widget_cadence_honors_each_interval() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .reply(&url("fast"), ok(json!({"value": 1})))
            .reply(&url("slow"), ok(json!({"value": 2}))),
    );
    let clock = ManualClock::new(Utc::now());
    let store = WidgetStore::with_clock(fetcher.clone(), Arc::new(clock.clone()));
    let fast = store.add_widget(widget("fast").refresh_every(10)).await.unwrap();
    let slow = store.add_widget(widget("slow").refresh_every(60)).await.unwrap();

    let scheduler = RefreshScheduler::new(store, config(10, RefreshCadence::PerWidget));
    assert_eq!(scheduler.cadence(), RefreshCadence::PerWidget);

    // Never fetched: both due
    assert_eq!(scheduler.tick().await.triggered, vec![fast, slow]);

    clock.advance(chrono::Duration::seconds(5));
    assert!(scheduler.tick().await.triggered.is_empty());

    clock.advance(chrono::Duration::seconds(10));
    assert_eq!(scheduler.tick().await.triggered, vec![fast]);

    clock.advance(chrono::Duration::seconds(50));
    assert_eq!(scheduler.tick().await.triggered, vec![fast, slow]);

    assert_eq!(fetcher.calls(&url("fast")), 3);
    assert_eq!(fetcher.calls(&url("slow")), 2);
}

#[tokio::test(start_paused = true)]
async fn timer_fires_after_one_interval_and_stops_cleanly() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .reply(&url("a"), ok(json!({"value": 1})))
            .reply(&url("b"), ok(json!({"value": 2}))),
    );
    let store = WidgetStore::new(fetcher.clone());
    store.add_widget(widget("a")).await.unwrap();
    store.add_widget(widget("b")).await.unwrap();

    let mut scheduler = RefreshScheduler::new(store.clone(), config(30, RefreshCadence::GlobalTick));
    scheduler.start().unwrap();
    assert!(scheduler.is_running());

    tokio::time::sleep(Duration::from_secs(29)).await;
    settle().await;
    assert_eq!(fetcher.total_calls(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;
    assert_eq!(fetcher.total_calls(), 2);

    tokio::time::sleep(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(fetcher.total_calls(), 4);

    scheduler.stop().await;
    assert!(!scheduler.is_running());

    tokio::time::sleep(Duration::from_secs(300)).await;
    settle().await;
    assert_eq!(fetcher.total_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn slow_widget_does_not_delay_fast_one() {
    let fetcher = ScriptedFetcher::new()
        .reply_after(&url("fast"), Duration::from_millis(200), ok(json!({"value": 1})))
        .reply_after(
            &url("slow"),
            Duration::from_secs(5),
            Err(FetchError::Timeout { timeout_ms: 5_000 }),
        );
    let store = WidgetStore::new(Arc::new(fetcher));
    let fast = store.add_widget(widget("fast")).await.unwrap();
    let slow = store.add_widget(widget("slow")).await.unwrap();

    let mut scheduler = RefreshScheduler::new(store.clone(), config(30, RefreshCadence::GlobalTick));
    scheduler.start().unwrap();

    tokio::time::sleep(Duration::from_millis(30_300)).await;
    settle().await;
    let fast_widget = store.get(fast).await.unwrap();
    assert_eq!(fast_widget.status, FetchStatus::Fresh);
    assert!(!fast_widget.is_loading);
    assert!(store.get(slow).await.unwrap().is_loading);

    tokio::time::sleep(Duration::from_secs(5)).await;
    settle().await;
    let slow_widget = store.get(slow).await.unwrap();
    assert!(!slow_widget.is_loading);
    assert_eq!(slow_widget.status, FetchStatus::Failed);
    assert_eq!(
        slow_widget.last_error,
        Some(FetchError::Timeout { timeout_ms: 5_000 })
    );

    scheduler.stop().await;
}

#[tokio::test]
async fn start_rejects_double_start_and_zero_interval() {
    let store = WidgetStore::new(Arc::new(ScriptedFetcher::new()));

    let mut scheduler = RefreshScheduler::new(store.clone(), config(30, RefreshCadence::GlobalTick));
    scheduler.start().unwrap();
    assert!(matches!(
        scheduler.start(),
        Err(GridwatchError::Scheduler(_))
    ));
    scheduler.stop().await;
    // Stopping twice is harmless
    scheduler.stop().await;

    let mut zero = RefreshScheduler::new(store, config(0, RefreshCadence::GlobalTick));
    assert!(matches!(zero.start(), Err(GridwatchError::Scheduler(_))));
    assert!(!zero.is_running());
}

#[tokio::test]
async fn start_rejects_interval_past_the_timer_horizon() {
    let fetcher = Arc::new(ScriptedFetcher::new().reply(&url("a"), ok(json!({"value": 1}))));
    let store = WidgetStore::new(fetcher.clone());
    store.add_widget(widget("a")).await.unwrap();

    let mut scheduler = RefreshScheduler::new(
        store,
        SchedulerConfig {
            tick_interval: Duration::from_secs(u64::MAX),
            cadence: RefreshCadence::GlobalTick,
        },
    );
    let err = scheduler.start().unwrap_err();
    assert!(matches!(err, GridwatchError::Scheduler(_)));
    assert!(err.to_string().contains("too large"));
    assert!(!scheduler.is_running());

    // Manual ticks are unaffected
    assert_eq!(scheduler.tick().await.succeeded, 1);
    scheduler.stop().await;
    assert_eq!(fetcher.total_calls(), 1);
}
