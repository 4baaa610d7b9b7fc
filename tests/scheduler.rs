use async_trait::async_trait;
use sensor_dash::config::Timezone;
use sensor_dash::render::TimeFormat;
use sensor_dash::{
    DataQuery, PollError, PollingView, RawRecord, RecordSource, RefreshOutcome, Renderer,
    SchedulerState, View, ViewOptions,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

enum Step {
    Records(Vec<RawRecord>, Duration),
    Fail,
}

/// answers from a script, then repeats `fallback`
struct Scripted {
    calls: AtomicUsize,
    script: Mutex<VecDeque<Step>>,
    fallback: Vec<RawRecord>,
    queries: Mutex<Vec<DataQuery>>,
}

impl Scripted {
    fn new(fallback: Vec<RawRecord>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            script: Mutex::new(VecDeque::new()),
            fallback,
            queries: Mutex::new(Vec::new()),
        })
    }

    fn then(self: &Arc<Self>, step: Step) -> Arc<Self> {
        self.script.lock().unwrap().push_back(step);
        self.clone()
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSource for Scripted {
    async fn fetch(&self, query: &DataQuery) -> Result<Vec<RawRecord>, PollError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.clone());
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Records(records, delay)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(records)
            }
            Some(Step::Fail) => Err(PollError::Status {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                url: "http://test/api/data".to_string(),
            }),
            None => Ok(self.fallback.clone()),
        }
    }
}

fn reading(key: &str, ts: i64, t: f64) -> RawRecord {
    RawRecord::new(key, json!({"ts": ts, "t": t, "co2": 420, "presence": 1}))
}

fn build(source: Arc<Scripted>, auto_refresh: bool) -> PollingView {
    let renderer = Renderer::new(
        "—",
        TimeFormat { pattern: "%H:%M:%S".into(), zone: Timezone::Utc },
    );
    PollingView::new(
        source,
        renderer,
        View::full(),
        ViewOptions {
            query: DataQuery::new(Some("GAIDESK-01"), 10),
            interval: Duration::from_millis(5_000),
            auto_refresh,
            drop_stale: true,
        },
    )
}

async fn temperature_metric(view: &PollingView) -> String {
    let v = view.view().read().await;
    v.metrics.temperature.as_ref().unwrap().text.clone()
}

#[tokio::test(start_paused = true)]
async fn init_refreshes_once_then_polls_every_interval() {
    let src = Scripted::new(vec![reading("k1", 1_700_000_000_000, 21.5)]);
    let view = build(src.clone(), true);

    assert_eq!(view.init().await, SchedulerState::Polling);
    assert_eq!(src.calls(), 1);
    assert_eq!(view.view().read().await.rows().len(), 1);

    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert_eq!(src.calls(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(src.calls(), 2);

    tokio::time::sleep(Duration::from_millis(5_000)).await;
    assert_eq!(src.calls(), 3);

    let queries = src.queries.lock().unwrap();
    let q = &queries[0];
    assert_eq!(q.device.as_deref(), Some("GAIDESK-01"));
    assert_eq!(q.limit, 10);
}

#[tokio::test(start_paused = true)]
async fn init_without_auto_refresh_stays_idle() {
    let src = Scripted::new(vec![]);
    let view = build(src.clone(), false);

    assert_eq!(view.init().await, SchedulerState::Idle);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(src.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn toggling_never_leaves_two_timers() {
    let src = Scripted::new(vec![]);
    let view = build(src.clone(), false);

    assert_eq!(view.set_auto_refresh(true).await, SchedulerState::Polling);
    assert_eq!(view.set_auto_refresh(true).await, SchedulerState::Polling);
    tokio::time::sleep(Duration::from_millis(5_100)).await;
    // a second timer would have fetched twice here
    assert_eq!(src.calls(), 1);

    for enabled in [true, false, true, false] {
        view.set_auto_refresh(enabled).await;
    }
    assert_eq!(view.set_auto_refresh(false).await, SchedulerState::Idle);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(src.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn manual_refresh_does_not_change_state() {
    let src = Scripted::new(vec![reading("k1", 1_700_000_000_000, 20.0)]);
    let view = build(src.clone(), false);

    let outcome = view.refresh().await.unwrap();
    assert!(matches!(outcome, RefreshOutcome::Rendered { seq: 1, count: 1, .. }));
    assert_eq!(view.state().await, SchedulerState::Idle);

    view.start().await;
    view.refresh().await.unwrap();
    assert_eq!(view.state().await, SchedulerState::Polling);
    view.stop().await;
}

#[tokio::test(start_paused = true)]
async fn failed_poll_keeps_view_and_later_ticks_run() {
    let src = Scripted::new(vec![reading("k3", 1_700_000_010_000, 23.0)])
        .then(Step::Records(vec![reading("k1", 1_700_000_000_000, 21.5)], Duration::ZERO))
        .then(Step::Fail);
    let view = build(src.clone(), true);

    view.init().await;
    assert_eq!(temperature_metric(&view).await, "21.5");

    // tick 1 fails
    tokio::time::sleep(Duration::from_millis(5_050)).await;
    assert_eq!(src.calls(), 2);
    assert_eq!(view.failures(), 1);
    assert_eq!(temperature_metric(&view).await, "21.5");
    assert_eq!(view.view().read().await.rows().len(), 1);

    // tick 2 recovers
    tokio::time::sleep(Duration::from_millis(5_000)).await;
    assert_eq!(src.calls(), 3);
    assert_eq!(temperature_metric(&view).await, "23.0");
    view.stop().await;
}

#[tokio::test(start_paused = true)]
async fn manual_refresh_error_is_reported() {
    let src = Scripted::new(vec![]).then(Step::Fail);
    let view = build(src, false);

    let err = view.refresh().await.unwrap_err();
    assert!(err.is_fetch());
    assert!(!err.is_decode());
    assert_eq!(view.failures(), 1);
    assert_eq!(view.rendered(), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_older_response_is_dropped() {
    let src = Scripted::new(vec![])
        .then(Step::Records(vec![reading("old", 1_700_000_000_000, 10.0)], Duration::from_millis(300)))
        .then(Step::Records(vec![reading("new", 1_700_000_005_000, 30.0)], Duration::ZERO));
    let view = build(src, false);

    let (older, newer) = tokio::join!(view.refresh(), view.refresh());
    assert_eq!(older.unwrap(), RefreshOutcome::Stale { seq: 1, shown: 2 });
    assert!(matches!(newer.unwrap(), RefreshOutcome::Rendered { seq: 2, .. }));

    assert_eq!(view.rendered(), 2);
    assert_eq!(temperature_metric(&view).await, "30.0");
}

#[tokio::test(start_paused = true)]
async fn empty_response_keeps_readings_but_resets_count() {
    let src = Scripted::new(vec![])
        .then(Step::Records(vec![reading("k1", 1_700_000_000_000, 21.5)], Duration::ZERO));
    let view = build(src, false);

    view.refresh().await.unwrap();
    view.refresh().await.unwrap();

    let v = view.view().read().await;
    assert!(v.rows().is_empty());
    assert_eq!(v.metrics.count.as_ref().unwrap().text, "0");
    assert_eq!(v.metrics.temperature.as_ref().unwrap().text, "21.5");
    assert_eq!(v.metrics.co2.as_ref().unwrap().text, "420");
    let canvas = v.canvas.as_ref().unwrap();
    assert_eq!(canvas.live_instances(), 1);
    assert_eq!(canvas.created(), 2);
    assert!(v.chart().unwrap().labels.is_empty());
}

#[tokio::test(start_paused = true)]
async fn independent_views_do_not_share_state() {
    let a_src = Scripted::new(vec![reading("a", 1_700_000_000_000, 1.0)]);
    let b_src = Scripted::new(vec![reading("b", 1_700_000_000_000, 2.0)]);
    let a = build(a_src.clone(), false);
    let b = build(b_src.clone(), false);

    a.start().await;
    b.refresh().await.unwrap();
    tokio::time::sleep(Duration::from_millis(5_100)).await;

    assert_eq!(a.state().await, SchedulerState::Polling);
    assert_eq!(b.state().await, SchedulerState::Idle);
    assert_eq!(temperature_metric(&a).await, "1.0");
    assert_eq!(temperature_metric(&b).await, "2.0");
    assert_eq!(a_src.calls(), 1);
    assert_eq!(b_src.calls(), 1);
    a.stop().await;
}

#[tokio::test(start_paused = true)]
async fn without_stale_guard_last_write_wins() {
    let src = Scripted::new(vec![])
        .then(Step::Records(vec![reading("old", 1_700_000_000_000, 10.0)], Duration::from_millis(300)))
        .then(Step::Records(vec![reading("new", 1_700_000_005_000, 30.0)], Duration::ZERO));
    let view = PollingView::new(
        src,
        Renderer::default(),
        View::full(),
        ViewOptions { drop_stale: false, auto_refresh: false, ..ViewOptions::default() },
    );

    let (older, newer) = tokio::join!(view.refresh(), view.refresh());
    assert!(matches!(older.unwrap(), RefreshOutcome::Rendered { seq: 1, .. }));
    assert!(matches!(newer.unwrap(), RefreshOutcome::Rendered { seq: 2, .. }));
    assert_eq!(view.rendered(), 1);
    assert_eq!(temperature_metric(&view).await, "10.0");
}

#[tokio::test(start_paused = true)]
async fn fetches_slower_than_the_interval_still_render() {
    let src = Scripted::new(vec![reading("k1", 1_700_000_000_000, 21.5)]);
    for i in 0..12 {
        src.then(Step::Records(
            vec![reading("k", 1_700_000_000_000 + i * 5_000, i as f64)],
            Duration::from_millis(6_000),
        ));
    }
    let view = build(src.clone(), false);
    // first response arrives after 6 s
    view.init().await;
    assert_eq!(view.rendered(), 1);
    view.start().await;

    // ticks at +5 s, +10 s ... each answer lands 6 s after its tick
    tokio::time::sleep(Duration::from_millis(12_000)).await;
    let mut last = view.rendered();
    assert!(last > 1, "view stuck at seq {last}");
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(10_000)).await;
        let now = view.rendered();
        assert!(now > last, "view stuck at seq {now}");
        last = now;
    }
    view.stop().await;

    // every tick issued a request that overlapped the next one
    assert!(view.issued() > view.rendered());
    assert_eq!(view.failures(), 0);
}

#[tokio::test(start_paused = true)]
async fn overlapping_responses_render_in_issue_order_only() {
    let src = Scripted::new(vec![])
        .then(Step::Records(vec![reading("a", 1_700_000_000_000, 1.0)], Duration::from_millis(500)))
        .then(Step::Records(vec![reading("b", 1_700_000_005_000, 2.0)], Duration::from_millis(100)))
        .then(Step::Records(vec![reading("c", 1_700_000_010_000, 3.0)], Duration::from_millis(300)));
    let view = build(src, false);

    let (a, b, c) = tokio::join!(view.refresh(), view.refresh(), view.refresh());
    assert!(matches!(b.unwrap(), RefreshOutcome::Rendered { seq: 2, .. }));
    assert!(matches!(c.unwrap(), RefreshOutcome::Rendered { seq: 3, .. }));
    assert_eq!(a.unwrap(), RefreshOutcome::Stale { seq: 1, shown: 3 });

    assert_eq!(view.rendered(), 3);
    assert_eq!(temperature_metric(&view).await, "3.0");
}
