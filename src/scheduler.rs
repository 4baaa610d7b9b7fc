//! ==============================================================================
//! scheduler.rs - the poll view: fetch -> normalize -> render on a timer
//! ==============================================================================
//!
//! purpose:
//!     owns everything one dashboard needs: the record source, the renderer,
//!     the render targets, the single timer, and the request sequence.
//!
//! states:
//!
//! ```text
//!         init() ──► refresh once ──► auto_refresh? ──► Polling
//!                                          │ no
//!                                          ▼
//!                                         Idle
//!
//!     Idle ──start()──► Polling ──stop()──► Idle
//!     start() while Polling replaces the timer, it never adds a second one.
//!     refresh() runs out of band and leaves the state alone.
//! ```
//!
//! ordering:
//!     each fetch takes a sequence number. when drop_stale is on, a response
//!     older than the one already on screen is discarded instead of rendered;
//!     a newer one always renders, even if later requests are still in flight.
//!     stopping the timer does not cancel fetches already running.
//!
//! relationships:
//!     - uses: fetcher.rs (RecordSource), normalizer.rs, render.rs, view.rs
//!     - used by: main.rs, server.rs
//!
//! ==============================================================================

use crate::config::DashConfig;
use crate::error::Result;
use crate::fetcher::{DataQuery, RecordSource};
use crate::normalizer::normalize_all;
use crate::render::{RenderReport, Renderer};
use crate::view::View;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(5_000);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Polling,
}

/// what happened to one fetch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum RefreshOutcome {
    Rendered { seq: u64, count: usize, report: RenderReport },
    /// a newer response was already rendered while this one was in flight
    Stale { seq: u64, shown: u64 },
}

/// knobs for one view instance
#[derive(Clone, Debug)]
pub struct ViewOptions {
    pub query: DataQuery,
    pub interval: Duration,
    pub auto_refresh: bool,
    pub drop_stale: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            query: DataQuery::new(None, 50),
            interval: DEFAULT_INTERVAL,
            auto_refresh: true,
            drop_stale: true,
        }
    }
}

impl ViewOptions {
    pub fn from_config(config: &DashConfig) -> Self {
        Self {
            query: DataQuery::from_config(&config.source),
            interval: config.polling.interval(),
            auto_refresh: config.polling.auto_refresh,
            drop_stale: config.polling.drop_stale,
        }
    }
}

struct Inner {
    source: Arc<dyn RecordSource>,
    renderer: Renderer,
    options: ViewOptions,
    view: RwLock<View>,
    timer: Mutex<Option<JoinHandle<()>>>,
    issued: AtomicU64,
    rendered: AtomicU64,
    failures: AtomicU64,
}

/// Clone-able handle to one dashboard view
#[derive(Clone)]
pub struct PollingView {
    inner: Arc<Inner>,
}

impl PollingView {
    pub fn new(
        source: Arc<dyn RecordSource>,
        renderer: Renderer,
        view: View,
        options: ViewOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                renderer,
                options,
                view: RwLock::new(view),
                timer: Mutex::new(None),
                issued: AtomicU64::new(0),
                rendered: AtomicU64::new(0),
                failures: AtomicU64::new(0),
            }),
        }
    }

    pub fn options(&self) -> &ViewOptions {
        &self.inner.options
    }

    /// shared access to the render targets
    pub fn view(&self) -> &RwLock<View> {
        &self.inner.view
    }

    pub async fn state(&self) -> SchedulerState {
        match self.inner.timer.lock().await.as_ref() {
            Some(handle) if !handle.is_finished() => SchedulerState::Polling,
            _ => SchedulerState::Idle,
        }
    }

    /// latest issued request number (0 before the first fetch)
    pub fn issued(&self) -> u64 {
        self.inner.issued.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> u64 {
        self.inner.failures.load(Ordering::SeqCst)
    }

    /// refresh once, then start polling when auto-refresh is on
    pub async fn init(&self) -> SchedulerState {
        self.cycle().await;
        if self.inner.options.auto_refresh {
            self.start().await;
        }
        self.state().await
    }

    /// enter Polling; an existing timer is stopped first
    pub async fn start(&self) {
        let mut slot = self.inner.timer.lock().await;
        if let Some(prev) = slot.take() {
            prev.abort();
        }

        let period = self.inner.options.interval;
        // weak: the timer must not keep a dropped view alive
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        *slot = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                let view = PollingView { inner };
                // own task: stopping the timer must not cancel this fetch
                tokio::spawn(async move { view.cycle().await });
            }
        }));
        info!(interval_ms = period.as_millis() as u64, "auto-refresh on");
    }

    /// enter Idle; fetches already in flight still complete
    pub async fn stop(&self) {
        if let Some(handle) = self.inner.timer.lock().await.take() {
            handle.abort();
            info!("auto-refresh off");
        }
    }

    /// the auto-refresh toggle
    pub async fn set_auto_refresh(&self, enabled: bool) -> SchedulerState {
        if enabled {
            self.start().await;
        } else {
            self.stop().await;
        }
        self.state().await
    }

    /// one fetch -> normalize -> render pass, outside the timer
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let inner = &self.inner;
        let seq = inner.issued.fetch_add(1, Ordering::SeqCst) + 1;

        let raw = match inner.source.fetch(&inner.options.query).await {
            Ok(raw) => raw,
            Err(e) => {
                inner.failures.fetch_add(1, Ordering::SeqCst);
                return Err(e);
            }
        };
        let records = normalize_all(&raw);

        // checked and stored under the write lock so renders stay ordered
        let mut view = inner.view.write().await;
        let shown = inner.rendered.load(Ordering::SeqCst);
        if inner.options.drop_stale && seq <= shown {
            debug!(seq, shown, "dropping stale response");
            return Ok(RefreshOutcome::Stale { seq, shown });
        }
        let report = inner.renderer.render(&records, &mut view);
        inner.rendered.store(seq, Ordering::SeqCst);

        Ok(RefreshOutcome::Rendered { seq, count: records.len(), report })
    }

    /// refresh with failures logged; the previous render stays on screen
    pub async fn cycle(&self) -> Option<RefreshOutcome> {
        match self.refresh().await {
            Ok(outcome) => {
                if let RefreshOutcome::Rendered { seq, count, .. } = outcome {
                    debug!(seq, count, "view refreshed");
                }
                Some(outcome)
            }
            Err(e) => {
                let kind = if e.is_decode() { "decode" } else { "fetch" };
                warn!(kind, "poll failed: {}", e);
                None
            }
        }
    }

    /// sequence number of the response currently on screen
    pub fn rendered(&self) -> u64 {
        self.inner.rendered.load(Ordering::SeqCst)
    }
}
