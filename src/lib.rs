//! ==============================================================================
//! sensor-dash - polling data-view synchronizer
//! ==============================================================================
//!
//! fetch a bounded window of sensor records, normalize their aliased fields,
//! and project them onto a table, four summary metrics and a two-series line
//! chart; repeat on a fixed interval.
//!
//! ```text
//!     ┌───────────┐      ┌────────────┐      ┌──────────┐
//!     │  fetcher  │ ───► │ normalizer │ ───► │ renderer │ ───► View
//!     └───────────┘      └────────────┘      └──────────┘
//!           ▲                                       │
//!           └──────────── scheduler (timer) ────────┘ (never calls back)
//! ```
//!
//! ==============================================================================

pub mod config;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod normalizer;
pub mod render;
pub mod scheduler;
pub mod server;
pub mod view;

pub use domain::{NormalizedRecord, RawRecord, Reading};
pub use error::PollError;
pub use fetcher::{DataQuery, HttpFetcher, RecordSource};
pub use render::Renderer;
pub use scheduler::{PollingView, RefreshOutcome, SchedulerState, ViewOptions};
pub use view::View;
