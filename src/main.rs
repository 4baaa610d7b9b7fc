//! ==============================================================================
//! main.rs - sensor-dash entry point
//! ==============================================================================
//!
//! responsibilities:
//!     - load dash.toml and apply command line overrides
//!     - set up tracing
//!     - build one poll view, refresh it once, start auto-refresh
//!     - serve the dashboard (or just keep polling when the server is off)
//!
//! ==============================================================================

use anyhow::{Context, Result};
use clap::Parser;
use sensor_dash::config::{DashConfig, Loaded};
use sensor_dash::server::{self, DashState};
use sensor_dash::{HttpFetcher, PollingView, Renderer, View, ViewOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sensor-dash", about = "Polls a sensor feed and serves it as a dashboard")]
struct Args {
    /// config file (default: config/dash.toml, then ../config/dash.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// api origin of the data endpoint
    #[arg(long)]
    base: Option<String>,

    /// only show this device
    #[arg(long)]
    device: Option<String>,

    /// number of records per fetch
    #[arg(long)]
    limit: Option<u32>,

    /// refresh interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// start with auto-refresh off
    #[arg(long)]
    no_auto_refresh: bool,

    /// address the dashboard listens on
    #[arg(long)]
    bind: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut DashConfig) {
        if let Some(base) = &self.base {
            config.source.base = base.clone();
        }
        if let Some(device) = &self.device {
            config.source.device = device.clone();
        }
        if let Some(limit) = self.limit {
            config.source.limit = limit;
        }
        if let Some(interval) = self.interval_ms {
            config.polling.interval_ms = interval;
        }
        if self.no_auto_refresh {
            config.polling.auto_refresh = false;
        }
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // step 1: load configuration
    let loaded = match &args.config {
        Some(path) => Loaded {
            config: DashConfig::load(path)?,
            origin: Some(path.clone()),
            skipped: Vec::new(),
        },
        None => DashConfig::load_or_default(),
    };
    let mut config = loaded.config.clone();
    init_tracing(&config.logging.level);
    loaded.log();
    args.apply(&mut config);
    config.clamp();
    config.log_summary();

    // step 2: build the view
    let fetcher = Arc::new(
        HttpFetcher::from_config(&config.source)
            .with_context(|| format!("bad source base url {:?}", config.source.base))?,
    );
    let view = PollingView::new(
        fetcher.clone(),
        Renderer::from_config(&config.display),
        View::from_targets(&config.targets),
        ViewOptions::from_config(&config),
    );

    // step 3: first refresh, then polling
    let state = view.init().await;
    info!(?state, "view initialized");

    // step 4: dashboard
    if config.server.enabled {
        let dash = DashState {
            view: view.clone(),
            sessions: Some(fetcher),
            controls: config.controls.clone(),
        };
        if let Err(e) = server::run_server(&config.server.bind, dash).await {
            error!("dashboard server error: {:#}", e);
            return Err(e);
        }
    } else {
        tokio::signal::ctrl_c().await?;
        view.stop().await;
    }

    Ok(())
}
