//! ==============================================================================
//! server.rs - local dashboard over the rendered view
//! ==============================================================================
//!
//! routes:
//!     GET  /                   html page built from the current view
//!     GET  /api/view           json snapshot (targets + scheduler state)
//!     POST /api/refresh        manual refresh        (controls.manual_refresh)
//!     POST /api/auto-refresh   ?enabled=true|false   (controls.auto_refresh_toggle)
//!     GET  /api/session        latest session summary from the source
//!
//! a disabled control is simply not routed.
//!
//! ==============================================================================

use crate::config::ControlsConfig;
use crate::fetcher::HttpFetcher;
use crate::scheduler::{PollingView, SchedulerState};
use crate::view::View;
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct DashState {
    pub view: PollingView,
    /// session summary source; None hides /api/session
    pub sessions: Option<Arc<HttpFetcher>>,
    pub controls: ControlsConfig,
}

pub fn router(state: DashState) -> Router {
    let mut app = Router::new()
        .route("/", get(dashboard_handler))
        .route("/api/view", get(view_handler));

    if state.controls.manual_refresh {
        app = app.route("/api/refresh", post(refresh_handler));
    }
    if state.controls.auto_refresh_toggle {
        app = app.route("/api/auto-refresh", post(toggle_handler));
    }
    if state.sessions.is_some() {
        app = app.route("/api/session", get(session_handler));
    }

    app.layer(CorsLayer::permissive()).with_state(state)
}

pub async fn run_server(bind: &str, state: DashState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "dashboard live");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn dashboard_handler(State(state): State<DashState>) -> Html<String> {
    let polling = state.view.state().await;
    let view = state.view.view().read().await;
    Html(render_page(&view, polling, &state.controls))
}

async fn view_handler(State(state): State<DashState>) -> Json<serde_json::Value> {
    let polling = state.view.state().await;
    let view = state.view.view().read().await;
    Json(json!({
        "state": polling,
        "issued": state.view.issued(),
        "rendered": state.view.rendered(),
        "failures": state.view.failures(),
        "view": &*view,
    }))
}

async fn refresh_handler(State(state): State<DashState>) -> Response {
    match state.view.refresh().await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => {
            warn!("manual refresh failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"status": "error", "message": e.to_string()})),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize)]
struct ToggleParams {
    enabled: bool,
}

async fn toggle_handler(
    State(state): State<DashState>,
    Query(params): Query<ToggleParams>,
) -> Json<serde_json::Value> {
    let now = state.view.set_auto_refresh(params.enabled).await;
    Json(json!({"status": "ok", "state": now}))
}

async fn session_handler(State(state): State<DashState>) -> Response {
    let Some(fetcher) = state.sessions.as_ref() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let device = state.view.options().query.device.as_deref();
    match fetcher.fetch_session_summary(device).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => {
            warn!("session summary failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"status": "error", "message": e.to_string()})),
            )
                .into_response()
        }
    }
}

fn render_page(view: &View, polling: SchedulerState, controls: &ControlsConfig) -> String {
    let mut page = String::from(
        "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"><title>sensor dashboard</title></head>\n\
         <body style=\"font-family: system-ui; padding: 1.5rem;\">\n",
    );

    let m = &view.metrics;
    let cells = [
        ("m-count", "records", &m.count),
        ("m-temp", "°C", &m.temperature),
        ("m-co2", "CO₂", &m.co2),
        ("m-presence", "presence", &m.presence),
    ];
    page.push_str("<section>\n");
    for (id, label, cell) in cells {
        if let Some(cell) = cell {
            page.push_str(&format!(
                "  <div id=\"{}\"><small>{}</small> <b>{}</b></div>\n",
                id,
                label,
                html_escape(&cell.text)
            ));
        }
    }
    page.push_str("</section>\n");

    if controls.auto_refresh_toggle || controls.manual_refresh {
        page.push_str(&format!(
            "<p>auto-refresh: {}</p>\n",
            match polling {
                SchedulerState::Polling => "on",
                SchedulerState::Idle => "off",
            }
        ));
    }

    if let Some(table) = &view.table {
        page.push_str(
            "<table>\n<thead><tr><th>time</th><th>°C</th><th>CO₂</th><th>presence</th><th>risk</th></tr></thead>\n<tbody id=\"rows\">\n",
        );
        for row in &table.rows {
            page.push_str("<tr>");
            for cell in [&row.time, &row.temperature, &row.co2, &row.presence, &row.risk] {
                page.push_str(&format!("<td>{}</td>", html_escape(cell)));
            }
            page.push_str("</tr>\n");
        }
        page.push_str("</tbody>\n</table>\n");
    }

    if let Some(chart) = view.chart() {
        // consumed by whatever chart script the page embeds
        let data = serde_json::to_string(chart).unwrap_or_else(|_| "null".to_string());
        page.push_str(&format!(
            "<script type=\"application/json\" id=\"chart\">{}</script>\n",
            data.replace("</", "<\\/")
        ));
    }

    page.push_str("</body>\n</html>\n");
    page
}

/// escape html special characters to prevent xss
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{TableRow, TextCell};

    #[test]
    fn page_escapes_cells_and_skips_missing_targets() {
        let mut view = View::default();
        view.metrics.count = Some(TextCell { text: "2".into() });
        view.table = Some(Default::default());
        view.table.as_mut().unwrap().rows.push(TableRow {
            time: "<script>".into(),
            temperature: "21.5".into(),
            co2: "—".into(),
            presence: "1".into(),
            risk: "0".into(),
        });

        let page = render_page(&view, SchedulerState::Idle, &ControlsConfig::default());
        assert!(page.contains("&lt;script&gt;"));
        assert!(page.contains("id=\"m-count\""));
        assert!(!page.contains("id=\"m-temp\""));
        assert!(!page.contains("id=\"chart\""));
        assert!(page.contains("auto-refresh: off"));
    }

    #[test]
    fn html_escape_covers_quotes() {
        assert_eq!(html_escape(r#"a"b&c"#), "a&quot;b&amp;c");
    }
}
