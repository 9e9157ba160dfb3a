//! Dashboard HTTP server.
//!
//! Pull endpoints over the store plus a WebSocket push channel that
//! broadcasts periodic overview snapshots to every attached subscriber.
//!
//! ## Endpoints
//!
//! - `GET /api/overview` - aggregate snapshot across sites
//! - `GET /api/stats` - windowed stats, optional site filter
//! - `GET /api/history` - windowed history, optional site filter/limit
//! - `GET /api/sites` - configured sites
//! - `GET /api/alerts` - alert channel wiring status
//! - `GET /api/export` - windowed data export (json/csv/html)
//! - `GET /ws` - overview push channel

pub mod error;
pub mod routes;
pub mod types;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::storage::Store;

pub use error::{ApiError, ApiResult};
pub use types::{make_overview, status_label, OverviewResponse, SiteOverview};

/// How often the broadcaster recomputes and pushes the overview.
const BROADCAST_INTERVAL: Duration = Duration::from_secs(10);

/// Broadcast channel capacity; slow subscribers skip frames rather
/// than stall the sender.
const BROADCAST_CAPACITY: usize = 16;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<Config>,
    pub overview_tx: broadcast::Sender<String>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Arc<Config>) -> Self {
        let (overview_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            store,
            config,
            overview_tx,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/overview", get(routes::overview))
        .route("/api/stats", get(routes::stats))
        .route("/api/history", get(routes::history))
        .route("/api/sites", get(routes::sites))
        .route("/api/alerts", get(routes::alerts))
        .route("/api/export", get(routes::export))
        .route("/ws", get(ws::websocket_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Periodically push a fresh overview snapshot to all subscribers.
async fn broadcast_loop(state: AppState) {
    let mut ticker = tokio::time::interval(BROADCAST_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        if state.overview_tx.receiver_count() == 0 {
            continue;
        }

        match ws::overview_frame(&state).await {
            Ok(frame) => {
                debug!("broadcasting overview to {} subscribers", state.overview_tx.receiver_count());
                let _ = state.overview_tx.send(frame);
            }
            Err(e) => warn!("failed to build overview broadcast: {e}"),
        }
    }
}

/// Bind and serve the dashboard until the process exits.
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("dashboard listening on http://localhost:{port}");

    tokio::spawn(broadcast_loop(state.clone()));

    axum::serve(listener, router(state)).await?;
    Ok(())
}
