use crate::config::DashboardSettings;
use crate::dashboard::{DashboardState, Pipeline};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Response,
    },
    routing::get,
    Json, Router,
};
use rust_embed::RustEmbed;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio_stream::{wrappers::WatchStream, Stream, StreamExt};
use tower_http::cors::CorsLayer;

/// Browser UI, embedded at build time.
#[derive(RustEmbed)]
#[folder = "ui/"]
struct Assets;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Mutex<Pipeline>>,
    latest: watch::Receiver<Arc<DashboardState>>,
    refresh_secs: u64,
}

pub async fn run(
    settings: &DashboardSettings,
    pipeline: Pipeline,
) -> Result<(), Box<dyn std::error::Error>> {
    let refresh_secs = settings.refresh_secs.max(1);
    let pipeline = Arc::new(Mutex::new(pipeline));

    let initial = compute(&pipeline, None).await?;
    let (tx, latest) = watch::channel(Arc::new(initial));
    tokio::spawn(refresh_loop(
        Arc::clone(&pipeline),
        tx,
        Duration::from_secs(refresh_secs),
    ));

    let app = router(AppState {
        pipeline,
        latest,
        refresh_secs,
    });

    let addr = format!("{}:{}", settings.bind, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!("process-dashboard listening on http://{local_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/assets/{*path}", get(asset))
        .route("/api/health", get(health))
        .route("/api/state", get(api_state))
        .route("/api/events", get(api_events))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the pipeline off the async workers. The lock keeps runs from
/// overlapping.
async fn compute(
    pipeline: &Arc<Mutex<Pipeline>>,
    selection_override: Option<Vec<String>>,
) -> Result<DashboardState, tokio::task::JoinError> {
    let mut guard = Arc::clone(pipeline).lock_owned().await;
    tokio::task::spawn_blocking(move || guard.compute(selection_override.as_deref())).await
}

/// Recompute the default view every `every` and publish it.
async fn refresh_loop(
    pipeline: Arc<Mutex<Pipeline>>,
    tx: watch::Sender<Arc<DashboardState>>,
    every: Duration,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // first tick fires immediately and the initial state is already published
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let state = match compute(&pipeline, None).await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "dashboard refresh failed");
                continue;
            }
        };
        tracing::debug!(view = state.view.kind(), "dashboard refreshed");
        if tx.send(Arc::new(state)).is_err() {
            break;
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"ok": true}))
}

/// Collect repeated `processes` parameters. `None` when the parameter is
/// absent; a bare `processes=` selects nothing.
fn process_override(params: &[(String, String)]) -> Option<Vec<String>> {
    let mut found = false;
    let mut names = Vec::new();
    for (key, value) in params {
        if key != "processes" {
            continue;
        }
        found = true;
        if !value.is_empty() {
            names.push(value.clone());
        }
    }
    found.then_some(names)
}

async fn api_state(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<DashboardState>, StatusCode> {
    let Some(names) = process_override(&params) else {
        let latest = DashboardState::clone(&state.latest.borrow());
        return Ok(Json(latest));
    };

    compute(&state.pipeline, Some(names))
        .await
        .map(Json)
        .map_err(|e| {
            tracing::warn!(error = %e, "dashboard computation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

async fn api_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = WatchStream::new(state.latest.clone())
        .map(|s| Event::default().event("state").json_data(&*s));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn index(State(state): State<AppState>) -> Response {
    match Assets::get("index.html") {
        Some(file) => {
            let html = String::from_utf8_lossy(&file.data)
                .replace("__REFRESH_MS__", &(state.refresh_secs * 1000).to_string());
            Html(html).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn asset(Path(path): Path<String>) -> Response {
    match Assets::get(&path) {
        Some(file) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            (
                [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                file.data.into_owned(),
            )
                .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
