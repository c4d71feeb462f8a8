use std::sync::Arc;

use axum::extract::{Path, Query, RawQuery, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::store::{now_micros, EntryInput, EntryPage, EntryStore, StoredEntry};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    store: EntryStore,
}

impl AppState {
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        Self {
            store: EntryStore::new(config.sync_window),
            config,
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let entry_routes = Router::new()
        .route("/entries", get(list_entries).post(create_entry))
        .route("/entries/{id}", put(replace_entry).delete(delete_entry))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/todolist", entry_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    entries: usize,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        entries: state.store.live_count().await,
    })
}

async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(expected) = state.config.api_token.as_deref() {
        let presented = bearer_token(request.headers())?;
        if presented != expected {
            return Err(AppError::unauthorized("invalid bearer token"));
        }
    }
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::unauthorized("missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("malformed Authorization header"))?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::unauthorized("expected a bearer token"))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    modified: Option<String>,
}

async fn list_entries(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<EntryPage>, AppError> {
    let since = query
        .modified
        .as_deref()
        .map(|raw| {
            raw.trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| AppError::bad_request(format!("invalid modified value '{raw}'")))
        })
        .transpose()?;

    let page = state.store.list(since, now_micros()).await?;
    tracing::debug!(
        since = ?since,
        count = page.entries.len(),
        "Listed entries"
    );
    Ok(Json(page))
}

/// Fields come from the request body, or the query string when the body is empty
fn entry_input(query: Option<&str>, body: &str) -> Result<EntryInput, AppError> {
    let body = EntryInput::parse(body)?;
    if !body.is_empty() {
        return Ok(body);
    }
    query.map_or_else(|| Ok(EntryInput::default()), EntryInput::parse)
}

async fn create_entry(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    body: String,
) -> Result<(StatusCode, Json<StoredEntry>), AppError> {
    let input = entry_input(query.as_deref(), &body)?;
    let entry = state.store.create(input, now_micros()).await?;
    tracing::info!(entry = entry.id, "Created entry");
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn replace_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    RawQuery(query): RawQuery,
    body: String,
) -> Result<Json<StoredEntry>, AppError> {
    let input = entry_input(query.as_deref(), &body)?;
    let entry = state.store.replace(id, input, now_micros()).await?;
    tracing::info!(entry = entry.id, "Replaced entry");
    Ok(Json(entry))
}

async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<StoredEntry>, AppError> {
    let tombstone = state.store.delete(id, now_micros()).await?;
    tracing::info!(entry = tombstone.id, "Deleted entry");
    Ok(Json(tombstone))
}
