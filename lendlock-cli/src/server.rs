use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;

use lendlock_core::audit::AuditReport;
use lendlock_core::client::LendingClient;
use lendlock_core::types::{Item, ItemId, Reservation};

use crate::handlers::*;

/// The client holds no locks of its own, so requests share it directly.
pub type AppState = Arc<LendingClient>;

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

pub async fn run(
    host: &str,
    port: u16,
    max_concurrency: usize,
    client: LendingClient,
) -> std::io::Result<()> {
    let state: AppState = Arc::new(client);

    let app = router(state, max_concurrency);
    let addr = format!("{}:{}", host, port);

    if std::env::var("LENDLOCK_API_KEY").is_ok() {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!("no LENDLOCK_API_KEY set, server is open (dev mode)");
    }

    tracing::info!("lendlock server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}

pub fn router(state: AppState, max_concurrency: usize) -> Router {
    Router::new()
        // Health is always open (no auth)
        .route("/health", get(health))
        // Protected routes
        .route("/items", post(add_item).get(list_items))
        .route("/holders", post(register_holder))
        .route("/holders/{name}/reservations", get(holder_reservations))
        .route("/reservations", post(reserve))
        .route("/reservations/{holder}/{item_id}", delete(release))
        .route("/reservations/{holder}/{item_id}/prolong", post(prolong))
        .route("/audit", get(audit))
        .layer(middleware::from_fn(auth_middleware))
        .layer(CorsLayer::permissive())
        .layer(ConcurrencyLimitLayer::new(max_concurrency.max(1)))
        .with_state(state)
}

/// Coordinator calls block on store I/O, so they run off the async workers.
async fn blocking<T, F>(state: &AppState, work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&LendingClient) -> lendlock_core::Result<T> + Send + 'static,
{
    let client = state.clone();
    tokio::task::spawn_blocking(move || work(&client))
        .await
        .map_err(|e| ApiError::internal(format!("worker failed: {}", e)))?
        .map_err(ApiError::from)
}

// ─── Auth Middleware ────────────────────────────────────────────────────────

async fn auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // If no API key is configured, allow all requests (dev mode)
    let expected_key = match std::env::var("LENDLOCK_API_KEY") {
        Ok(key) if !key.is_empty() => key,
        _ => return Ok(next.run(request).await),
    };

    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    if token == expected_key {
        Ok(next.run(request).await)
    } else {
        tracing::warn!("unauthorized request to {}", request.uri().path());
        Err(StatusCode::UNAUTHORIZED)
    }
}

// ─── Handlers ───────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        max_quota: state.config().max_quota,
    }))
}

async fn add_item(
    State(state): State<AppState>,
    Json(req): Json<AddItemRequest>,
) -> ApiResult<Item> {
    req.validate().map_err(ApiError::bad_request)?;
    let item = blocking(&state, move |client| client.add_item(&req.title, &req.author)).await?;
    tracing::info!(item_id = %item.id, title = %item.title, "item added");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(item))))
}

async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ItemsQuery>,
) -> ApiResult<Vec<Item>> {
    let items = blocking(&state, move |client| match query.title {
        Some(title) => client.find_items(&title),
        None => client.catalog().list_items(),
    })
    .await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(items))))
}

async fn register_holder(
    State(state): State<AppState>,
    Json(req): Json<RegisterHolderRequest>,
) -> ApiResult<HolderResponse> {
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }
    let name = req.name.clone();
    let created = blocking(&state, move |client| client.register_holder(&req.name)).await?;
    let status = if created {
        tracing::info!(holder = %name, "holder registered");
        StatusCode::CREATED
    } else {
        StatusCode::CONFLICT
    };
    Ok((status, Json(ApiResponse::ok(HolderResponse { name, created }))))
}

async fn holder_reservations(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Vec<Reservation>> {
    let held = blocking(&state, move |client| {
        Ok(match client.catalog().get_holder(&name)? {
            Some(_) => Some(client.reservations_of(&name)?),
            None => None,
        })
    })
    .await?;
    match held {
        Some(reservations) => Ok((StatusCode::OK, Json(ApiResponse::ok(reservations)))),
        None => Err(ApiError::not_found("no such holder")),
    }
}

async fn reserve(
    State(state): State<AppState>,
    Json(req): Json<ReserveRequest>,
) -> ApiResult<OutcomeResponse> {
    req.validate().map_err(ApiError::bad_request)?;
    let outcome = blocking(&state, move |client| {
        client.reserve(
            &req.holder,
            &ItemId::new(req.item_id),
            &req.item_title,
            req.due_at,
        )
    })
    .await?;
    Ok(outcome_response(outcome, StatusCode::CREATED))
}

async fn release(
    State(state): State<AppState>,
    Path((holder, item_id)): Path<(String, String)>,
    Query(query): Query<ReleaseQuery>,
) -> ApiResult<OutcomeResponse> {
    let outcome = blocking(&state, move |client| {
        let item_id = ItemId::new(item_id);
        // Without a title, fall back to the one stored on the reservation.
        let title = match query.title {
            Some(title) => title,
            None => client
                .catalog()
                .get_reservation(&holder, &item_id)?
                .map(|r| r.item_title)
                .unwrap_or_default(),
        };
        client.release(&holder, &item_id, &title)
    })
    .await?;
    Ok(outcome_response(outcome, StatusCode::OK))
}

async fn prolong(
    State(state): State<AppState>,
    Path((holder, item_id)): Path<(String, String)>,
    Json(req): Json<ProlongRequest>,
) -> ApiResult<OutcomeResponse> {
    req.validate().map_err(ApiError::bad_request)?;
    let outcome = blocking(&state, move |client| {
        client.prolong(&holder, &ItemId::new(item_id), req.due_at)
    })
    .await?;
    Ok(outcome_response(outcome, StatusCode::OK))
}

async fn audit(State(state): State<AppState>) -> ApiResult<AuditReport> {
    let report = blocking(&state, |client| client.audit()).await?;
    let status = if report.is_clean() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(ApiResponse::ok(report))))
}
