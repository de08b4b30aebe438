//! Order route handlers.
//!
//! Orders are placed with a JSON body; admin routes list, inspect, change the
//! status of and delete them.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use tracing::instrument;

use showcase_core::OrderId;

use crate::db::OrderRepository;
use crate::error::AppError;
use crate::models::{NewOrder, Order, OrderFilter, Page, StatusUpdate};
use crate::state::AppState;

/// Build the orders router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", get(list).post(create))
        .route("/api/orders/{id}", get(show).delete(delete))
        .route("/api/orders/{id}/status", put(update_status))
}

/// Place an order.
#[instrument(skip_all, fields(items = order.items.len()))]
pub async fn create(
    State(state): State<AppState>,
    Json(order): Json<NewOrder>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let order = order.normalized();
    order.validate()?;

    let repo = OrderRepository::new(state.storage());
    let order = repo.create(order).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// List orders, newest first, optionally filtered by status.
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Page<Order>>, AppError> {
    let repo = OrderRepository::new(state.storage());
    Ok(Json(repo.find_all(&filter).await?))
}

/// Get one order with its items.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    let repo = OrderRepository::new(state.storage());
    repo.find_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

/// Overwrite an order's status.
#[instrument(skip(state))]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Order>, AppError> {
    let repo = OrderRepository::new(state.storage());
    Ok(Json(repo.update_status(id, update.status).await?))
}

/// Delete an order and its items.
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<StatusCode, AppError> {
    OrderRepository::new(state.storage()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
