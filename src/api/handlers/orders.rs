use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{CreateOrderRequest, Order, UpdateOrderStatusRequest},
    error::Result,
};

pub async fn create(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = state.service_context.order_service
        .create_order(current_user.user.id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<Vec<Order>>> {
    let orders = state.service_context.order_service
        .list_for_user(current_user.user.id)
        .await?;
    Ok(Json(orders))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>> {
    let order = state.service_context.order_service
        .get_order(id, &current_user.user)
        .await?;
    Ok(Json(order))
}

// Admin

pub async fn list_all(State(state): State<AppState>) -> Result<Json<Vec<Order>>> {
    let orders = state.service_context.order_service
        .list_all()
        .await?;
    Ok(Json(orders))
}

pub async fn list_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> Result<Json<Vec<Order>>> {
    let orders = state.service_context.order_service
        .list_by_status(&status)
        .await?;
    Ok(Json(orders))
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> Result<Json<Order>> {
    tracing::debug!(
        order_id = %req.order_id,
        admin_id = %current_user.user.id,
        status = %req.status,
        "Admin status update requested"
    );
    let order = state.service_context.order_service
        .update_status(req.order_id, &req.status, current_user.user.id)
        .await?;
    Ok(Json(order))
}
