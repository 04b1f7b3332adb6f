use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::orders::{CreateOrderInput, OrderDetails, OrderItemInput, OrderListPage},
    ApiResponse, AppState, ListQuery,
};

/// Checkout payload; the authenticated caller becomes the order's owner.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemInput>,
    pub shipping_address: Value,
    pub billing_address: Value,
    pub notes: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<ApiResponse<OrderDetails>>, ServiceError> {
    let details = state
        .services
        .orders
        .create(CreateOrderInput {
            user_id: user.id,
            items: request.items,
            shipping_address: request.shipping_address,
            billing_address: request.billing_address,
            notes: request.notes,
        })
        .await?;

    for item in &details.items {
        state
            .services
            .analytics
            .record_product_purchase(item.product_id, item.quantity)
            .await
            .ok();
    }
    state
        .services
        .analytics
        .record_user_activity(user.id, "orders")
        .await
        .ok();

    Ok(Json(ApiResponse::success(details)))
}

pub async fn get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderDetails>>, ServiceError> {
    let details = state.services.orders.get(order_id).await?;
    if details.order.user_id != user.id && !user.is_admin() {
        return Err(ServiceError::Forbidden("not your order".into()));
    }
    Ok(Json(ApiResponse::success(details)))
}

/// The calling user's own orders.
pub async fn list_mine(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<OrderDetails>>>, ServiceError> {
    let orders = state.services.orders.list_for_user(user.id).await?;
    Ok(Json(ApiResponse::success(orders)))
}

pub async fn list_all(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<OrderListPage>>, ServiceError> {
    user.require_admin()?;
    let page = state.services.orders.list(query.page, query.limit).await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn cancel(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderDetails>>, ServiceError> {
    let details = state.services.orders.get(order_id).await?;
    if details.order.user_id != user.id && !user.is_admin() {
        return Err(ServiceError::Forbidden("not your order".into()));
    }
    let cancelled = state.services.orders.cancel(order_id).await?;
    Ok(Json(ApiResponse::success(cancelled)))
}
