use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::carts::{CartItem, CartState},
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub struct CartBody {
    pub items: Vec<CartItem>,
    pub session_id: Option<String>,
}

pub async fn get(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Option<CartState>>>, ServiceError> {
    let cart = state.services.carts.get_cart(user.id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

pub async fn put(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CartBody>,
) -> Result<Json<ApiResponse<CartState>>, ServiceError> {
    let cart = state
        .services
        .carts
        .set_cart(user.id, body.items, body.session_id)
        .await?;
    Ok(Json(ApiResponse::success(cart)))
}

pub async fn clear(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.carts.clear_cart(user.id).await?;
    Ok(Json(ApiResponse::success(())))
}

pub async fn add_recent_view(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state
        .services
        .carts
        .add_recent_view(user.id, product_id)
        .await?;
    Ok(Json(ApiResponse::success(())))
}

pub async fn recent_views(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<Uuid>>>, ServiceError> {
    let views = state.services.carts.get_recent_views(user.id).await?;
    Ok(Json(ApiResponse::success(views)))
}
