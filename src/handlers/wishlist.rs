use axum::{
    extract::{Path, State},
    response::Json,
};
use uuid::Uuid;

use crate::{auth::AuthUser, entities::product, errors::ServiceError, ApiResponse, AppState};

pub async fn add(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.wishlist.add(user.id, product_id).await?;
    Ok(Json(ApiResponse::success(())))
}

pub async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.wishlist.remove(user.id, product_id).await?;
    Ok(Json(ApiResponse::success(())))
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<product::Model>>>, ServiceError> {
    let products = state.services.wishlist.list(user.id).await?;
    Ok(Json(ApiResponse::success(products)))
}
