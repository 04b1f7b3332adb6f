use axum::{
    extract::{Query, State},
    response::Json,
};

use crate::{
    auth::AuthUser,
    entities::inventory_log,
    errors::ServiceError,
    services::inventory::{MovementFilter, NewMovement},
    ApiResponse, AppState,
};

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filter): Query<MovementFilter>,
) -> Result<Json<ApiResponse<Vec<inventory_log::Model>>>, ServiceError> {
    user.require_admin()?;
    let entries = state.services.inventory.list(filter).await?;
    Ok(Json(ApiResponse::success(entries)))
}

/// Appends a ledger row without touching stock counters.
pub async fn record(
    State(state): State<AppState>,
    user: AuthUser,
    Json(entry): Json<NewMovement>,
) -> Result<Json<ApiResponse<inventory_log::Model>>, ServiceError> {
    user.require_admin()?;
    let created = state.services.inventory.record(entry).await?;
    Ok(Json(ApiResponse::success(created)))
}

/// Manual stock adjustment: applies the signed quantity and logs it.
pub async fn adjust(
    State(state): State<AppState>,
    user: AuthUser,
    Json(entry): Json<NewMovement>,
) -> Result<Json<ApiResponse<inventory_log::Model>>, ServiceError> {
    user.require_admin()?;
    let created = state.services.inventory.adjust_stock(entry).await?;
    Ok(Json(ApiResponse::success(created)))
}
