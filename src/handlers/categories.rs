use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::category,
    errors::ServiceError,
    services::categories::CreateCategoryInput,
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub parent_id: Option<Uuid>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ApiResponse<Vec<category::Model>>>, ServiceError> {
    let categories = state.services.categories.list(params.parent_id).await?;
    Ok(Json(ApiResponse::success(categories)))
}

pub async fn get(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
) -> Result<Json<ApiResponse<category::Model>>, ServiceError> {
    let category = state.services.categories.get(category_id).await?;
    Ok(Json(ApiResponse::success(category)))
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateCategoryInput>,
) -> Result<Json<ApiResponse<category::Model>>, ServiceError> {
    user.require_admin()?;
    let created = state.services.categories.create(input).await?;
    Ok(Json(ApiResponse::success(created)))
}

pub async fn activate(
    State(state): State<AppState>,
    user: AuthUser,
    Path(category_id): Path<Uuid>,
) -> Result<Json<ApiResponse<category::Model>>, ServiceError> {
    user.require_admin()?;
    let updated = state.services.categories.activate(category_id).await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn deactivate(
    State(state): State<AppState>,
    user: AuthUser,
    Path(category_id): Path<Uuid>,
) -> Result<Json<ApiResponse<category::Model>>, ServiceError> {
    user.require_admin()?;
    let updated = state.services.categories.deactivate(category_id).await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(category_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    user.require_admin()?;
    state.services.categories.delete(category_id).await?;
    Ok(Json(ApiResponse::success(())))
}

pub async fn check_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<Value>>, ServiceError> {
    let available = state.services.categories.check_slug(&slug).await?;
    Ok(Json(ApiResponse::success(json!({ "available": available }))))
}
