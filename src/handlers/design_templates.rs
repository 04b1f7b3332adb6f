use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::design_template,
    errors::ServiceError,
    services::design_templates::{CreateTemplateInput, TemplateDetails, UpdateTemplateInput},
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub featured: bool,
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ApiResponse<Vec<design_template::Model>>>, ServiceError> {
    let templates = state.services.templates.list(params.featured).await?;
    Ok(Json(ApiResponse::success(templates)))
}

pub async fn get(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
) -> Result<Json<ApiResponse<TemplateDetails>>, ServiceError> {
    let details = state.services.templates.get(template_id).await?;
    state
        .services
        .analytics
        .record_template_view(template_id)
        .await
        .ok();
    Ok(Json(ApiResponse::success(details)))
}

pub async fn get_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<TemplateDetails>>, ServiceError> {
    let details = state.services.templates.find_by_slug(&slug).await?;
    state
        .services
        .analytics
        .record_template_view(details.template.id)
        .await
        .ok();
    Ok(Json(ApiResponse::success(details)))
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateTemplateInput>,
) -> Result<Json<ApiResponse<TemplateDetails>>, ServiceError> {
    user.require_admin()?;
    let created = state.services.templates.create(input).await?;
    Ok(Json(ApiResponse::success(created)))
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(template_id): Path<Uuid>,
    Json(input): Json<UpdateTemplateInput>,
) -> Result<Json<ApiResponse<design_template::Model>>, ServiceError> {
    user.require_admin()?;
    let updated = state.services.templates.update(template_id, input).await?;
    Ok(Json(ApiResponse::success(updated)))
}
