use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::product_review,
    errors::ServiceError,
    services::reviews::{CreateReviewInput, RatingSummary},
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub struct ReviewBody {
    pub rating: i16,
    pub comment: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(body): Json<ReviewBody>,
) -> Result<Json<ApiResponse<product_review::Model>>, ServiceError> {
    let created = state
        .services
        .reviews
        .create(
            user.id,
            CreateReviewInput {
                product_id,
                rating: body.rating,
                comment: body.comment,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(created)))
}

pub async fn list(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<product_review::Model>>>, ServiceError> {
    let reviews = state.services.reviews.list_for_product(product_id).await?;
    Ok(Json(ApiResponse::success(reviews)))
}

pub async fn rating(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<RatingSummary>>, ServiceError> {
    let summary = state.services.reviews.rating_summary(product_id).await?;
    Ok(Json(ApiResponse::success(summary)))
}
