use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::{product, product_image, product_variant},
    errors::ServiceError,
    services::catalog::{
        AddImageInput, CreateProductInput, CreateVariantInput, ProductDetails, ProductSearchQuery,
        ProductSearchResult, UpdateProductInput, UpdateVariantInput,
    },
    ApiResponse, AppState,
};

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<ProductSearchQuery>,
) -> Result<Json<ApiResponse<ProductSearchResult>>, ServiceError> {
    let result = state.services.catalog.search(query).await?;
    Ok(Json(ApiResponse::success(result)))
}

/// Storefront product page lookup; records a product view.
pub async fn get_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<ProductDetails>>, ServiceError> {
    let details = state.services.catalog.find_by_slug(&slug).await?;
    state
        .services
        .analytics
        .record_product_view(details.product.id)
        .await
        .ok();
    Ok(Json(ApiResponse::success(details)))
}

/// Accepts a product id or SKU.
pub async fn get(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<ApiResponse<ProductDetails>>, ServiceError> {
    let product = state.services.catalog.resolve(&identifier).await?;
    let details = state.services.catalog.get_details(product.id).await?;
    Ok(Json(ApiResponse::success(details)))
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateProductInput>,
) -> Result<Json<ApiResponse<product::Model>>, ServiceError> {
    user.require_admin()?;
    let created = state.services.catalog.create_product(input).await?;
    Ok(Json(ApiResponse::success(created)))
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> Result<Json<ApiResponse<product::Model>>, ServiceError> {
    user.require_admin()?;
    let updated = state
        .services
        .catalog
        .update_product(product_id, input)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn activate(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<product::Model>>, ServiceError> {
    user.require_admin()?;
    let updated = state.services.catalog.set_active(product_id, true).await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn deactivate(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<product::Model>>, ServiceError> {
    user.require_admin()?;
    let updated = state.services.catalog.set_active(product_id, false).await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn soft_delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<product::Model>>, ServiceError> {
    user.require_admin()?;
    let deleted = state.services.catalog.soft_delete(product_id).await?;
    Ok(Json(ApiResponse::success(deleted)))
}

pub async fn restore(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<product::Model>>, ServiceError> {
    user.require_admin()?;
    let restored = state.services.catalog.restore(product_id).await?;
    Ok(Json(ApiResponse::success(restored)))
}

pub async fn purge(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    user.require_admin()?;
    state.services.catalog.hard_delete(product_id).await?;
    Ok(Json(ApiResponse::success(())))
}

pub async fn list_deleted(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<product::Model>>>, ServiceError> {
    user.require_admin()?;
    let products = state.services.catalog.list_deleted().await?;
    Ok(Json(ApiResponse::success(products)))
}

pub async fn add_image(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<AddImageInput>,
) -> Result<Json<ApiResponse<product_image::Model>>, ServiceError> {
    user.require_admin()?;
    let image = state.services.catalog.add_image(product_id, input).await?;
    Ok(Json(ApiResponse::success(image)))
}

pub async fn remove_image(
    State(state): State<AppState>,
    user: AuthUser,
    Path(image_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    user.require_admin()?;
    state.services.catalog.remove_image(image_id).await?;
    Ok(Json(ApiResponse::success(())))
}

// ---- variants ----

pub async fn list_variants(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<product_variant::Model>>>, ServiceError> {
    let variants = state.services.catalog.list_variants(product_id).await?;
    Ok(Json(ApiResponse::success(variants)))
}

pub async fn create_variant(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateVariantInput>,
) -> Result<Json<ApiResponse<product_variant::Model>>, ServiceError> {
    user.require_admin()?;
    let created = state.services.catalog.create_variant(input).await?;
    Ok(Json(ApiResponse::success(created)))
}

pub async fn get_variant(
    State(state): State<AppState>,
    Path(variant_id): Path<Uuid>,
) -> Result<Json<ApiResponse<product_variant::Model>>, ServiceError> {
    let variant = state.services.catalog.get_variant(variant_id).await?;
    Ok(Json(ApiResponse::success(variant)))
}

pub async fn update_variant(
    State(state): State<AppState>,
    user: AuthUser,
    Path(variant_id): Path<Uuid>,
    Json(input): Json<UpdateVariantInput>,
) -> Result<Json<ApiResponse<product_variant::Model>>, ServiceError> {
    user.require_admin()?;
    let updated = state
        .services
        .catalog
        .update_variant(variant_id, input)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn delete_variant(
    State(state): State<AppState>,
    user: AuthUser,
    Path(variant_id): Path<Uuid>,
) -> Result<Json<ApiResponse<product_variant::Model>>, ServiceError> {
    user.require_admin()?;
    let deleted = state.services.catalog.soft_delete_variant(variant_id).await?;
    Ok(Json(ApiResponse::success(deleted)))
}
