use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::payment,
    errors::ServiceError,
    services::payments::{CreatedPayment, PaymentListPage},
    ApiResponse, AppState, ListQuery,
};

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: Uuid,
    pub currency: String,
    pub customer_email: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    pub gateway_payment_id: String,
    pub amount: Option<Decimal>,
}

/// Creates a gateway intent for the order; the amount always derives from
/// the order total.
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<ApiResponse<CreatedPayment>>, ServiceError> {
    let order = state.services.orders.get(request.order_id).await?;
    if order.order.user_id != user.id && !user.is_admin() {
        return Err(ServiceError::Forbidden("not your order".into()));
    }

    let created = state
        .services
        .payments
        .create_payment(
            request.order_id,
            request.currency,
            request.customer_email.or(Some(user.email)),
            request.metadata,
        )
        .await?;
    Ok(Json(ApiResponse::success(created)))
}

pub async fn get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<ApiResponse<payment::Model>>, ServiceError> {
    user.require_admin()?;
    let found = state.services.payments.get(payment_id).await?;
    Ok(Json(ApiResponse::success(found)))
}

pub async fn list_for_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<payment::Model>>>, ServiceError> {
    let order = state.services.orders.get(order_id).await?;
    if order.order.user_id != user.id && !user.is_admin() {
        return Err(ServiceError::Forbidden("not your order".into()));
    }
    let payments = state.services.payments.list_for_order(order_id).await?;
    Ok(Json(ApiResponse::success(payments)))
}

pub async fn list_all(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<PaymentListPage>>, ServiceError> {
    user.require_admin()?;
    let page = state.services.payments.list(query.page, query.limit).await?;
    Ok(Json(ApiResponse::success(page)))
}

pub async fn refund(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<RefundRequest>,
) -> Result<Json<ApiResponse<payment::Model>>, ServiceError> {
    user.require_admin()?;
    let refunded = state
        .services
        .payments
        .refund_payment(&request.gateway_payment_id, request.amount)
        .await?;
    Ok(Json(ApiResponse::success(refunded)))
}
