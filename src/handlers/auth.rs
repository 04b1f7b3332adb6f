use axum::{
    extract::State,
    http::header,
    http::HeaderMap,
    response::Json,
};

use crate::{
    auth::{AuthResponse, AuthUser, LoginInput, PublicUser, RegisterInput},
    errors::ServiceError,
    ApiResponse, AppState,
};

pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> Result<Json<ApiResponse<AuthResponse>>, ServiceError> {
    let response = state.services.auth.register(input).await?;
    Ok(Json(ApiResponse::success(response)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> Result<Json<ApiResponse<AuthResponse>>, ServiceError> {
    let response = state.services.auth.login(input).await?;
    state
        .services
        .analytics
        .record_user_activity(response.user.id, "logins")
        .await
        .ok();
    Ok(Json(ApiResponse::success(response)))
}

/// Revokes the presented token; subsequent requests with it are rejected.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    _user: AuthUser,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ServiceError::Unauthorized("Missing bearer token".into()))?;

    state.services.auth.revoke_token(token).await?;
    Ok(Json(ApiResponse::success(())))
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<PublicUser>>, ServiceError> {
    let found = state.services.auth.get_user(user.id).await?;
    Ok(Json(ApiResponse::success(found)))
}
