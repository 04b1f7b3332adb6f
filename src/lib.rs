//! storefront-api library
//!
//! E-commerce backend: auth, catalog, inventory ledger, orders, payments,
//! reviews, wishlists and design-template bundles.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod services;
pub mod slug;

use axum::{
    extract::State,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use cache::CacheBackend;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub cache: Arc<dyn CacheBackend>,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Common query parameters for paginated list endpoints.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

/// Standard JSON envelope for successful responses.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Full v1 API surface. The payment webhook stays outside the auth
/// extractors; signature verification guards it instead.
pub fn api_v1_routes() -> Router<AppState> {
    let auth_routes = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me));

    let product_routes = Router::new()
        .route("/products", get(handlers::products::search))
        .route("/products", post(handlers::products::create))
        .route("/products/deleted", get(handlers::products::list_deleted))
        .route("/products/slug/:slug", get(handlers::products::get_by_slug))
        .route("/products/:id", get(handlers::products::get))
        .route("/products/:id", put(handlers::products::update))
        .route("/products/:id", delete(handlers::products::soft_delete))
        .route("/products/:id/activate", post(handlers::products::activate))
        .route(
            "/products/:id/deactivate",
            post(handlers::products::deactivate),
        )
        .route("/products/:id/restore", post(handlers::products::restore))
        .route("/products/:id/purge", delete(handlers::products::purge))
        .route("/products/:id/images", post(handlers::products::add_image))
        .route(
            "/products/:id/variants",
            get(handlers::products::list_variants),
        )
        .route(
            "/product-images/:id",
            delete(handlers::products::remove_image),
        )
        .route(
            "/product-variants",
            post(handlers::products::create_variant),
        )
        .route(
            "/product-variants/:id",
            get(handlers::products::get_variant),
        )
        .route(
            "/product-variants/:id",
            put(handlers::products::update_variant),
        )
        .route(
            "/product-variants/:id",
            delete(handlers::products::delete_variant),
        );

    let category_routes = Router::new()
        .route("/categories", get(handlers::categories::list))
        .route("/categories", post(handlers::categories::create))
        .route(
            "/categories/check-slug/:slug",
            get(handlers::categories::check_slug),
        )
        .route("/categories/:id", get(handlers::categories::get))
        .route("/categories/:id", delete(handlers::categories::delete))
        .route(
            "/categories/:id/activate",
            post(handlers::categories::activate),
        )
        .route(
            "/categories/:id/deactivate",
            post(handlers::categories::deactivate),
        );

    let order_routes = Router::new()
        .route("/orders", post(handlers::orders::create))
        .route("/orders", get(handlers::orders::list_all))
        .route("/orders/me", get(handlers::orders::list_mine))
        .route("/orders/:id", get(handlers::orders::get))
        .route("/orders/:id/cancel", post(handlers::orders::cancel));

    let payment_routes = Router::new()
        .route("/payments", post(handlers::payments::create))
        .route("/payments", get(handlers::payments::list_all))
        .route("/payments/refund", post(handlers::payments::refund))
        .route(
            "/payments/webhook",
            post(handlers::payment_webhooks::payment_webhook),
        )
        .route("/payments/:id", get(handlers::payments::get))
        .route(
            "/payments/order/:order_id",
            get(handlers::payments::list_for_order),
        );

    let inventory_routes = Router::new()
        .route("/inventory-logs", get(handlers::inventory::list))
        .route("/inventory-logs", post(handlers::inventory::record))
        .route("/inventory-logs/adjust", post(handlers::inventory::adjust));

    let review_routes = Router::new()
        .route(
            "/products/:id/reviews",
            post(handlers::reviews::create),
        )
        .route("/products/:id/reviews", get(handlers::reviews::list))
        .route("/products/:id/rating", get(handlers::reviews::rating));

    let wishlist_routes = Router::new()
        .route("/wishlist", get(handlers::wishlist::list))
        .route("/wishlist/:product_id", post(handlers::wishlist::add))
        .route("/wishlist/:product_id", delete(handlers::wishlist::remove));

    let template_routes = Router::new()
        .route("/design-templates", get(handlers::design_templates::list))
        .route("/design-templates", post(handlers::design_templates::create))
        .route(
            "/design-templates/slug/:slug",
            get(handlers::design_templates::get_by_slug),
        )
        .route("/design-templates/:id", get(handlers::design_templates::get))
        .route(
            "/design-templates/:id",
            put(handlers::design_templates::update),
        );

    let cart_routes = Router::new()
        .route("/cart", get(handlers::carts::get))
        .route("/cart", put(handlers::carts::put))
        .route("/cart", delete(handlers::carts::clear))
        .route("/recent-views", get(handlers::carts::recent_views))
        .route(
            "/recent-views/:product_id",
            post(handlers::carts::add_recent_view),
        );

    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .merge(auth_routes)
        .merge(product_routes)
        .merge(category_routes)
        .merge(order_routes)
        .merge(payment_routes)
        .merge(inventory_routes)
        .merge(review_routes)
        .merge(wishlist_routes)
        .merge(template_routes)
        .merge(cart_routes)
}

async fn api_status() -> Json<ApiResponse<Value>> {
    let status = json!({
        "status": "ok",
        "service": "storefront-api",
        "version": env!("CARGO_PKG_VERSION"),
    });
    Json(ApiResponse::success(status))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };
    let cache_status = match state.cache.exists("health:probe").await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let healthy = db_status == "healthy" && cache_status == "healthy";
    let health = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "checks": {
            "database": db_status,
            "cache": cache_status,
        },
    });
    Ok(Json(ApiResponse::success(health)))
}
