use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    auth::AuthService,
    cache::CacheBackend,
    config::AppConfig,
    events::EventSender,
    gateway::PaymentGateway,
    services::{
        analytics::AnalyticsService, carts::CartSessionService, catalog::ProductCatalogService,
        categories::CategoryService, design_templates::DesignTemplateService,
        inventory::InventoryLogService, orders::OrderService,
        payments::{PaymentService, RefundCancelPolicy}, reviews::ProductReviewService,
        wishlist::WishlistService,
    },
};

pub mod auth;
pub mod carts;
pub mod categories;
pub mod design_templates;
pub mod inventory;
pub mod orders;
pub mod payment_webhooks;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod wishlist;

/// Aggregated workflow services shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub auth: Arc<AuthService>,
    pub catalog: Arc<ProductCatalogService>,
    pub categories: Arc<CategoryService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub inventory: Arc<InventoryLogService>,
    pub reviews: Arc<ProductReviewService>,
    pub wishlist: Arc<WishlistService>,
    pub templates: Arc<DesignTemplateService>,
    pub carts: Arc<CartSessionService>,
    pub analytics: Arc<AnalyticsService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        cache: Arc<dyn CacheBackend>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: Arc<EventSender>,
        cfg: &AppConfig,
    ) -> Self {
        let orders = Arc::new(OrderService::new(db.clone(), event_sender.clone()));
        let payments = Arc::new(PaymentService::new(
            db.clone(),
            gateway,
            cache.clone(),
            orders.clone(),
            event_sender.clone(),
            RefundCancelPolicy::parse(&cfg.refund_cancel_policy),
        ));
        let auth = Arc::new(AuthService::new(
            db.clone(),
            cache.clone(),
            event_sender.clone(),
            cfg.jwt_secret.clone(),
            Duration::from_secs(cfg.jwt_expiration_secs),
        ));

        Self {
            auth,
            catalog: Arc::new(ProductCatalogService::new(db.clone(), event_sender.clone())),
            categories: Arc::new(CategoryService::new(db.clone(), event_sender.clone())),
            orders,
            payments,
            inventory: Arc::new(InventoryLogService::new(db.clone(), event_sender.clone())),
            reviews: Arc::new(ProductReviewService::new(db.clone())),
            wishlist: Arc::new(WishlistService::new(db.clone())),
            templates: Arc::new(DesignTemplateService::new(db, event_sender)),
            carts: Arc::new(CartSessionService::new(
                cache.clone(),
                Duration::from_secs(cfg.cart_ttl_secs),
            )),
            analytics: Arc::new(AnalyticsService::new(cache)),
        }
    }
}
