// Shared between integration test binaries; not every binary uses every helper.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Alias, ColumnDef, ColumnSpec, ColumnType, TableCreateStatement};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, Schema};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use storefront_api::{
    auth::RegisterInput,
    cache::InMemoryCache,
    config::AppConfig,
    entities,
    entities::{product::ProductType, user::UserRole},
    errors::ServiceError,
    events,
    gateway::{CreateIntentParams, GatewayPaymentIntent, GatewayRefund, PaymentGateway},
    handlers::AppServices,
    services::catalog::{CreateProductInput, CreateVariantInput},
    AppState,
};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Payment gateway double backed by an in-memory intent store. Tests move
/// intents through the gateway state machine with `set_intent_status`.
#[derive(Default)]
pub struct MockGateway {
    intents: Mutex<HashMap<String, GatewayPaymentIntent>>,
    counter: Mutex<u64>,
}

impl MockGateway {
    pub fn set_intent_status(&self, intent_id: &str, status: &str) {
        let mut intents = self.intents.lock().unwrap();
        if let Some(intent) = intents.get_mut(intent_id) {
            intent.status = status.to_string();
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn create_intent(
        &self,
        params: CreateIntentParams,
    ) -> Result<GatewayPaymentIntent, ServiceError> {
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        let id = format!("pi_test_{counter}");

        let mut metadata = params.metadata;
        metadata.insert("order_id".to_string(), params.order_id.to_string());

        let intent = GatewayPaymentIntent {
            id: id.clone(),
            status: "requires_payment_method".to_string(),
            client_secret: Some(format!("{id}_secret")),
            amount: params.amount_minor,
            currency: params.currency.to_lowercase(),
            metadata,
            last_payment_error: None,
        };
        self.intents.lock().unwrap().insert(id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<GatewayPaymentIntent, ServiceError> {
        self.intents
            .lock()
            .unwrap()
            .get(intent_id)
            .cloned()
            .ok_or_else(|| ServiceError::ExternalServiceError("no such intent".into()))
    }

    async fn refund(
        &self,
        intent_id: &str,
        amount_minor: Option<i64>,
    ) -> Result<GatewayRefund, ServiceError> {
        let intents = self.intents.lock().unwrap();
        let intent = intents
            .get(intent_id)
            .ok_or_else(|| ServiceError::ExternalServiceError("no such intent".into()))?;
        Ok(GatewayRefund {
            id: format!("re_{intent_id}"),
            amount: amount_minor.unwrap_or(intent.amount),
            status: "succeeded".to_string(),
        })
    }
}

/// Application harness on in-memory SQLite with schema built from the
/// entity definitions.
pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<MockGateway>,
    router: Router,
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        redis_url: "redis://127.0.0.1:6379".into(),
        jwt_secret: "test_secret_key_for_testing_only_32_chars!".into(),
        jwt_expiration_secs: 3600,
        host: "127.0.0.1".into(),
        port: 0,
        environment: "test".into(),
        log_level: "warn".into(),
        log_json: false,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 5,
        db_connect_retries: 1,
        cors_allowed_origins: None,
        stripe_secret_key: Some("sk_test".into()),
        stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
        webhook_tolerance_secs: 300,
        refund_cancel_policy: "full-refund".into(),
        cart_ttl_secs: 3600,
    }
}

/// sea-query's SQLite table builder panics when a `DECIMAL` column declares a
/// precision larger than 16, but the production Postgres schema uses
/// `DECIMAL(19, 4)` for money columns. SQLite is dynamically typed and ignores
/// the precision/scale hint entirely, so for the in-memory test database we
/// rebuild any over-precise decimal column without the hint. Every other
/// column, constraint, index, and foreign key is copied verbatim, and tables
/// that contain no such column are left untouched.
fn sqlite_safe_table(src: &TableCreateStatement) -> TableCreateStatement {
    let over_precise = |col: &ColumnDef| {
        matches!(col.get_column_type(), Some(ColumnType::Decimal(Some((p, _)))) if *p > 16)
    };

    if !src.get_columns().iter().any(over_precise) {
        return src.clone();
    }

    let mut out = TableCreateStatement::new();
    if let Some(table) = src.get_table_name() {
        out.table(table.clone());
    }
    for col in src.get_columns() {
        if over_precise(col) {
            let mut rebuilt =
                ColumnDef::new_with_type(Alias::new(col.get_column_name()), ColumnType::Decimal(None));
            for spec in col.get_column_spec() {
                match spec {
                    ColumnSpec::Null => {
                        rebuilt.null();
                    }
                    ColumnSpec::NotNull => {
                        rebuilt.not_null();
                    }
                    ColumnSpec::UniqueKey => {
                        rebuilt.unique_key();
                    }
                    ColumnSpec::PrimaryKey => {
                        rebuilt.primary_key();
                    }
                    ColumnSpec::AutoIncrement => {
                        rebuilt.auto_increment();
                    }
                    ColumnSpec::Default(expr) => {
                        rebuilt.default(expr.clone());
                    }
                    _ => {}
                }
            }
            out.col(&mut rebuilt);
        } else {
            out.col(&mut col.clone());
        }
    }
    for fk in src.get_foreign_key_create_stmts() {
        out.foreign_key(&mut fk.clone());
    }
    for idx in src.get_indexes() {
        out.index(&mut idx.clone());
    }
    out
}

impl TestApp {
    pub async fn new() -> Self {
        let cfg = test_config();

        // A single pooled connection keeps the in-memory database alive and
        // shared for the whole test.
        let mut options = ConnectOptions::new(cfg.database_url.clone());
        options
            .max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);
        let db = Database::connect(options)
            .await
            .expect("failed to open in-memory database");

        let backend = db.get_database_backend();
        let schema = Schema::new(backend);
        macro_rules! create_table {
            ($entity:expr) => {
                db.execute(backend.build(&sqlite_safe_table(
                    &schema.create_table_from_entity($entity),
                )))
                .await
                .expect("failed to create table");
            };
        }
        create_table!(entities::User);
        create_table!(entities::Category);
        create_table!(entities::Product);
        create_table!(entities::ProductCategory);
        create_table!(entities::ProductImage);
        create_table!(entities::ProductVariant);
        create_table!(entities::Order);
        create_table!(entities::OrderItem);
        create_table!(entities::Payment);
        create_table!(entities::InventoryLog);
        create_table!(entities::ProductReview);
        create_table!(entities::WishlistItem);
        create_table!(entities::DesignTemplate);
        create_table!(entities::DesignTemplateItem);

        let db = Arc::new(db);
        let cache = Arc::new(InMemoryCache::new());
        let gateway = Arc::new(MockGateway::default());

        let (event_sender, event_rx) = events::channel(256);
        tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(
            db.clone(),
            cache.clone(),
            gateway.clone(),
            Arc::new(event_sender.clone()),
            &cfg,
        );

        let state = AppState {
            db,
            config: cfg,
            cache,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", storefront_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            state,
            gateway,
            router,
        }
    }

    /// Registers a user directly through the auth service, returning the
    /// session token and user id.
    pub async fn register_user(&self, email: &str, role: UserRole) -> (String, Uuid) {
        let response = self
            .state
            .services
            .auth
            .register(RegisterInput {
                email: email.to_string(),
                password: "a-long-password".to_string(),
                full_name: "Test User".to_string(),
                phone: None,
                role: Some(role),
            })
            .await
            .expect("registration failed");
        (response.token, response.user.id)
    }

    pub async fn seed_simple_product(&self, name: &str, sku: &str, price: Decimal, stock: i32) -> Uuid {
        self.state
            .services
            .catalog
            .create_product(CreateProductInput {
                name: name.to_string(),
                sku: sku.to_string(),
                slug: None,
                description: None,
                product_type: ProductType::Simple,
                base_price: Some(price),
                stock: Some(stock),
                min_stock: None,
                attributes: None,
                categories: vec![],
            })
            .await
            .expect("failed to seed product")
            .id
    }

    /// Seeds a VARIABLE product with one variant, returning (product, variant).
    pub async fn seed_variant_product(
        &self,
        name: &str,
        sku: &str,
        price: Decimal,
        stock: i32,
    ) -> (Uuid, Uuid) {
        let product_id = self
            .state
            .services
            .catalog
            .create_product(CreateProductInput {
                name: name.to_string(),
                sku: sku.to_string(),
                slug: None,
                description: None,
                product_type: ProductType::Variable,
                base_price: None,
                stock: None,
                min_stock: None,
                attributes: None,
                categories: vec![],
            })
            .await
            .expect("failed to seed product")
            .id;

        let variant_id = self
            .state
            .services
            .catalog
            .create_variant(CreateVariantInput {
                product_id,
                sku_suffix: "VAR-1".to_string(),
                price,
                stock: Some(stock),
                min_stock: None,
                attributes: Some(json!({"color": "oak"})),
            })
            .await
            .expect("failed to seed variant")
            .id;

        (product_id, variant_id)
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        };
        (status, value)
    }

    /// Sends a signed webhook event through the HTTP surface.
    pub async fn send_webhook(&self, event: &Value) -> (StatusCode, Value) {
        let payload = event.to_string();
        let timestamp = chrono::Utc::now().timestamp();
        let signature = sign_webhook(WEBHOOK_SECRET, timestamp, payload.as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/payments/webhook")
            .header(header::CONTENT_TYPE, "application/json")
            .header("Stripe-Signature", format!("t={timestamp},v1={signature}"))
            .body(Body::from(payload))
            .expect("failed to build webhook request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("webhook request failed");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body");
        let value = serde_json::from_slice(&bytes)
            .unwrap_or(Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }
}

pub fn sign_webhook(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}
