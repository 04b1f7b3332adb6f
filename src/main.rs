use std::{net::SocketAddr, sync::Arc};

use axum::http::HeaderValue;
use axum::Router;
use tokio::signal;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use storefront_api as api;

use api::cache::{CacheBackend, RedisCache};
use api::gateway::{PaymentGateway, StripeGateway};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(&cfg.log_level, cfg.log_json);

    let db = Arc::new(api::db::establish_connection(&cfg).await?);

    let redis_client = Arc::new(redis::Client::open(cfg.redis_url.clone())?);
    let cache: Arc<dyn CacheBackend> = Arc::new(RedisCache::new(redis_client));

    let gateway: Arc<dyn PaymentGateway> = match cfg.stripe_secret_key.clone() {
        Some(secret_key) => Arc::new(StripeGateway::new(secret_key)),
        None => {
            warn!("no gateway secret configured; payment intents will fail until one is set");
            Arc::new(StripeGateway::new(String::new()))
        }
    };

    let (event_sender, event_rx) = api::events::channel(1024);
    tokio::spawn(api::events::process_events(event_rx));

    let services = api::handlers::AppServices::new(
        db.clone(),
        cache.clone(),
        gateway,
        Arc::new(event_sender.clone()),
        &cfg,
    );

    let state = api::AppState {
        db,
        config: cfg.clone(),
        cache,
        event_sender,
        services,
    };

    let cors_layer = match cfg.cors_allowed_origins.as_deref() {
        Some(raw) => {
            let origins: Vec<HeaderValue> = raw
                .split(',')
                .filter_map(|origin| HeaderValue::from_str(origin.trim()).ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None if cfg.is_development() => CorsLayer::permissive(),
        None => anyhow::bail!(
            "missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS in production"
        ),
    };

    let app = Router::new()
        .nest("/api/v1", api::api_v1_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors_layer)
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    info!(%addr, "storefront-api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
