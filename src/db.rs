use crate::config::AppConfig;
use crate::errors::ServiceError;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::{info, warn};

/// Type alias for the shared database connection pool.
pub type DbPool = DatabaseConnection;

/// Establishes a connection pool from the application configuration,
/// retrying with a fixed delay while the database comes up.
pub async fn establish_connection(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let mut opt = ConnectOptions::new(cfg.database_url.clone());
    opt.max_connections(cfg.db_max_connections)
        .min_connections(cfg.db_min_connections)
        .connect_timeout(Duration::from_secs(cfg.db_connect_timeout_secs))
        .sqlx_logging(false);

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match Database::connect(opt.clone()).await {
            Ok(pool) => {
                info!(attempt, "database connection established");
                return Ok(pool);
            }
            Err(err) if attempt < cfg.db_connect_retries => {
                warn!(attempt, error = %err, "database connection failed, retrying");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
            Err(err) => return Err(ServiceError::DatabaseError(err)),
        }
    }
}
