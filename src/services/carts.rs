use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

use crate::{cache::CacheBackend, errors::ServiceError};

const RECENT_VIEWS_LIMIT: usize = 10;
const SESSION_DEFAULT_TTL: Duration = Duration::from_secs(3600);

fn cart_key(user_id: Uuid) -> String {
    format!("user:{user_id}:cart")
}

fn recent_views_key(user_id: Uuid) -> String {
    format!("user:{user_id}:recent_views")
}

fn session_key(session_id: &str) -> String {
    format!("session:{session_id}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartState {
    pub items: Vec<CartItem>,
    pub session_id: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Ephemeral cart, recently-viewed and session state over the cache
/// backend. Everything here expires; the relational store never sees it.
#[derive(Clone)]
pub struct CartSessionService {
    cache: Arc<dyn CacheBackend>,
    cart_ttl: Duration,
}

impl CartSessionService {
    pub fn new(cache: Arc<dyn CacheBackend>, cart_ttl: Duration) -> Self {
        Self { cache, cart_ttl }
    }

    #[instrument(skip(self, items))]
    pub async fn set_cart(
        &self,
        user_id: Uuid,
        items: Vec<CartItem>,
        session_id: Option<String>,
    ) -> Result<CartState, ServiceError> {
        let state = CartState {
            items,
            session_id,
            updated_at: chrono::Utc::now(),
        };
        self.cache
            .set(
                &cart_key(user_id),
                &serde_json::to_string(&state)?,
                Some(self.cart_ttl),
            )
            .await?;
        Ok(state)
    }

    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<Option<CartState>, ServiceError> {
        match self.cache.get(&cart_key(user_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: Uuid) -> Result<(), ServiceError> {
        self.cache.delete(&cart_key(user_id)).await
    }

    /// Pushes a product onto the user's recently-viewed list, de-duplicated
    /// and capped at the ten most recent.
    #[instrument(skip(self))]
    pub async fn add_recent_view(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<(), ServiceError> {
        let mut views = self.get_recent_views(user_id).await?;
        views.retain(|id| *id != product_id);
        views.insert(0, product_id);
        views.truncate(RECENT_VIEWS_LIMIT);

        self.cache
            .set(
                &recent_views_key(user_id),
                &serde_json::to_string(&views)?,
                None,
            )
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_recent_views(&self, user_id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        match self.cache.get(&recent_views_key(user_id)).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    #[instrument(skip(self, data))]
    pub async fn set_session(
        &self,
        session_id: &str,
        data: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<(), ServiceError> {
        self.cache
            .set(
                &session_key(session_id),
                &serde_json::to_string(&data)?,
                Some(ttl.unwrap_or(SESSION_DEFAULT_TTL)),
            )
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_session(
        &self,
        session_id: &str,
    ) -> Result<Option<serde_json::Value>, ServiceError> {
        match self.cache.get(&session_key(session_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_session(&self, session_id: &str) -> Result<(), ServiceError> {
        self.cache.delete(&session_key(session_id)).await
    }
}
