use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{cache::CacheBackend, errors::ServiceError};

const PRODUCT_PREFIX: &str = "analytics:product:";
const USER_PREFIX: &str = "analytics:user:";
const TEMPLATE_PREFIX: &str = "analytics:template:";

/// Upsert-only insight documents keyed by product, user or template id.
/// Documents are JSON blobs merged read-modify-write; an absent document
/// is treated as empty.
#[derive(Clone)]
pub struct AnalyticsService {
    store: Arc<dyn CacheBackend>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn CacheBackend>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn record_product_view(&self, product_id: Uuid) -> Result<(), ServiceError> {
        self.bump(&format!("{PRODUCT_PREFIX}{product_id}"), "views")
            .await
    }

    #[instrument(skip(self))]
    pub async fn record_product_purchase(
        &self,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        let key = format!("{PRODUCT_PREFIX}{product_id}");
        let mut doc = self.load(&key).await?;
        let purchases = doc["purchases"].as_i64().unwrap_or(0) + quantity as i64;
        doc["purchases"] = json!(purchases);
        doc["last_seen"] = json!(chrono::Utc::now().to_rfc3339());
        self.save(&key, &doc).await
    }

    #[instrument(skip(self))]
    pub async fn record_user_activity(
        &self,
        user_id: Uuid,
        activity: &str,
    ) -> Result<(), ServiceError> {
        let key = format!("{USER_PREFIX}{user_id}");
        let mut doc = self.load(&key).await?;
        let count = doc[activity].as_i64().unwrap_or(0) + 1;
        doc[activity] = json!(count);
        doc["last_seen"] = json!(chrono::Utc::now().to_rfc3339());
        self.save(&key, &doc).await
    }

    #[instrument(skip(self))]
    pub async fn record_template_view(&self, template_id: Uuid) -> Result<(), ServiceError> {
        self.bump(&format!("{TEMPLATE_PREFIX}{template_id}"), "views")
            .await
    }

    #[instrument(skip(self))]
    pub async fn product_insights(&self, product_id: Uuid) -> Result<Value, ServiceError> {
        self.load(&format!("{PRODUCT_PREFIX}{product_id}")).await
    }

    #[instrument(skip(self))]
    pub async fn user_insights(&self, user_id: Uuid) -> Result<Value, ServiceError> {
        self.load(&format!("{USER_PREFIX}{user_id}")).await
    }

    #[instrument(skip(self))]
    pub async fn template_insights(&self, template_id: Uuid) -> Result<Value, ServiceError> {
        self.load(&format!("{TEMPLATE_PREFIX}{template_id}")).await
    }

    async fn bump(&self, key: &str, counter: &str) -> Result<(), ServiceError> {
        let mut doc = self.load(key).await?;
        let count = doc[counter].as_i64().unwrap_or(0) + 1;
        doc[counter] = json!(count);
        doc["last_seen"] = json!(chrono::Utc::now().to_rfc3339());
        self.save(key, &doc).await
    }

    async fn load(&self, key: &str) -> Result<Value, ServiceError> {
        match self.store.get(key).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(json!({})),
        }
    }

    async fn save(&self, key: &str, doc: &Value) -> Result<(), ServiceError> {
        self.store
            .set(key, &serde_json::to_string(doc)?, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;

    #[tokio::test]
    async fn product_counters_accumulate() {
        let svc = AnalyticsService::new(Arc::new(InMemoryCache::new()));
        let product_id = Uuid::new_v4();

        svc.record_product_view(product_id).await.unwrap();
        svc.record_product_view(product_id).await.unwrap();
        svc.record_product_purchase(product_id, 3).await.unwrap();

        let doc = svc.product_insights(product_id).await.unwrap();
        assert_eq!(doc["views"], 2);
        assert_eq!(doc["purchases"], 3);
        assert!(doc["last_seen"].is_string());
    }

    #[tokio::test]
    async fn absent_document_reads_as_empty() {
        let svc = AnalyticsService::new(Arc::new(InMemoryCache::new()));
        let doc = svc.user_insights(Uuid::new_v4()).await.unwrap();
        assert_eq!(doc, json!({}));
    }

    #[tokio::test]
    async fn user_activity_counts_by_kind() {
        let svc = AnalyticsService::new(Arc::new(InMemoryCache::new()));
        let user_id = Uuid::new_v4();

        svc.record_user_activity(user_id, "logins").await.unwrap();
        svc.record_user_activity(user_id, "logins").await.unwrap();
        svc.record_user_activity(user_id, "orders").await.unwrap();

        let doc = svc.user_insights(user_id).await.unwrap();
        assert_eq!(doc["logins"], 2);
        assert_eq!(doc["orders"], 1);
    }
}
