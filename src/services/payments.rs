use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    cache::CacheBackend,
    entities::{
        order::{self, Entity as OrderEntity, OrderStatus},
        payment::{self, Entity as PaymentEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::{to_minor_units, CreateIntentParams, PaymentGateway},
    services::orders::OrderService,
};

/// How long a processed webhook event id stays in the dedup set.
const WEBHOOK_DEDUP_TTL: Duration = Duration::from_secs(24 * 3600);
const WEBHOOK_DEDUP_PREFIX: &str = "webhook:event:";

/// When a refund cancels the parent order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundCancelPolicy {
    /// Cancel only when the refund covers the full payment amount.
    FullRefundOnly,
    /// Cancel on any refund, full or partial.
    AnyRefund,
}

impl RefundCancelPolicy {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "any-refund" => Self::AnyRefund,
            _ => Self::FullRefundOnly,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedPayment {
    pub payment: payment::Model,
    pub client_secret: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmedPayment {
    pub payment: payment::Model,
    pub gateway_status: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentListPage {
    pub payments: Vec<payment::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Payment workflow: creates gateway intents tied to orders, applies
/// webhook confirmations using the gateway as source of truth, and
/// processes refunds under the configured cancellation policy.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    cache: Arc<dyn CacheBackend>,
    orders: Arc<OrderService>,
    event_sender: Arc<EventSender>,
    cancel_policy: RefundCancelPolicy,
}

impl PaymentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        cache: Arc<dyn CacheBackend>,
        orders: Arc<OrderService>,
        event_sender: Arc<EventSender>,
        cancel_policy: RefundCancelPolicy,
    ) -> Self {
        Self {
            db,
            gateway,
            cache,
            orders,
            event_sender,
            cancel_policy,
        }
    }

    /// Creates a gateway payment intent for the order's total and persists
    /// the local payment record carrying the client secret.
    #[instrument(skip(self, metadata))]
    pub async fn create_payment(
        &self,
        order_id: Uuid,
        currency: String,
        customer_email: Option<String>,
        metadata: Option<HashMap<String, String>>,
    ) -> Result<CreatedPayment, ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

        let amount_minor = to_minor_units(order.total)?;
        let intent = self
            .gateway
            .create_intent(CreateIntentParams {
                amount_minor,
                currency: currency.clone(),
                order_id,
                customer_email,
                metadata: metadata.clone().unwrap_or_default(),
            })
            .await?;

        // gateway_id is unique per gateway; a duplicate means the intent was
        // already recorded.
        let existing = PaymentEntity::find()
            .filter(payment::Column::Gateway.eq(self.gateway.name()))
            .filter(payment::Column::GatewayId.eq(intent.id.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "payment intent {} already recorded",
                intent.id
            )));
        }

        let mut meta = json!({ "client_secret": intent.client_secret });
        if let Some(extra) = metadata {
            for (key, value) in extra {
                meta[key] = json!(value);
            }
        }

        let model = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            gateway: Set(self.gateway.name().to_string()),
            gateway_id: Set(Some(intent.id.clone())),
            amount: Set(order.total),
            currency: Set(currency),
            status: Set("pending".to_string()),
            metadata: Set(meta),
            ..Default::default()
        };
        let created = model.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::PaymentCreated(created.id))
            .await;
        info!(payment_id = %created.id, order_id = %order_id, intent_id = %intent.id, "payment created");

        Ok(CreatedPayment {
            client_secret: created
                .metadata
                .get("client_secret")
                .and_then(|v| v.as_str())
                .map(String::from),
            payment: created,
        })
    }

    /// Applies a webhook confirmation. The intent is re-fetched from the
    /// gateway rather than trusted from the webhook payload; the order
    /// advances to PROCESSING only on the terminal "succeeded" status.
    /// Re-applying the same terminal status is harmless.
    #[instrument(skip(self))]
    pub async fn confirm_payment(
        &self,
        gateway_payment_id: &str,
    ) -> Result<ConfirmedPayment, ServiceError> {
        let intent = self.gateway.retrieve_intent(gateway_payment_id).await?;

        let found = self.find_by_gateway_id(gateway_payment_id).await?;

        let metadata = merge_metadata(
            &found.metadata,
            json!({
                "last_payment_error": intent.last_payment_error,
            }),
        );

        let order_id = found.order_id;
        let payment_id = found.id;
        let mut active: payment::ActiveModel = found.into();
        active.status = Set(intent.status.clone());
        active.metadata = Set(metadata);
        active.updated_at = Set(Some(chrono::Utc::now()));
        let updated = active.update(&*self.db).await?;

        if intent.status == "succeeded" {
            self.advance_order_to_processing(order_id).await?;
        }

        self.event_sender
            .send_or_log(Event::PaymentConfirmed {
                payment_id,
                gateway_status: intent.status.clone(),
            })
            .await;
        info!(payment_id = %payment_id, status = %intent.status, "payment confirmed");

        Ok(ConfirmedPayment {
            payment: updated,
            gateway_status: intent.status,
        })
    }

    /// Refunds a payment, fully when no amount is given. Whether the parent
    /// order is cancelled depends on the configured policy.
    #[instrument(skip(self))]
    pub async fn refund_payment(
        &self,
        gateway_payment_id: &str,
        amount: Option<Decimal>,
    ) -> Result<payment::Model, ServiceError> {
        let found = self.find_by_gateway_id(gateway_payment_id).await?;

        let amount_minor = amount.map(to_minor_units).transpose()?;
        let refund = self.gateway.refund(gateway_payment_id, amount_minor).await?;

        let metadata = merge_metadata(
            &found.metadata,
            json!({
                "refund": {
                    "id": refund.id,
                    "amount": refund.amount,
                    "status": refund.status,
                }
            }),
        );

        let order_id = found.order_id;
        let payment_id = found.id;
        let payment_amount = found.amount;
        let mut active: payment::ActiveModel = found.into();
        active.status = Set("refunded".to_string());
        active.metadata = Set(metadata);
        active.updated_at = Set(Some(chrono::Utc::now()));
        let updated = active.update(&*self.db).await?;

        let full_refund = amount.map(|a| a >= payment_amount).unwrap_or(true);
        let should_cancel = match self.cancel_policy {
            RefundCancelPolicy::AnyRefund => true,
            RefundCancelPolicy::FullRefundOnly => full_refund,
        };
        if should_cancel {
            if let Err(err) = self.orders.cancel(order_id).await {
                // The refund already went through at the gateway; surface the
                // inconsistency loudly instead of failing the whole call.
                warn!(order_id = %order_id, error = %err, "refund processed but order cancellation failed");
            }
        }

        self.event_sender
            .send_or_log(Event::PaymentRefunded(payment_id))
            .await;
        info!(payment_id = %payment_id, full_refund, "payment refunded");

        Ok(updated)
    }

    /// Records a webhook event id, returning false when the event was
    /// already seen and must not be applied again.
    pub async fn register_webhook_event(&self, event_id: &str) -> Result<bool, ServiceError> {
        self.cache
            .set_nx(
                &format!("{WEBHOOK_DEDUP_PREFIX}{event_id}"),
                "1",
                WEBHOOK_DEDUP_TTL,
            )
            .await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, payment_id: Uuid) -> Result<payment::Model, ServiceError> {
        PaymentEntity::find_by_id(payment_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {payment_id} not found")))
    }

    #[instrument(skip(self))]
    pub async fn list_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<payment::Model>, ServiceError> {
        PaymentEntity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .order_by_desc(payment::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn list(&self, page: u64, per_page: u64) -> Result<PaymentListPage, ServiceError> {
        let paginator = PaymentEntity::find()
            .order_by_desc(payment::Column::CreatedAt)
            .paginate(&*self.db, per_page.clamp(1, 100));

        let total = paginator.num_items().await?;
        let payments = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(PaymentListPage {
            payments,
            total,
            page,
            per_page,
        })
    }

    async fn find_by_gateway_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<payment::Model, ServiceError> {
        PaymentEntity::find()
            .filter(payment::Column::Gateway.eq(self.gateway.name()))
            .filter(payment::Column::GatewayId.eq(gateway_payment_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Payment {gateway_payment_id} not found"))
            })
    }

    async fn advance_order_to_processing(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

        // Repeated confirmations of an already processing order are no-ops.
        if order.status != OrderStatus::Pending {
            return Ok(());
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Processing);
        active.updated_at = Set(Some(chrono::Utc::now()));
        active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: "Pending".to_string(),
                new_status: "Processing".to_string(),
            })
            .await;
        Ok(())
    }
}

/// Shallow object merge of webhook/refund detail into stored metadata.
fn merge_metadata(existing: &serde_json::Value, patch: serde_json::Value) -> serde_json::Value {
    let mut merged = match existing {
        serde_json::Value::Object(map) => serde_json::Value::Object(map.clone()),
        _ => json!({}),
    };
    if let (Some(target), serde_json::Value::Object(source)) = (merged.as_object_mut(), patch) {
        for (key, value) in source {
            target.insert(key, value);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn policy_parsing_defaults_to_full_refund() {
        assert_eq!(
            RefundCancelPolicy::parse("any-refund"),
            RefundCancelPolicy::AnyRefund
        );
        assert_eq!(
            RefundCancelPolicy::parse("full-refund"),
            RefundCancelPolicy::FullRefundOnly
        );
        assert_eq!(
            RefundCancelPolicy::parse("nonsense"),
            RefundCancelPolicy::FullRefundOnly
        );
    }

    #[test]
    fn merge_keeps_existing_keys() {
        let existing = json!({"client_secret": "cs_123", "channel": "web"});
        let merged = merge_metadata(&existing, json!({"refund": {"id": "re_1"}}));
        assert_eq!(merged["client_secret"], "cs_123");
        assert_eq!(merged["channel"], "web");
        assert_eq!(merged["refund"]["id"], "re_1");
    }

    #[test]
    fn merge_overwrites_patched_keys() {
        let existing = json!({"last_payment_error": {"code": "card_declined"}});
        let merged = merge_metadata(&existing, json!({"last_payment_error": null}));
        assert!(merged["last_payment_error"].is_null());
    }

    #[test]
    fn merge_tolerates_non_object_existing() {
        let merged = merge_metadata(&json!(null), json!({"a": 1}));
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn full_refund_detection() {
        let payment_amount = dec!(236.00);
        assert!(Some(dec!(236.00)).map(|a| a >= payment_amount).unwrap_or(true));
        assert!(!Some(dec!(100.00)).map(|a| a >= payment_amount).unwrap_or(true));
        assert!(None::<Decimal>.map(|a| a >= payment_amount).unwrap_or(true));
    }
}
