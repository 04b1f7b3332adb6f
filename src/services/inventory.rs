use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        inventory_log::{self, Entity as InventoryLogEntity, Movement},
        product::{self, Entity as ProductEntity},
        product_variant::{self, Entity as ProductVariantEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Clone, Deserialize)]
pub struct NewMovement {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    /// Signed quantity; negative decrements stock.
    pub quantity: i32,
    pub movement: Movement,
    pub reason: Option<String>,
    pub reference_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovementFilter {
    pub product_id: Option<Uuid>,
    pub variant_id: Option<Uuid>,
}

/// Append-only writer for the stock movement ledger.
#[derive(Clone)]
pub struct InventoryLogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl InventoryLogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Appends a ledger row without touching stock counters. Used by
    /// callers that already adjusted stock themselves.
    #[instrument(skip(self))]
    pub async fn record(&self, entry: NewMovement) -> Result<inventory_log::Model, ServiceError> {
        if entry.quantity == 0 {
            return Err(ServiceError::ValidationError(
                "movement quantity must be non-zero".into(),
            ));
        }

        let model = inventory_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(entry.product_id),
            variant_id: Set(entry.variant_id),
            quantity: Set(entry.quantity),
            movement: Set(entry.movement),
            reason: Set(entry.reason),
            reference_id: Set(entry.reference_id),
            created_at: Set(chrono::Utc::now()),
        };
        model.insert(&*self.db).await.map_err(Into::into)
    }

    /// Applies a manual stock movement: adjusts the variant's (or simple
    /// product's) stock by the signed quantity and appends the matching
    /// ledger row, atomically. Sale/return movements belong to the order
    /// workflow and are rejected here.
    #[instrument(skip(self))]
    pub async fn adjust_stock(
        &self,
        entry: NewMovement,
    ) -> Result<inventory_log::Model, ServiceError> {
        match entry.movement {
            Movement::In | Movement::Out | Movement::Adjustment => {}
            other => {
                return Err(ServiceError::ValidationError(format!(
                    "movement {other:?} is not a manual adjustment"
                )));
            }
        }
        if entry.quantity == 0 {
            return Err(ServiceError::ValidationError(
                "movement quantity must be non-zero".into(),
            ));
        }

        let txn = self.db.begin().await?;

        match entry.variant_id {
            Some(variant_id) => apply_variant_delta(&txn, variant_id, entry.quantity).await?,
            None => apply_product_delta(&txn, entry.product_id, entry.quantity).await?,
        }

        let model = inventory_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(entry.product_id),
            variant_id: Set(entry.variant_id),
            quantity: Set(entry.quantity),
            movement: Set(entry.movement),
            reason: Set(entry.reason.clone()),
            reference_id: Set(entry.reference_id),
            created_at: Set(chrono::Utc::now()),
        };
        let created = model.insert(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::StockAdjusted {
                product_id: entry.product_id,
                variant_id: entry.variant_id,
                quantity: entry.quantity,
                movement: format!("{:?}", entry.movement),
            })
            .await;
        info!(product_id = %entry.product_id, quantity = entry.quantity, "stock adjusted");

        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: MovementFilter,
    ) -> Result<Vec<inventory_log::Model>, ServiceError> {
        let mut query = InventoryLogEntity::find();
        if let Some(product_id) = filter.product_id {
            query = query.filter(inventory_log::Column::ProductId.eq(product_id));
        }
        if let Some(variant_id) = filter.variant_id {
            query = query.filter(inventory_log::Column::VariantId.eq(variant_id));
        }
        query
            .order_by_desc(inventory_log::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(Into::into)
    }
}

/// Signed delta as one atomic column update. Negative deltas require the
/// current stock to cover them, so concurrent adjustments cannot drive a
/// counter below zero.
async fn apply_variant_delta(
    txn: &DatabaseTransaction,
    variant_id: Uuid,
    delta: i32,
) -> Result<(), ServiceError> {
    let mut update = ProductVariantEntity::update_many()
        .col_expr(
            product_variant::Column::Stock,
            Expr::col(product_variant::Column::Stock).add(delta),
        )
        .filter(product_variant::Column::Id.eq(variant_id));
    if delta < 0 {
        update = update.filter(product_variant::Column::Stock.gte(-delta));
    }
    let result = update.exec(txn).await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::InsufficientStock(format!(
            "variant {variant_id} cannot absorb a {delta} adjustment"
        )));
    }
    Ok(())
}

async fn apply_product_delta(
    txn: &DatabaseTransaction,
    product_id: Uuid,
    delta: i32,
) -> Result<(), ServiceError> {
    let mut update = ProductEntity::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).add(delta),
        )
        .filter(product::Column::Id.eq(product_id));
    if delta < 0 {
        update = update.filter(product::Column::Stock.gte(-delta));
    }
    let result = update.exec(txn).await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::InsufficientStock(format!(
            "product {product_id} cannot absorb a {delta} adjustment"
        )));
    }
    Ok(())
}
