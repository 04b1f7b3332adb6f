use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        inventory_log::{self, Movement},
        order::{self, Entity as OrderEntity, OrderStatus},
        order_item::{self, Entity as OrderItemEntity},
        payment::{self, Entity as PaymentEntity},
        product::{self, Entity as ProductEntity},
        product_variant::{self, Entity as ProductVariantEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Fixed tax rate applied to the order subtotal.
const TAX_RATE: Decimal = dec!(0.18);

#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemInput {
    pub product_id: Option<Uuid>,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderInput {
    pub user_id: Uuid,
    pub items: Vec<OrderItemInput>,
    pub shipping_address: serde_json::Value,
    pub billing_address: serde_json::Value,
    pub notes: Option<String>,
}

/// Order with its lines and payment records, as returned to callers.
#[derive(Debug, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub payments: Vec<payment::Model>,
}

#[derive(Debug, Serialize)]
pub struct OrderListPage {
    pub orders: Vec<order::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Computes (tax, total) from the order subtotal. Shipping and discount
/// are zero until the corresponding features land.
pub fn compute_totals(subtotal: Decimal) -> (Decimal, Decimal) {
    let shipping = Decimal::ZERO;
    let discount = Decimal::ZERO;
    let tax = (subtotal * TAX_RATE).round_dp(2);
    (tax, subtotal + shipping + tax - discount)
}

/// Order workflow: validates items against the catalog, freezes unit
/// prices, decrements stock, writes the movement ledger and creates the
/// pending payment stub — all inside one transaction.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, input), fields(user_id = %input.user_id, item_count = input.items.len()))]
    pub async fn create(&self, input: CreateOrderInput) -> Result<OrderDetails, ServiceError> {
        if input.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "order requires at least one item".into(),
            ));
        }
        for item in &input.items {
            if item.quantity < 1 {
                return Err(ServiceError::ValidationError(
                    "item quantity must be at least 1".into(),
                ));
            }
            if item.product_id.is_none() && item.variant_id.is_none() {
                return Err(ServiceError::ValidationError(
                    "item requires product_id or variant_id".into(),
                ));
            }
        }

        let order_id = Uuid::new_v4();
        let txn = self.db.begin().await?;

        let mut subtotal = Decimal::ZERO;
        let mut item_models = Vec::with_capacity(input.items.len());
        let mut log_models = Vec::with_capacity(input.items.len());

        for item in &input.items {
            let (unit_price, product_id, variant_id) = match (item.variant_id, item.product_id) {
                (Some(variant_id), _) => {
                    let variant = ProductVariantEntity::find_by_id(variant_id)
                        .filter(product_variant::Column::IsActive.eq(true))
                        .filter(product_variant::Column::DeletedAt.is_null())
                        .one(&txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::ValidationError(format!(
                                "order item references an invalid variant ({variant_id})"
                            ))
                        })?;

                    decrement_variant_stock(&txn, variant_id, item.quantity).await?;
                    (variant.price, variant.product_id, Some(variant_id))
                }
                (None, Some(product_id)) => {
                    let product = ProductEntity::find_by_id(product_id)
                        .filter(product::Column::IsActive.eq(true))
                        .filter(product::Column::DeletedAt.is_null())
                        .one(&txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::ValidationError(format!(
                                "order item references an invalid product ({product_id})"
                            ))
                        })?;
                    let base_price = product.base_price.ok_or_else(|| {
                        ServiceError::ValidationError(format!(
                            "product {product_id} has no base price"
                        ))
                    })?;

                    decrement_product_stock(&txn, product_id, item.quantity).await?;
                    (base_price, product_id, None)
                }
                (None, None) => {
                    return Err(ServiceError::ValidationError(
                        "item requires product_id or variant_id".into(),
                    ));
                }
            };

            let total_price = unit_price * Decimal::from(item.quantity);
            subtotal += total_price;

            item_models.push(order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product_id),
                variant_id: Set(variant_id),
                quantity: Set(item.quantity),
                unit_price: Set(unit_price),
                total_price: Set(total_price),
                discount_applied: Set(Decimal::ZERO),
                created_at: Set(chrono::Utc::now()),
            });
            log_models.push(inventory_log::ActiveModel {
                id: Set(Uuid::new_v4()),
                product_id: Set(product_id),
                variant_id: Set(variant_id),
                quantity: Set(-item.quantity),
                movement: Set(Movement::Sale),
                reason: Set(Some("order placed".to_string())),
                reference_id: Set(Some(order_id)),
                created_at: Set(chrono::Utc::now()),
            });
        }

        let (tax, total) = compute_totals(subtotal);

        let order_model = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(input.user_id),
            status: Set(OrderStatus::Pending),
            subtotal: Set(subtotal),
            shipping: Set(Decimal::ZERO),
            discount: Set(Decimal::ZERO),
            tax: Set(tax),
            total: Set(total),
            shipping_address: Set(input.shipping_address),
            billing_address: Set(input.billing_address),
            notes: Set(input.notes),
            ..Default::default()
        };
        let order = order_model.insert(&txn).await?;

        OrderItemEntity::insert_many(item_models).exec(&txn).await?;
        inventory_log::Entity::insert_many(log_models)
            .exec(&txn)
            .await?;

        // Pending manual payment stub; the gateway workflow replaces it with
        // a real intent when checkout proceeds to payment.
        let stub = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            gateway: Set("manual".to_string()),
            gateway_id: Set(None),
            amount: Set(total),
            currency: Set("USD".to_string()),
            status: Set("pending".to_string()),
            metadata: Set(serde_json::json!({})),
            ..Default::default()
        };
        stub.insert(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(order_id))
            .await;
        info!(order_id = %order_id, %subtotal, %total, "order created");

        self.get(order_id).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, order_id: Uuid) -> Result<OrderDetails, ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

        let items = order.find_related(OrderItemEntity).all(&*self.db).await?;
        let payments = order.find_related(PaymentEntity).all(&*self.db).await?;

        Ok(OrderDetails {
            order,
            items,
            payments,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<OrderDetails>, ServiceError> {
        let orders = OrderEntity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let mut details = Vec::with_capacity(orders.len());
        for order in orders {
            let items = order.find_related(OrderItemEntity).all(&*self.db).await?;
            let payments = order.find_related(PaymentEntity).all(&*self.db).await?;
            details.push(OrderDetails {
                order,
                items,
                payments,
            });
        }
        Ok(details)
    }

    #[instrument(skip(self))]
    pub async fn list(&self, page: u64, per_page: u64) -> Result<OrderListPage, ServiceError> {
        let paginator = OrderEntity::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page.clamp(1, 100));

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(OrderListPage {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Cancels an order, restoring the stock its items consumed and
    /// appending the matching return movements. Cancelling an already
    /// cancelled order is a no-op returning the terminal state.
    #[instrument(skip(self))]
    pub async fn cancel(&self, order_id: Uuid) -> Result<OrderDetails, ServiceError> {
        let txn = self.db.begin().await?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

        match order.status {
            OrderStatus::Cancelled => {
                txn.commit().await?;
                return self.get(order_id).await;
            }
            OrderStatus::Pending | OrderStatus::Processing => {}
            other => {
                return Err(ServiceError::InvalidOperation(format!(
                    "order in status {other:?} cannot be cancelled"
                )));
            }
        }

        let items = order.find_related(OrderItemEntity).all(&txn).await?;
        for item in &items {
            if let Some(variant_id) = item.variant_id {
                restock_variant(&txn, variant_id, item.quantity).await?;
            } else {
                restock_product(&txn, item.product_id, item.quantity).await?;
            }
            inventory_log::ActiveModel {
                id: Set(Uuid::new_v4()),
                product_id: Set(item.product_id),
                variant_id: Set(item.variant_id),
                quantity: Set(item.quantity),
                movement: Set(Movement::Return),
                reason: Set(Some("order cancelled".to_string())),
                reference_id: Set(Some(order_id)),
                created_at: Set(chrono::Utc::now()),
            }
            .insert(&txn)
            .await?;
        }

        let old_status = order.status;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Cancelled);
        active.updated_at = Set(Some(chrono::Utc::now()));
        active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: format!("{old_status:?}"),
                new_status: "Cancelled".to_string(),
            })
            .await;
        self.event_sender
            .send_or_log(Event::OrderCancelled(order_id))
            .await;
        info!(order_id = %order_id, "order cancelled");

        self.get(order_id).await
    }
}

/// Single conditional atomic decrement; zero rows touched means the stock
/// floor would be crossed and the whole order must fail.
async fn decrement_variant_stock(
    txn: &DatabaseTransaction,
    variant_id: Uuid,
    quantity: i32,
) -> Result<(), ServiceError> {
    let result = ProductVariantEntity::update_many()
        .col_expr(
            product_variant::Column::Stock,
            Expr::col(product_variant::Column::Stock).sub(quantity),
        )
        .filter(product_variant::Column::Id.eq(variant_id))
        .filter(product_variant::Column::Stock.gte(quantity))
        .exec(txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::InsufficientStock(format!(
            "variant {variant_id} has less than {quantity} in stock"
        )));
    }
    Ok(())
}

async fn decrement_product_stock(
    txn: &DatabaseTransaction,
    product_id: Uuid,
    quantity: i32,
) -> Result<(), ServiceError> {
    let result = ProductEntity::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).sub(quantity),
        )
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::Stock.gte(quantity))
        .exec(txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::InsufficientStock(format!(
            "product {product_id} has less than {quantity} in stock"
        )));
    }
    Ok(())
}

async fn restock_variant(
    txn: &DatabaseTransaction,
    variant_id: Uuid,
    quantity: i32,
) -> Result<(), ServiceError> {
    ProductVariantEntity::update_many()
        .col_expr(
            product_variant::Column::Stock,
            Expr::col(product_variant::Column::Stock).add(quantity),
        )
        .filter(product_variant::Column::Id.eq(variant_id))
        .exec(txn)
        .await?;
    Ok(())
}

async fn restock_product(
    txn: &DatabaseTransaction,
    product_id: Uuid,
    quantity: i32,
) -> Result<(), ServiceError> {
    ProductEntity::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).add(quantity),
        )
        .filter(product::Column::Id.eq(product_id))
        .exec(txn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_follow_tax_formula() {
        let (tax, total) = compute_totals(dec!(200.00));
        assert_eq!(tax, dec!(36.00));
        assert_eq!(total, dec!(236.00));
    }

    #[test]
    fn tax_rounds_to_two_decimals() {
        // 18% of 33.33 is 5.9994, rounded to 6.00 at two decimals.
        let (tax, total) = compute_totals(dec!(33.33));
        assert_eq!(tax, dec!(6.00));
        assert_eq!(total, dec!(39.33));
    }

    #[test]
    fn zero_subtotal_keeps_everything_zero() {
        let (tax, total) = compute_totals(Decimal::ZERO);
        assert_eq!(tax, Decimal::ZERO);
        assert_eq!(total, Decimal::ZERO);
    }

    #[test]
    fn total_is_subtotal_plus_tax_while_shipping_and_discount_are_zero() {
        for cents in [1i64, 999, 10_000, 123_456] {
            let subtotal = Decimal::new(cents, 2);
            let (tax, total) = compute_totals(subtotal);
            assert_eq!(total, subtotal + tax);
        }
    }
}
