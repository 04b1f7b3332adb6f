use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    entities::{
        product::{self, Entity as ProductEntity},
        wishlist_item::{self, Entity as WishlistItemEntity},
    },
    errors::ServiceError,
};

#[derive(Clone)]
pub struct WishlistService {
    db: Arc<DatabaseConnection>,
}

impl WishlistService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Adds a product to the user's wishlist. Adding the same product
    /// twice is a no-op.
    #[instrument(skip(self))]
    pub async fn add(&self, user_id: Uuid, product_id: Uuid) -> Result<(), ServiceError> {
        ProductEntity::find_by_id(product_id)
            .filter(product::Column::DeletedAt.is_null())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {product_id} not found")))?;

        let existing = WishlistItemEntity::find_by_id((user_id, product_id))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Ok(());
        }

        wishlist_item::ActiveModel {
            user_id: Set(user_id),
            product_id: Set(product_id),
            created_at: Set(chrono::Utc::now()),
        }
        .insert(&*self.db)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: Uuid, product_id: Uuid) -> Result<(), ServiceError> {
        if let Some(item) = WishlistItemEntity::find_by_id((user_id, product_id))
            .one(&*self.db)
            .await?
        {
            item.delete(&*self.db).await?;
        }
        Ok(())
    }

    /// The user's wished-for products, most recently added first.
    #[instrument(skip(self))]
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<product::Model>, ServiceError> {
        let items = WishlistItemEntity::find()
            .filter(wishlist_item::Column::UserId.eq(user_id))
            .order_by_desc(wishlist_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let mut products = Vec::with_capacity(items.len());
        for item in items {
            if let Some(found) = ProductEntity::find_by_id(item.product_id)
                .filter(product::Column::DeletedAt.is_null())
                .one(&*self.db)
                .await?
            {
                products.push(found);
            }
        }
        Ok(products)
    }
}
