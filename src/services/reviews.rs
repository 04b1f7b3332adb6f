use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    entities::product_review::{self, Entity as ProductReviewEntity},
    errors::ServiceError,
};

#[derive(Debug, Deserialize)]
pub struct CreateReviewInput {
    pub product_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RatingSummary {
    pub average: f64,
    pub count: u64,
}

#[derive(Clone)]
pub struct ProductReviewService {
    db: Arc<DatabaseConnection>,
}

impl ProductReviewService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input), fields(product_id = %input.product_id))]
    pub async fn create(
        &self,
        user_id: Uuid,
        input: CreateReviewInput,
    ) -> Result<product_review::Model, ServiceError> {
        if !(1..=5).contains(&input.rating) {
            return Err(ServiceError::ValidationError(
                "rating must be between 1 and 5".into(),
            ));
        }

        let model = product_review::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(input.product_id),
            user_id: Set(user_id),
            rating: Set(input.rating),
            comment: Set(input.comment),
            created_at: Set(chrono::Utc::now()),
        };
        model.insert(&*self.db).await.map_err(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn list_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<product_review::Model>, ServiceError> {
        ProductReviewEntity::find()
            .filter(product_review::Column::ProductId.eq(product_id))
            .order_by_desc(product_review::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn rating_summary(&self, product_id: Uuid) -> Result<RatingSummary, ServiceError> {
        let reviews = self.list_for_product(product_id).await?;
        let count = reviews.len() as u64;
        let average = if count == 0 {
            0.0
        } else {
            reviews.iter().map(|r| r.rating as f64).sum::<f64>() / count as f64
        };
        Ok(RatingSummary { average, count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds() {
        assert!((1..=5).contains(&1i16));
        assert!((1..=5).contains(&5i16));
        assert!(!(1..=5).contains(&0i16));
        assert!(!(1..=5).contains(&6i16));
    }
}
