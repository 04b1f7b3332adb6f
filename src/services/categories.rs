use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        category::{self, Entity as CategoryEntity},
        product_category::{self, Entity as ProductCategoryEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    slug,
};

#[derive(Debug, Deserialize)]
pub struct CreateCategoryInput {
    pub name: String,
    pub slug: Option<String>,
    pub parent_id: Option<Uuid>,
}

/// Category tree management. Deactivation and deletion are guarded by the
/// child/product rules from the data model.
#[derive(Clone)]
pub struct CategoryService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CategoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: CreateCategoryInput) -> Result<category::Model, ServiceError> {
        let slug = match input.slug {
            Some(ref wanted) => {
                if self.slug_taken(wanted).await? {
                    return Err(ServiceError::Conflict(format!("slug {wanted} already in use")));
                }
                wanted.clone()
            }
            None => self.generate_slug(&input.name).await?,
        };

        if let Some(parent_id) = input.parent_id {
            let parent = CategoryEntity::find_by_id(parent_id)
                .filter(category::Column::DeletedAt.is_null())
                .one(&*self.db)
                .await?;
            match parent {
                Some(parent) if parent.is_active => {}
                _ => {
                    return Err(ServiceError::ValidationError(
                        "parent category does not exist or is inactive".into(),
                    ));
                }
            }
        }

        let category_id = Uuid::new_v4();
        let model = category::ActiveModel {
            id: Set(category_id),
            name: Set(input.name),
            slug: Set(slug),
            parent_id: Set(input.parent_id),
            is_active: Set(true),
            deleted_at: Set(None),
            ..Default::default()
        };
        let created = model.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CategoryCreated(category_id))
            .await;
        info!(category_id = %category_id, "category created");
        Ok(created)
    }

    /// Lists non-deleted categories under a parent; `None` lists the roots.
    #[instrument(skip(self))]
    pub async fn list(&self, parent_id: Option<Uuid>) -> Result<Vec<category::Model>, ServiceError> {
        let mut query = CategoryEntity::find().filter(category::Column::DeletedAt.is_null());
        query = match parent_id {
            Some(parent_id) => query.filter(category::Column::ParentId.eq(parent_id)),
            None => query.filter(category::Column::ParentId.is_null()),
        };
        query
            .order_by_desc(category::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, category_id: Uuid) -> Result<category::Model, ServiceError> {
        CategoryEntity::find_by_id(category_id)
            .filter(category::Column::DeletedAt.is_null())
            .filter(category::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {category_id} not found")))
    }

    /// Deactivation is blocked while the category has active, non-deleted
    /// children.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, category_id: Uuid) -> Result<category::Model, ServiceError> {
        let active_children = CategoryEntity::find()
            .filter(category::Column::ParentId.eq(category_id))
            .filter(category::Column::IsActive.eq(true))
            .filter(category::Column::DeletedAt.is_null())
            .count(&*self.db)
            .await?;
        if active_children > 0 {
            return Err(ServiceError::InvalidOperation(
                "category has active subcategories".into(),
            ));
        }

        let found = CategoryEntity::find_by_id(category_id)
            .filter(category::Column::DeletedAt.is_null())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {category_id} not found")))?;

        let mut model: category::ActiveModel = found.into();
        model.is_active = Set(false);
        model.updated_at = Set(Some(chrono::Utc::now()));
        model.update(&*self.db).await.map_err(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn activate(&self, category_id: Uuid) -> Result<category::Model, ServiceError> {
        let found = CategoryEntity::find_by_id(category_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {category_id} not found")))?;

        let mut model: category::ActiveModel = found.into();
        model.is_active = Set(true);
        model.deleted_at = Set(None);
        model.updated_at = Set(Some(chrono::Utc::now()));
        model.update(&*self.db).await.map_err(Into::into)
    }

    /// Hard delete, only for leaf categories with no associated products.
    #[instrument(skip(self))]
    pub async fn delete(&self, category_id: Uuid) -> Result<(), ServiceError> {
        let children = CategoryEntity::find()
            .filter(category::Column::ParentId.eq(category_id))
            .count(&*self.db)
            .await?;
        if children > 0 {
            return Err(ServiceError::Conflict(
                "category has related subcategories".into(),
            ));
        }

        let linked_products = ProductCategoryEntity::find()
            .filter(product_category::Column::CategoryId.eq(category_id))
            .count(&*self.db)
            .await?;
        if linked_products > 0 {
            return Err(ServiceError::Conflict(
                "category is associated with one or more products".into(),
            ));
        }

        let found = CategoryEntity::find_by_id(category_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {category_id} not found")))?;
        found.delete(&*self.db).await?;

        info!(category_id = %category_id, "category deleted");
        Ok(())
    }

    /// Slug availability probe used by admin tooling.
    pub async fn check_slug(&self, slug: &str) -> Result<bool, ServiceError> {
        Ok(!self.slug_taken(slug).await?)
    }

    async fn slug_taken(&self, slug: &str) -> Result<bool, ServiceError> {
        Ok(CategoryEntity::find()
            .filter(category::Column::Slug.eq(slug))
            .filter(category::Column::DeletedAt.is_null())
            .one(&*self.db)
            .await?
            .is_some())
    }

    async fn generate_slug(&self, base: &str) -> Result<String, ServiceError> {
        for candidate in slug::candidates(base).take(1000) {
            if !self.slug_taken(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(ServiceError::InternalError(format!(
            "could not find a free slug for {base}"
        )))
    }
}
