use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        category::Entity as CategoryEntity,
        order_item::{self, Entity as OrderItemEntity},
        product::{self, Entity as ProductEntity, ProductType},
        product_category::{self, Entity as ProductCategoryEntity},
        product_image::{self, Entity as ProductImageEntity},
        product_variant::{self, Entity as ProductVariantEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    slug,
};

const DEFAULT_LIMIT: u64 = 20;
const MAX_LIMIT: u64 = 100;

/// Product catalog: products, variants, images and category links, with
/// slug/sku uniqueness and the soft-delete lifecycle.
#[derive(Clone)]
pub struct ProductCatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl ProductCatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, input), fields(sku = %input.sku))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        self.ensure_unique_sku(&input.sku, None).await?;
        if input.product_type == ProductType::Simple && input.base_price.is_none() {
            return Err(ServiceError::ValidationError(
                "simple products require a base price".into(),
            ));
        }

        let slug = match input.slug {
            Some(ref wanted) => {
                if self.slug_taken(wanted).await? {
                    return Err(ServiceError::Conflict(format!("slug {wanted} already in use")));
                }
                wanted.clone()
            }
            None => self.generate_slug(&input.name).await?,
        };

        let product_id = Uuid::new_v4();
        let model = product::ActiveModel {
            id: Set(product_id),
            sku: Set(input.sku),
            slug: Set(slug),
            name: Set(input.name),
            description: Set(input.description),
            product_type: Set(input.product_type),
            base_price: Set(input.base_price),
            stock: Set(input.stock.unwrap_or(0)),
            min_stock: Set(input.min_stock.unwrap_or(0)),
            attributes: Set(input.attributes.unwrap_or_else(|| json!({}))),
            is_active: Set(true),
            deleted_at: Set(None),
            ..Default::default()
        };
        let created = model.insert(&*self.db).await?;

        if !input.categories.is_empty() {
            self.set_categories(product_id, input.categories).await?;
        }

        self.event_sender
            .send_or_log(Event::ProductCreated(product_id))
            .await;
        info!(product_id = %product_id, "product created");
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        let existing = self.get_product(product_id).await?;

        if let Some(ref sku) = input.sku {
            self.ensure_unique_sku(sku, Some(product_id)).await?;
        }
        if let Some(ref wanted) = input.slug {
            if *wanted != existing.slug && self.slug_taken(wanted).await? {
                return Err(ServiceError::Conflict(format!("slug {wanted} already in use")));
            }
        }

        // Incoming attributes merge over the stored ones, key by key.
        let merged_attributes = input.attributes.map(|incoming| {
            let mut merged = match &existing.attributes {
                serde_json::Value::Object(map) => map.clone(),
                _ => serde_json::Map::new(),
            };
            if let serde_json::Value::Object(incoming) = incoming {
                for (key, value) in incoming {
                    merged.insert(key, value);
                }
            }
            serde_json::Value::Object(merged)
        });

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(sku) = input.sku {
            active.sku = Set(sku);
        }
        if let Some(slug) = input.slug {
            active.slug = Set(slug);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(product_type) = input.product_type {
            active.product_type = Set(product_type);
        }
        if let Some(base_price) = input.base_price {
            active.base_price = Set(Some(base_price));
        }
        if let Some(stock) = input.stock {
            active.stock = Set(stock);
        }
        if let Some(min_stock) = input.min_stock {
            active.min_stock = Set(min_stock);
        }
        if let Some(attributes) = merged_attributes {
            active.attributes = Set(attributes);
        }
        active.updated_at = Set(Some(chrono::Utc::now()));

        let updated = active.update(&*self.db).await?;

        if let Some(categories) = input.categories {
            self.set_categories(product_id, categories).await?;
        }

        info!(product_id = %product_id, "product updated");
        Ok(updated)
    }

    /// Looks a product up by id or SKU, ignoring soft-deleted rows.
    #[instrument(skip(self))]
    pub async fn resolve(&self, identifier: &str) -> Result<product::Model, ServiceError> {
        if let Ok(id) = Uuid::parse_str(identifier) {
            if let Some(found) = ProductEntity::find_by_id(id)
                .filter(product::Column::DeletedAt.is_null())
                .one(&*self.db)
                .await?
            {
                return Ok(found);
            }
        }
        ProductEntity::find()
            .filter(product::Column::Sku.eq(identifier))
            .filter(product::Column::DeletedAt.is_null())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {identifier} not found")))
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        ProductEntity::find_by_id(product_id)
            .filter(product::Column::DeletedAt.is_null())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {product_id} not found")))
    }

    #[instrument(skip(self))]
    pub async fn get_details(&self, product_id: Uuid) -> Result<ProductDetails, ServiceError> {
        let product = self.get_product(product_id).await?;
        self.details_for(product).await
    }

    /// Storefront lookup by slug: active, non-deleted products only.
    #[instrument(skip(self))]
    pub async fn find_by_slug(&self, slug: &str) -> Result<ProductDetails, ServiceError> {
        let product = ProductEntity::find()
            .filter(product::Column::Slug.eq(slug))
            .filter(product::Column::DeletedAt.is_null())
            .filter(product::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {slug} not found")))?;
        self.details_for(product).await
    }

    #[instrument(skip(self))]
    pub async fn search(&self, query: ProductSearchQuery) -> Result<ProductSearchResult, ServiceError> {
        let mut db_query = ProductEntity::find().filter(product::Column::DeletedAt.is_null());

        if let Some(ref term) = query.search {
            db_query = db_query.filter(
                product::Column::Name
                    .contains(term)
                    .or(product::Column::Sku.contains(term)),
            );
        }
        if let Some(is_active) = query.is_active {
            db_query = db_query.filter(product::Column::IsActive.eq(is_active));
        }

        let total = db_query.clone().count(&*self.db).await?;
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = query.offset.unwrap_or(0);

        let products = db_query
            .order_by_desc(product::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(&*self.db)
            .await?;

        Ok(ProductSearchResult { products, total })
    }

    #[instrument(skip(self))]
    pub async fn list_deleted(&self) -> Result<Vec<product::Model>, ServiceError> {
        ProductEntity::find()
            .filter(product::Column::DeletedAt.is_not_null())
            .order_by_desc(product::Column::DeletedAt)
            .all(&*self.db)
            .await
            .map_err(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn set_active(
        &self,
        product_id: Uuid,
        is_active: bool,
    ) -> Result<product::Model, ServiceError> {
        let product = self.get_product(product_id).await?;
        let mut active: product::ActiveModel = product.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(Some(chrono::Utc::now()));
        active.update(&*self.db).await.map_err(Into::into)
    }

    /// Soft delete: stamps `deleted_at` and deactivates; the row (and its
    /// slug) stays reserved until restored or hard-deleted.
    #[instrument(skip(self))]
    pub async fn soft_delete(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        let product = self.get_product(product_id).await?;
        let mut active: product::ActiveModel = product.into();
        active.deleted_at = Set(Some(chrono::Utc::now()));
        active.is_active = Set(false);
        active.updated_at = Set(Some(chrono::Utc::now()));
        let deleted = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductDeleted(product_id))
            .await;
        Ok(deleted)
    }

    #[instrument(skip(self))]
    pub async fn restore(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        let product = ProductEntity::find_by_id(product_id)
            .filter(product::Column::DeletedAt.is_not_null())
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Deleted product {product_id} not found"))
            })?;

        let mut active: product::ActiveModel = product.into();
        active.deleted_at = Set(None);
        active.is_active = Set(true);
        active.updated_at = Set(Some(chrono::Utc::now()));
        active.update(&*self.db).await.map_err(Into::into)
    }

    /// Hard delete. Order lines are real dependents and block removal;
    /// images, variants and category links go with the product.
    #[instrument(skip(self))]
    pub async fn hard_delete(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let product = ProductEntity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {product_id} not found")))?;

        let referencing_orders = OrderItemEntity::find()
            .filter(order_item::Column::ProductId.eq(product_id))
            .count(&*self.db)
            .await?;
        if referencing_orders > 0 {
            return Err(ServiceError::Conflict(
                "product is referenced by existing orders".into(),
            ));
        }

        ProductImageEntity::delete_many()
            .filter(product_image::Column::ProductId.eq(product_id))
            .exec(&*self.db)
            .await?;
        ProductVariantEntity::delete_many()
            .filter(product_variant::Column::ProductId.eq(product_id))
            .exec(&*self.db)
            .await?;
        ProductCategoryEntity::delete_many()
            .filter(product_category::Column::ProductId.eq(product_id))
            .exec(&*self.db)
            .await?;
        let active: product::ActiveModel = product.into();
        active.delete(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductDeleted(product_id))
            .await;
        info!(product_id = %product_id, "product hard-deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn add_image(
        &self,
        product_id: Uuid,
        input: AddImageInput,
    ) -> Result<product_image::Model, ServiceError> {
        self.get_product(product_id).await?;

        if input.is_primary {
            // Only one primary image per product.
            ProductImageEntity::update_many()
                .col_expr(
                    product_image::Column::IsPrimary,
                    sea_orm::sea_query::Expr::value(false),
                )
                .filter(product_image::Column::ProductId.eq(product_id))
                .filter(product_image::Column::IsPrimary.eq(true))
                .exec(&*self.db)
                .await?;
        }

        let model = product_image::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            url: Set(input.url),
            alt_text: Set(input.alt_text),
            is_primary: Set(input.is_primary),
            created_at: Set(chrono::Utc::now()),
        };
        model.insert(&*self.db).await.map_err(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn remove_image(&self, image_id: Uuid) -> Result<(), ServiceError> {
        let image = ProductImageEntity::find_by_id(image_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Image {image_id} not found")))?;
        let active: product_image::ActiveModel = image.into();
        active.delete(&*self.db).await?;
        Ok(())
    }

    /// Replaces the product's category links. Every referenced category
    /// must exist.
    #[instrument(skip(self))]
    pub async fn set_categories(
        &self,
        product_id: Uuid,
        categories: Vec<Uuid>,
    ) -> Result<(), ServiceError> {
        for category_id in &categories {
            CategoryEntity::find_by_id(*category_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!("category {category_id} does not exist"))
                })?;
        }

        ProductCategoryEntity::delete_many()
            .filter(product_category::Column::ProductId.eq(product_id))
            .exec(&*self.db)
            .await?;

        if !categories.is_empty() {
            let links: Vec<product_category::ActiveModel> = categories
                .into_iter()
                .map(|category_id| product_category::ActiveModel {
                    product_id: Set(product_id),
                    category_id: Set(category_id),
                })
                .collect();
            ProductCategoryEntity::insert_many(links)
                .exec(&*self.db)
                .await?;
        }
        Ok(())
    }

    // ---- variants ----

    #[instrument(skip(self, input), fields(product_id = %input.product_id))]
    pub async fn create_variant(
        &self,
        input: CreateVariantInput,
    ) -> Result<product_variant::Model, ServiceError> {
        let product = self.get_product(input.product_id).await?;
        if product.product_type != ProductType::Variable {
            return Err(ServiceError::InvalidOperation(
                "variants can only be added to variable products".into(),
            ));
        }

        let duplicate = ProductVariantEntity::find()
            .filter(product_variant::Column::ProductId.eq(input.product_id))
            .filter(product_variant::Column::SkuSuffix.eq(input.sku_suffix.clone()))
            .filter(product_variant::Column::DeletedAt.is_null())
            .one(&*self.db)
            .await?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "variant suffix {} already exists for this product",
                input.sku_suffix
            )));
        }

        let variant_id = Uuid::new_v4();
        let model = product_variant::ActiveModel {
            id: Set(variant_id),
            product_id: Set(input.product_id),
            sku_suffix: Set(input.sku_suffix),
            price: Set(input.price),
            stock: Set(input.stock.unwrap_or(0)),
            min_stock: Set(input.min_stock.unwrap_or(0)),
            attributes: Set(input.attributes.unwrap_or_else(|| json!({}))),
            is_active: Set(true),
            deleted_at: Set(None),
            ..Default::default()
        };
        let created = model.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::VariantCreated(variant_id))
            .await;
        info!(variant_id = %variant_id, product_id = %input.product_id, "variant created");
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update_variant(
        &self,
        variant_id: Uuid,
        input: UpdateVariantInput,
    ) -> Result<product_variant::Model, ServiceError> {
        let variant = self.get_variant(variant_id).await?;
        let mut active: product_variant::ActiveModel = variant.into();

        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(stock) = input.stock {
            active.stock = Set(stock);
        }
        if let Some(min_stock) = input.min_stock {
            active.min_stock = Set(min_stock);
        }
        if let Some(attributes) = input.attributes {
            active.attributes = Set(attributes);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Some(chrono::Utc::now()));
        active.update(&*self.db).await.map_err(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn get_variant(
        &self,
        variant_id: Uuid,
    ) -> Result<product_variant::Model, ServiceError> {
        ProductVariantEntity::find_by_id(variant_id)
            .filter(product_variant::Column::DeletedAt.is_null())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Variant {variant_id} not found")))
    }

    #[instrument(skip(self))]
    pub async fn list_variants(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<product_variant::Model>, ServiceError> {
        ProductVariantEntity::find()
            .filter(product_variant::Column::ProductId.eq(product_id))
            .filter(product_variant::Column::DeletedAt.is_null())
            .order_by_asc(product_variant::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(Into::into)
    }

    #[instrument(skip(self))]
    pub async fn soft_delete_variant(
        &self,
        variant_id: Uuid,
    ) -> Result<product_variant::Model, ServiceError> {
        let variant = self.get_variant(variant_id).await?;
        let mut active: product_variant::ActiveModel = variant.into();
        active.deleted_at = Set(Some(chrono::Utc::now()));
        active.is_active = Set(false);
        active.updated_at = Set(Some(chrono::Utc::now()));
        active.update(&*self.db).await.map_err(Into::into)
    }

    // ---- internals ----

    async fn details_for(&self, product: product::Model) -> Result<ProductDetails, ServiceError> {
        let variants = product
            .find_related(ProductVariantEntity)
            .filter(product_variant::Column::DeletedAt.is_null())
            .all(&*self.db)
            .await?;
        let images = product
            .find_related(ProductImageEntity)
            .order_by_desc(product_image::Column::IsPrimary)
            .all(&*self.db)
            .await?;
        let category_ids = product
            .find_related(ProductCategoryEntity)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|link| link.category_id)
            .collect();

        Ok(ProductDetails {
            product,
            variants,
            images,
            category_ids,
        })
    }

    async fn ensure_unique_sku(
        &self,
        sku: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut query = ProductEntity::find().filter(product::Column::Sku.eq(sku));
        if let Some(id) = exclude_id {
            query = query.filter(product::Column::Id.ne(id));
        }
        if query.one(&*self.db).await?.is_some() {
            return Err(ServiceError::Conflict(format!("SKU {sku} already exists")));
        }
        Ok(())
    }

    async fn slug_taken(&self, slug: &str) -> Result<bool, ServiceError> {
        Ok(ProductEntity::find()
            .filter(product::Column::Slug.eq(slug))
            .filter(product::Column::DeletedAt.is_null())
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

#[derive(Debug, Deserialize)]
pub struct CreateProductInput {
    pub name: String,
    pub sku: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub product_type: ProductType,
    pub base_price: Option<Decimal>,
    pub stock: Option<i32>,
    pub min_stock: Option<i32>,
    pub attributes: Option<serde_json::Value>,
    #[serde(default)]
    pub categories: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub product_type: Option<ProductType>,
    pub base_price: Option<Decimal>,
    pub stock: Option<i32>,
    pub min_stock: Option<i32>,
    pub attributes: Option<serde_json::Value>,
    pub categories: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateVariantInput {
    pub product_id: Uuid,
    pub sku_suffix: String,
    pub price: Decimal,
    pub stock: Option<i32>,
    pub min_stock: Option<i32>,
    pub attributes: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateVariantInput {
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub min_stock: Option<i32>,
    pub attributes: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AddImageInput {
    pub url: String,
    pub alt_text: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductSearchQuery {
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ProductSearchResult {
    pub products: Vec<product::Model>,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct ProductDetails {
    #[serde(flatten)]
    pub product: product::Model,
    pub variants: Vec<product_variant::Model>,
    pub images: Vec<product_image::Model>,
    pub category_ids: Vec<Uuid>,
}
