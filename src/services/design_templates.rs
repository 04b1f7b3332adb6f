use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        design_template::{self, Entity as DesignTemplateEntity},
        design_template_item::{self, Entity as DesignTemplateItemEntity},
        product::{self, Entity as ProductEntity, ProductType},
        product_variant::{self, Entity as ProductVariantEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    slug,
};

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateItemInput {
    pub product_id: Uuid,
    pub quantity: Option<i32>,
    pub is_optional: Option<bool>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTemplateInput {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub room_type: Option<String>,
    pub style: Option<String>,
    /// Fractional discount on the bundle, e.g. 0.10 for 10% off.
    pub discount: Option<Decimal>,
    pub cover_image_url: Option<String>,
    pub featured: Option<bool>,
    pub products: Vec<TemplateItemInput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTemplateInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub room_type: Option<String>,
    pub style: Option<String>,
    pub cover_image_url: Option<String>,
    pub featured: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct TemplateDetails {
    #[serde(flatten)]
    pub template: design_template::Model,
    pub items: Vec<design_template_item::Model>,
}

/// Applies the optional fractional discount to a bundle subtotal.
pub fn discounted_total(subtotal: Decimal, discount: Option<Decimal>) -> Decimal {
    match discount {
        Some(discount) if discount > Decimal::ZERO => {
            (subtotal * (Decimal::ONE - discount)).round_dp(2)
        }
        _ => subtotal,
    }
}

/// Design-template bundles: curated product sets priced from the catalog
/// at creation time (VARIABLE products contribute their cheapest active
/// variant).
#[derive(Clone)]
pub struct DesignTemplateService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl DesignTemplateService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: CreateTemplateInput) -> Result<TemplateDetails, ServiceError> {
        if input.products.is_empty() {
            return Err(ServiceError::ValidationError(
                "template requires at least one product".into(),
            ));
        }
        if let Some(discount) = input.discount {
            if discount < Decimal::ZERO || discount >= Decimal::ONE {
                return Err(ServiceError::ValidationError(
                    "discount must be a fraction in [0, 1)".into(),
                ));
            }
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

        let txn = self.db.begin().await?;

        let mut subtotal = Decimal::ZERO;
        let template_id = Uuid::new_v4();
        let mut item_models = Vec::with_capacity(input.products.len());

        for item in &input.products {
            let product = ProductEntity::find_by_id(item.product_id)
                .filter(product::Column::IsActive.eq(true))
                .filter(product::Column::DeletedAt.is_null())
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!("invalid product: {}", item.product_id))
                })?;

            // VARIABLE products are priced from their cheapest active variant.
            let unit_price = if product.product_type == ProductType::Variable {
                ProductVariantEntity::find()
                    .filter(product_variant::Column::ProductId.eq(product.id))
                    .filter(product_variant::Column::IsActive.eq(true))
                    .filter(product_variant::Column::DeletedAt.is_null())
                    .order_by_asc(product_variant::Column::Price)
                    .one(&txn)
                    .await?
                    .map(|variant| variant.price)
                    .unwrap_or(Decimal::ZERO)
            } else {
                product.base_price.unwrap_or(Decimal::ZERO)
            };

            let quantity = item.quantity.unwrap_or(1).max(1);
            subtotal += unit_price * Decimal::from(quantity);

            item_models.push(design_template_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                template_id: Set(template_id),
                product_id: Set(item.product_id),
                quantity: Set(quantity),
                is_optional: Set(item.is_optional.unwrap_or(false)),
                notes: Set(item.notes.clone()),
            });
        }

        let total_price = discounted_total(subtotal, input.discount);

        let model = design_template::ActiveModel {
            id: Set(template_id),
            name: Set(input.name),
            slug: Set(slug),
            description: Set(input.description),
            room_type: Set(input.room_type),
            style: Set(input.style),
            discount: Set(input.discount),
            total_price: Set(total_price),
            cover_image_url: Set(input.cover_image_url),
            featured: Set(input.featured.unwrap_or(false)),
            is_active: Set(true),
            ..Default::default()
        };
        model.insert(&txn).await?;

        DesignTemplateItemEntity::insert_many(item_models)
            .exec(&txn)
            .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::TemplateCreated(template_id))
            .await;
        info!(template_id = %template_id, %total_price, "design template created");

        self.get(template_id).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, template_id: Uuid) -> Result<TemplateDetails, ServiceError> {
        let template = DesignTemplateEntity::find_by_id(template_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Template {template_id} not found")))?;
        let items = template
            .find_related(DesignTemplateItemEntity)
            .all(&*self.db)
            .await?;
        Ok(TemplateDetails { template, items })
    }

    #[instrument(skip(self))]
    pub async fn find_by_slug(&self, slug: &str) -> Result<TemplateDetails, ServiceError> {
        let template = DesignTemplateEntity::find()
            .filter(design_template::Column::Slug.eq(slug))
            .filter(design_template::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Template {slug} not found")))?;
        let items = template
            .find_related(DesignTemplateItemEntity)
            .all(&*self.db)
            .await?;
        Ok(TemplateDetails { template, items })
    }

    #[instrument(skip(self))]
    pub async fn list(&self, featured_only: bool) -> Result<Vec<design_template::Model>, ServiceError> {
        let mut query =
            DesignTemplateEntity::find().filter(design_template::Column::IsActive.eq(true));
        if featured_only {
            query = query.filter(design_template::Column::Featured.eq(true));
        }
        query
            .order_by_desc(design_template::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(Into::into)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        template_id: Uuid,
        input: UpdateTemplateInput,
    ) -> Result<design_template::Model, ServiceError> {
        let template = DesignTemplateEntity::find_by_id(template_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Template {template_id} not found")))?;

        let mut active: design_template::ActiveModel = template.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(room_type) = input.room_type {
            active.room_type = Set(Some(room_type));
        }
        if let Some(style) = input.style {
            active.style = Set(Some(style));
        }
        if let Some(cover_image_url) = input.cover_image_url {
            active.cover_image_url = Set(Some(cover_image_url));
        }
        if let Some(featured) = input.featured {
            active.featured = Set(featured);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Some(chrono::Utc::now()));
        active.update(&*self.db).await.map_err(Into::into)
    }

    async fn slug_taken(&self, slug: &str) -> Result<bool, ServiceError> {
        Ok(DesignTemplateEntity::find()
            .filter(design_template::Column::Slug.eq(slug))
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
