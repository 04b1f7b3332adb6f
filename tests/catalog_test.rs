mod common;

use axum::http::{Method, StatusCode};
use rust_decimal_macros::dec;
use serde_json::json;

use common::TestApp;
use storefront_api::{
    entities::{product::ProductType, user::UserRole},
    errors::ServiceError,
    services::{
        catalog::{CreateProductInput, CreateVariantInput},
        categories::CreateCategoryInput,
    },
};

fn product_input(name: &str, sku: &str) -> CreateProductInput {
    CreateProductInput {
        name: name.to_string(),
        sku: sku.to_string(),
        slug: None,
        description: None,
        product_type: ProductType::Simple,
        base_price: Some(dec!(10.00)),
        stock: Some(1),
        min_stock: None,
        attributes: None,
        categories: vec![],
    }
}

#[tokio::test]
async fn colliding_names_get_suffixed_slugs() {
    let app = TestApp::new().await;
    let catalog = &app.state.services.catalog;

    let first = catalog.create_product(product_input("Nordic Oak Table", "T-1")).await.unwrap();
    let second = catalog.create_product(product_input("Nordic Oak Table", "T-2")).await.unwrap();
    let third = catalog.create_product(product_input("Nordic Oak Table", "T-3")).await.unwrap();

    assert_eq!(first.slug, "nordic-oak-table");
    assert_eq!(second.slug, "nordic-oak-table-1");
    assert_eq!(third.slug, "nordic-oak-table-2");
}

#[tokio::test]
async fn soft_deleted_slug_is_reusable() {
    let app = TestApp::new().await;
    let catalog = &app.state.services.catalog;

    let first = catalog.create_product(product_input("Nordic Oak Table", "T-1")).await.unwrap();
    catalog.soft_delete(first.id).await.unwrap();

    // Slug uniqueness only considers non-deleted records.
    let second = catalog.create_product(product_input("Nordic Oak Table", "T-2")).await.unwrap();
    assert_eq!(second.slug, "nordic-oak-table");
}

#[tokio::test]
async fn duplicate_sku_is_a_conflict() {
    let app = TestApp::new().await;
    let catalog = &app.state.services.catalog;

    catalog.create_product(product_input("Table", "SAME-SKU")).await.unwrap();
    let result = catalog.create_product(product_input("Chair", "SAME-SKU")).await;
    assert!(matches!(result, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn simple_product_requires_base_price() {
    let app = TestApp::new().await;
    let mut input = product_input("Table", "T-1");
    input.base_price = None;
    let result = app.state.services.catalog.create_product(input).await;
    assert!(matches!(result, Err(ServiceError::ValidationError(_))));
}

#[tokio::test]
async fn variants_only_attach_to_variable_products() {
    let app = TestApp::new().await;
    let catalog = &app.state.services.catalog;
    let simple = catalog.create_product(product_input("Table", "T-1")).await.unwrap();

    let result = catalog
        .create_variant(CreateVariantInput {
            product_id: simple.id,
            sku_suffix: "V1".into(),
            price: dec!(12.00),
            stock: None,
            min_stock: None,
            attributes: None,
        })
        .await;
    assert!(matches!(result, Err(ServiceError::InvalidOperation(_))));
}

#[tokio::test]
async fn soft_delete_and_restore_roundtrip() {
    let app = TestApp::new().await;
    let catalog = &app.state.services.catalog;
    let product = catalog.create_product(product_input("Table", "T-1")).await.unwrap();

    let deleted = catalog.soft_delete(product.id).await.unwrap();
    assert!(deleted.deleted_at.is_some());
    assert!(!deleted.is_active);

    // A deleted product is invisible to normal lookups...
    assert!(matches!(
        catalog.get_product(product.id).await,
        Err(ServiceError::NotFound(_))
    ));
    assert_eq!(catalog.list_deleted().await.unwrap().len(), 1);

    // ...until restored.
    let restored = catalog.restore(product.id).await.unwrap();
    assert!(restored.deleted_at.is_none());
    assert!(restored.is_active);
    assert!(catalog.get_product(product.id).await.is_ok());
}

#[tokio::test]
async fn category_rules_block_unsafe_operations() {
    let app = TestApp::new().await;
    let categories = &app.state.services.categories;

    let parent = categories
        .create(CreateCategoryInput {
            name: "Living Room".into(),
            slug: None,
            parent_id: None,
        })
        .await
        .unwrap();
    let child = categories
        .create(CreateCategoryInput {
            name: "Sofas".into(),
            slug: None,
            parent_id: Some(parent.id),
        })
        .await
        .unwrap();

    // Parent cannot be deactivated while the child is active.
    assert!(matches!(
        categories.deactivate(parent.id).await,
        Err(ServiceError::InvalidOperation(_))
    ));

    // Parent cannot be hard-deleted while the child exists.
    assert!(matches!(
        categories.delete(parent.id).await,
        Err(ServiceError::Conflict(_))
    ));

    // Deactivating the child unblocks the parent.
    categories.deactivate(child.id).await.unwrap();
    let parent_after = categories.deactivate(parent.id).await.unwrap();
    assert!(!parent_after.is_active);

    // A category linked to products cannot be hard-deleted.
    categories.activate(child.id).await.unwrap();
    let mut input = product_input("Sofa", "SOFA-1");
    input.categories = vec![child.id];
    app.state.services.catalog.create_product(input).await.unwrap();
    assert!(matches!(
        categories.delete(child.id).await,
        Err(ServiceError::Conflict(_))
    ));
}

#[tokio::test]
async fn category_slugs_collide_safely() {
    let app = TestApp::new().await;
    let categories = &app.state.services.categories;

    let first = categories
        .create(CreateCategoryInput {
            name: "Dining".into(),
            slug: None,
            parent_id: None,
        })
        .await
        .unwrap();
    let second = categories
        .create(CreateCategoryInput {
            name: "Dining".into(),
            slug: None,
            parent_id: None,
        })
        .await
        .unwrap();

    assert_eq!(first.slug, "dining");
    assert_eq!(second.slug, "dining-1");

    assert!(!categories.check_slug("dining").await.unwrap());
    assert!(categories.check_slug("bedroom").await.unwrap());
}

#[tokio::test]
async fn admin_gate_on_catalog_mutations() {
    let app = TestApp::new().await;
    let (customer_token, _) = app
        .register_user("customer@example.com", UserRole::Customer)
        .await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(&customer_token),
            Some(json!({
                "name": "Table",
                "sku": "T-1",
                "product_type": "Simple",
                "base_price": "10.00"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (admin_token, _) = app.register_user("admin@example.com", UserRole::Admin).await;
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(&admin_token),
            Some(json!({
                "name": "Table",
                "sku": "T-1",
                "product_type": "Simple",
                "base_price": "10.00"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["data"]["slug"], "table");
}

#[tokio::test]
async fn design_template_prices_from_catalog() {
    let app = TestApp::new().await;
    let simple = app
        .seed_simple_product("Oak Shelf", "SHELF-01", dec!(100.00), 5)
        .await;
    let (variable, _) = app
        .seed_variant_product("Lounge Chair", "CHAIR-01", dec!(250.00), 5)
        .await;

    let details = app
        .state
        .services
        .templates
        .create(storefront_api::services::design_templates::CreateTemplateInput {
            name: "Reading Corner".into(),
            slug: None,
            description: None,
            room_type: Some("living_room".into()),
            style: Some("scandinavian".into()),
            discount: Some(dec!(0.10)),
            cover_image_url: None,
            featured: Some(true),
            products: vec![
                storefront_api::services::design_templates::TemplateItemInput {
                    product_id: simple,
                    quantity: Some(2),
                    is_optional: None,
                    notes: None,
                },
                storefront_api::services::design_templates::TemplateItemInput {
                    product_id: variable,
                    quantity: None,
                    is_optional: Some(true),
                    notes: None,
                },
            ],
        })
        .await
        .unwrap();

    // (100*2 + 250 cheapest variant) minus 10%.
    assert_eq!(details.template.total_price, dec!(405.00));
    assert_eq!(details.template.slug, "reading-corner");
    assert_eq!(details.items.len(), 2);
}
