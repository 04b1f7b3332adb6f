mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::TestApp;
use storefront_api::entities::user::UserRole;

#[tokio::test]
async fn register_login_me_roundtrip() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "email": "ana@example.com",
                "password": "a-long-password",
                "full_name": "Ana Torres"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["data"]["user"]["email"], "ana@example.com");
    assert_eq!(body["data"]["user"]["role"], "Customer");
    assert!(body["data"]["user"].get("password_hash").is_none());

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({
                "email": "ana@example.com",
                "password": "a-long-password"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(Method::GET, "/api/v1/auth/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "ana@example.com");
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = TestApp::new().await;
    app.register_user("ana@example.com", UserRole::Customer).await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "email": "ana@example.com",
                "password": "a-long-password",
                "full_name": "Ana Torres"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = TestApp::new().await;
    app.register_user("ana@example.com", UserRole::Customer).await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({
                "email": "ana@example.com",
                "password": "not-the-password"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Unknown email gets the same generic rejection.
    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({
                "email": "nobody@example.com",
                "password": "whatever-password"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn short_password_is_rejected() {
    let app = TestApp::new().await;
    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "email": "ana@example.com",
                "password": "short",
                "full_name": "Ana Torres"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let app = TestApp::new().await;
    let (token, _) = app.register_user("ana@example.com", UserRole::Customer).await;

    let (status, _) = app
        .request(Method::GET, "/api/v1/auth/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(Method::POST, "/api/v1/auth/logout", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    // The same token is now on the revocation list.
    let (status, _) = app
        .request(Method::GET, "/api/v1/auth/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let app = TestApp::new().await;
    let (status, _) = app
        .request(Method::GET, "/api/v1/auth/me", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wishlist_and_cart_follow_the_user() {
    let app = TestApp::new().await;
    let (token, _) = app.register_user("ana@example.com", UserRole::Customer).await;
    let product_id = app
        .seed_simple_product("Oak Shelf", "SHELF-01", rust_decimal_macros::dec!(59.90), 5)
        .await;

    // Wishlist add is idempotent.
    for _ in 0..2 {
        let (status, _) = app
            .request(
                Method::POST,
                &format!("/api/v1/wishlist/{product_id}"),
                Some(&token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = app
        .request(Method::GET, "/api/v1/wishlist", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // Cart state roundtrips through the cache.
    let (status, _) = app
        .request(
            Method::PUT,
            "/api/v1/cart",
            Some(&token),
            Some(json!({
                "items": [{
                    "product_id": product_id,
                    "variant_id": null,
                    "quantity": 2,
                    "unit_price": "59.90"
                }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(Method::GET, "/api/v1/cart", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"][0]["quantity"], 2);

    let (status, _) = app
        .request(Method::DELETE, "/api/v1/cart", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app
        .request(Method::GET, "/api/v1/cart", Some(&token), None)
        .await;
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn reviews_enforce_rating_bounds() {
    let app = TestApp::new().await;
    let (token, _) = app.register_user("ana@example.com", UserRole::Customer).await;
    let product_id = app
        .seed_simple_product("Oak Shelf", "SHELF-01", rust_decimal_macros::dec!(59.90), 5)
        .await;

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/api/v1/products/{product_id}/reviews"),
            Some(&token),
            Some(json!({"rating": 9})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for rating in [4, 5] {
        let (status, _) = app
            .request(
                Method::POST,
                &format!("/api/v1/products/{product_id}/reviews"),
                Some(&token),
                Some(json!({"rating": rating, "comment": "solid"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/products/{product_id}/rating"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 2);
    assert_eq!(body["data"]["average"], 4.5);
}
