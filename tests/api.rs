//! HTTP facade: auth, status codes and structured outcomes.

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::*;

#[tokio::test]
async fn test_health() {
    let env = create_test_env();

    let response = env.app().oneshot(get_request("/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn test_track_click_unknown_coupon_is_ok() {
    let env = create_test_env();

    let response = env
        .app()
        .oneshot(json_request("POST", "/coupons/does-not-exist/click", None, json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["ok"], true);
}

#[tokio::test]
async fn test_get_coupon_includes_status() {
    let env = create_test_env();
    let coupon = {
        let mut conn = env.conn();
        let shop = create_test_shop(&mut conn, "Shop", 100);
        create_test_coupon(&mut conn, &shop, 2, 5, 0)
    };

    let response = env
        .app()
        .oneshot(get_request(&format!("/coupons/{}", coupon.id), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], coupon.id.as_str());
    assert_eq!(body["uses_left"], 2);
    assert_eq!(body["status"], "active");

    let response = env.app().oneshot(get_request("/coupons/missing", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_redeem_requires_identity() {
    let env = create_test_env();
    let coupon = {
        let mut conn = env.conn();
        let shop = create_test_shop(&mut conn, "Shop", 100);
        create_test_coupon(&mut conn, &shop, 2, 5, 0)
    };
    let uri = format!("/coupons/{}/redeem", coupon.id);

    let response = env.app().oneshot(json_request("POST", &uri, None, json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");

    let response = env
        .app()
        .oneshot(json_request("POST", &uri, Some("cl_bogus"), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_redeem_returns_structured_outcomes() {
    let env = create_test_env();
    let (coupon, first_key, second_key) = {
        let mut conn = env.conn();
        let shop = create_test_shop(&mut conn, "Shop", 100);
        let coupon = create_test_coupon(&mut conn, &shop, 1, 10, 0);
        let (_, first_key) = create_test_account(&mut conn, "First", &[Role::Customer]);
        let (_, second_key) = create_test_account(&mut conn, "Second", &[Role::Customer]);
        (coupon, first_key, second_key)
    };
    let uri = format!("/coupons/{}/redeem", coupon.id);

    let response = env
        .app()
        .oneshot(
            axum::http::Request::builder()
                .method("POST")
                .uri(&uri)
                .header("Authorization", format!("Bearer {}", first_key))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["redemption"]["reward_points"], 10);

    let response = env
        .app()
        .oneshot(json_request("POST", &uri, Some(&second_key), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "COUPON_EXHAUSTED");
    assert_eq!(body["message"], "This coupon has no uses left");

    let response = env
        .app()
        .oneshot(get_request("/me", Some(&first_key)))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["balance"], 10);
}

#[tokio::test]
async fn test_create_coupon_with_insufficient_credits() {
    let env = create_test_env();
    let api_key = {
        let mut conn = env.conn();
        let (shop, api_key) = create_test_account(&mut conn, "Shop", &[Role::ShopOwner]);
        fund(&mut conn, &shop.id, 40);
        api_key
    };

    let response = env
        .app()
        .oneshot(json_request(
            "POST",
            "/coupons",
            Some(&api_key),
            json!({
                "title": "Half off",
                "discount_type": "percentage",
                "discount_value": 50,
                "max_uses": 10,
                "validity_type": "days",
                "validity_days": 7
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body_json(response).await["code"], "INSUFFICIENT_CREDITS");

    let response = env
        .app()
        .oneshot(get_request("/shop/coupons", Some(&api_key)))
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!([]));

    let response = env.app().oneshot(get_request("/me", Some(&api_key))).await.unwrap();
    assert_eq!(body_json(response).await["balance"], 40);
}

#[tokio::test]
async fn test_malformed_body_is_validation_error() {
    let env = create_test_env();
    let api_key = {
        let mut conn = env.conn();
        create_test_account(&mut conn, "Shop", &[Role::ShopOwner]).1
    };

    let response = env
        .app()
        .oneshot(json_request("POST", "/coupons", Some(&api_key), json!({ "title": 5 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let env = create_test_env();
    let (customer_key, admin_key) = {
        let mut conn = env.conn();
        let customer_key = create_test_account(&mut conn, "Customer", &[Role::Customer]).1;
        let admin = accounts::create_admin(&mut conn, &Economy::default(), "Admin").unwrap();
        (customer_key, admin.api_key)
    };

    let response = env.app().oneshot(get_request("/admin/accounts", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = env
        .app()
        .oneshot(get_request("/admin/accounts", Some(&customer_key)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = env
        .app()
        .oneshot(get_request("/admin/accounts", Some(&admin_key)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["total"], 2);
}

#[tokio::test]
async fn test_credit_key_flow_over_http() {
    let env = create_test_env();
    let (shop_key, admin_key) = {
        let mut conn = env.conn();
        let shop_key = create_test_account(&mut conn, "Shop", &[Role::ShopOwner]).1;
        let admin = accounts::create_admin(&mut conn, &Economy::default(), "Admin").unwrap();
        (shop_key, admin.api_key)
    };

    let response = env
        .app()
        .oneshot(json_request(
            "POST",
            "/credit-requests",
            Some(&shop_key),
            json!({ "amount": 1000, "message": "Launch campaign" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let request_id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = env
        .app()
        .oneshot(get_request("/admin/credit-requests?status=pending", Some(&admin_key)))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["total"], 1);

    let response = env
        .app()
        .oneshot(json_request(
            "POST",
            &format!("/admin/credit-requests/{}/keys", request_id),
            Some(&admin_key),
            json!({ "expires_in_days": 14 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let key_code = body_json(response).await["key_code"].as_str().unwrap().to_string();

    let response = env
        .app()
        .oneshot(get_request("/credit-keys?available=true", Some(&shop_key)))
        .await
        .unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    let activate = || {
        json_request(
            "POST",
            "/credit-keys/activate",
            Some(&shop_key),
            json!({ "key_code": key_code }),
        )
    };

    let response = env.app().oneshot(activate()).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["credited"], 1000);
    assert_eq!(body["balance"], 1000);

    let response = env.app().oneshot(activate()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "KEY_ALREADY_USED");

    // Every mutation above left an audit event
    let response = env
        .app()
        .oneshot(get_request(
            "/admin/audit-logs?action=activate_credit_key",
            Some(&admin_key),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["total"], 1);

    let response = env
        .app()
        .oneshot(get_request("/admin/credit-log?reason=credit_key", Some(&admin_key)))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["delta"], 1000);
}

#[tokio::test]
async fn test_affiliate_link_is_signed_when_secret_set() {
    let env = create_test_env_with_policy(RedemptionPolicy {
        max_per_customer: 1,
        affiliate_link_secret: Some("s3cret".into()),
    });
    let (coupon, affiliate, affiliate_key) = {
        let mut conn = env.conn();
        let shop = create_test_shop(&mut conn, "Shop", 100);
        let coupon = create_test_coupon(&mut conn, &shop, 5, 0, 5);
        let (affiliate, key) = create_test_account(&mut conn, "Affiliate", &[Role::Affiliate]);
        (coupon, affiliate, key)
    };

    let response = env
        .app()
        .oneshot(get_request(
            &format!("/affiliate/links/{}", coupon.id),
            Some(&affiliate_key),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let expected = redemption::sign_affiliate_link("s3cret", &coupon.id, &affiliate.id).unwrap();
    assert_eq!(body["affiliate_sig"], expected.as_str());
    assert!(body["url"].as_str().unwrap().contains(&expected));
}
