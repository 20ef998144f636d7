// tests/integration/billing_tests.rs

use crate::common::app_helper::setup_test_app;
use crate::common::request::{api_request, body_json};
use crate::common::stripe_helper::{invoice_object, new_event_id};
use axum::http::StatusCode;
use billing_backend::repository::billing_customer_repository::BillingCustomerRepository;
use serde_json::json;

#[tokio::test]
async fn test_plans_are_public() {
    // Arrange
    let app = setup_test_app().await;

    // Act
    let response = app
        .send(api_request("GET", "/api/billing/plans?interval=year", None, None))
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["success"].as_bool().unwrap());

    let data = &body["data"];
    assert_eq!(data["interval"], "year");
    assert_eq!(data["test_mode"], true);
    let plans = data["plans"].as_array().unwrap();
    assert_eq!(plans.len(), 3);
    assert_eq!(plans[0]["tier"], "free");
    assert_eq!(plans[1]["tier"], "pro");
    assert_eq!(plans[1]["available"], true);
    // Enterprise の年額価格は設定されていない
    assert_eq!(plans[2]["tier"], "enterprise");
    assert_eq!(plans[2]["available"], false);
}

#[tokio::test]
async fn test_billing_endpoints_require_authentication() {
    let app = setup_test_app().await;

    for (method, uri) in [
        ("GET", "/api/billing/subscription"),
        ("POST", "/api/billing/portal"),
        ("GET", "/api/billing/payments"),
        ("GET", "/api/billing/usage"),
    ] {
        let response = app.send(api_request(method, uri, None, None)).await;
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "{} {} should require a token",
            method,
            uri
        );
    }
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let app = setup_test_app().await;

    let response = app
        .send(api_request(
            "GET",
            "/api/billing/subscription",
            Some("not-a-jwt"),
            None,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_checkout_session_creation_success() {
    // Arrange
    let app = setup_test_app().await;
    let user = app.create_user();

    // Act
    let response = app
        .send(api_request(
            "POST",
            "/api/billing/checkout",
            Some(&user.access_token),
            Some(json!({ "tier": "pro", "interval": "month" })),
        ))
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let checkout_url = body["data"]["checkout_url"].as_str().unwrap();
    let session_id = body["data"]["session_id"].as_str().unwrap();
    assert!(checkout_url.starts_with("http://localhost:5000/billing/mock-checkout"));
    assert!(checkout_url.contains(session_id));

    // 顧客の対応が保存されている
    let customer = BillingCustomerRepository::new(app.db())
        .find_by_user_id(user.id)
        .await
        .unwrap()
        .unwrap();
    assert!(customer.stripe_customer_id.starts_with("cus_mock_"));
    assert_eq!(customer.email, user.email);
}

#[tokio::test]
async fn test_checkout_reuses_existing_customer() {
    let app = setup_test_app().await;
    let user = app.create_user();

    app.start_checkout(&user, "pro", "month").await;
    app.start_checkout(&user, "enterprise", "month").await;

    assert_eq!(app.gateway.customers_created(), 1);
}

#[tokio::test]
async fn test_checkout_rejects_free_and_unknown_tiers() {
    let app = setup_test_app().await;
    let user = app.create_user();

    for payload in [
        json!({ "tier": "free" }),
        json!({ "tier": "platinum" }),
        json!({ "tier": "pro", "interval": "week" }),
    ] {
        let response = app
            .send(api_request(
                "POST",
                "/api/billing/checkout",
                Some(&user.access_token),
                Some(payload.clone()),
            ))
            .await;
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "payload {} should be rejected",
            payload
        );
    }

    assert_eq!(app.gateway.customers_created(), 0);
}

#[tokio::test]
async fn test_checkout_rejects_unconfigured_price() {
    let app = setup_test_app().await;
    let user = app.create_user();

    let response = app
        .send(api_request(
            "POST",
            "/api/billing/checkout",
            Some(&user.access_token),
            Some(json!({ "tier": "enterprise", "interval": "year" })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("not available"));
}

#[tokio::test]
async fn test_checkout_conflicts_with_active_subscription() {
    // Arrange
    let app = setup_test_app().await;
    let user = app.create_user();
    app.subscribe(&user, "pro").await;

    // Act
    let response = app
        .send(api_request(
            "POST",
            "/api/billing/checkout",
            Some(&user.access_token),
            Some(json!({ "tier": "enterprise" })),
        ))
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_subscription_overview_defaults_to_free() {
    let app = setup_test_app().await;
    let user = app.create_user();

    let response = app
        .send(api_request(
            "GET",
            "/api/billing/subscription",
            Some(&user.access_token),
            None,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["tier"], "free");
    assert_eq!(body["data"]["is_entitled"], false);
    assert!(body["data"]["subscription"].is_null());
    assert_eq!(body["data"]["included_usage"], 1000);
}

#[tokio::test]
async fn test_subscription_overview_after_checkout() {
    // Arrange
    let app = setup_test_app().await;
    let user = app.create_user();
    let snapshot = app.subscribe(&user, "pro").await;

    // Act
    let response = app
        .send(api_request(
            "GET",
            "/api/billing/subscription",
            Some(&user.access_token),
            None,
        ))
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let data = &body["data"];
    assert_eq!(data["tier"], "pro");
    assert_eq!(data["tier_display_name"], "Pro");
    assert_eq!(data["is_entitled"], true);
    assert_eq!(data["included_usage"], 100000);

    let subscription = &data["subscription"];
    assert_eq!(subscription["stripe_subscription_id"], snapshot.id.as_str());
    assert_eq!(subscription["status"], "active");
    assert_eq!(subscription["billing_interval"], "month");
    assert_eq!(subscription["cancel_at_period_end"], false);
    assert_eq!(subscription["has_metered_usage"], true);
    assert!(!subscription["current_period_end"].is_null());
}

#[tokio::test]
async fn test_cancel_at_period_end_and_resume() {
    // Arrange
    let app = setup_test_app().await;
    let user = app.create_user();
    let snapshot = app.subscribe(&user, "pro").await;

    // Act: ボディ省略時は期間終了時の解約
    let response = app
        .send(api_request(
            "POST",
            "/api/billing/subscription/cancel",
            Some(&user.access_token),
            None,
        ))
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["cancel_at_period_end"], true);
    assert_eq!(body["data"]["status"], "active");
    assert_eq!(body["data"]["is_entitled"], true);
    assert!(app.gateway.subscription(&snapshot.id).unwrap().cancel_at_period_end);

    // Act: 解約予約を取り消す
    let response = app
        .send(api_request(
            "POST",
            "/api/billing/subscription/resume",
            Some(&user.access_token),
            None,
        ))
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["cancel_at_period_end"], false);
    assert!(!app.gateway.subscription(&snapshot.id).unwrap().cancel_at_period_end);
}

#[tokio::test]
async fn test_resume_without_scheduled_cancellation_fails() {
    let app = setup_test_app().await;
    let user = app.create_user();
    app.subscribe(&user, "pro").await;

    let response = app
        .send(api_request(
            "POST",
            "/api/billing/subscription/resume",
            Some(&user.access_token),
            None,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_without_subscription_returns_not_found() {
    let app = setup_test_app().await;
    let user = app.create_user();

    let response = app
        .send(api_request(
            "POST",
            "/api/billing/subscription/cancel",
            Some(&user.access_token),
            None,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_immediate_cancel_returns_user_to_free() {
    // Arrange
    let app = setup_test_app().await;
    let user = app.create_user();
    app.subscribe(&user, "pro").await;

    // Act
    let response = app
        .send(api_request(
            "POST",
            "/api/billing/subscription/cancel",
            Some(&user.access_token),
            Some(json!({ "at_period_end": false })),
        ))
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "canceled");
    assert_eq!(body["data"]["is_entitled"], false);

    let response = app
        .send(api_request(
            "GET",
            "/api/billing/subscription",
            Some(&user.access_token),
            None,
        ))
        .await;
    let body = body_json(response).await;
    assert_eq!(body["data"]["tier"], "free");
    assert_eq!(body["data"]["is_entitled"], false);
    // 解約済みでも最新のサブスクリプションは返す
    assert_eq!(body["data"]["subscription"]["status"], "canceled");
}

#[tokio::test]
async fn test_change_plan_updates_provider_and_local_state() {
    // Arrange
    let app = setup_test_app().await;
    let user = app.create_user();
    let snapshot = app.subscribe(&user, "pro").await;

    // Act
    let response = app
        .send(api_request(
            "POST",
            "/api/billing/subscription/plan",
            Some(&user.access_token),
            Some(json!({ "tier": "enterprise", "interval": "month" })),
        ))
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["tier"], "enterprise");

    let provider = app.gateway.subscription(&snapshot.id).unwrap();
    assert_eq!(
        provider.licensed_item().unwrap().price.id,
        "price_test_enterprise_monthly"
    );
    // 従量課金アイテムはそのまま
    assert_eq!(
        provider.metered_item().unwrap().price.id,
        "price_test_metered"
    );
}

#[tokio::test]
async fn test_change_plan_rejects_same_or_unavailable_plan() {
    let app = setup_test_app().await;
    let user = app.create_user();
    app.subscribe(&user, "pro").await;

    for payload in [
        json!({ "tier": "pro", "interval": "month" }),
        json!({ "tier": "enterprise", "interval": "year" }),
        json!({ "tier": "free", "interval": "month" }),
    ] {
        let response = app
            .send(api_request(
                "POST",
                "/api/billing/subscription/plan",
                Some(&user.access_token),
                Some(payload.clone()),
            ))
            .await;
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "payload {} should be rejected",
            payload
        );
    }
}

#[tokio::test]
async fn test_portal_requires_billing_account() {
    // Arrange
    let app = setup_test_app().await;
    let user = app.create_user();

    // Act & Assert: 顧客が未作成
    let response = app
        .send(api_request(
            "POST",
            "/api/billing/portal",
            Some(&user.access_token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Act & Assert: チェックアウト開始後は作成済み
    app.start_checkout(&user, "pro", "month").await;
    let response = app
        .send(api_request(
            "POST",
            "/api/billing/portal",
            Some(&user.access_token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let portal_url = body["data"]["portal_url"].as_str().unwrap();
    assert!(portal_url.contains("/billing/mock-portal?customer=cus_mock_"));
}

#[tokio::test]
async fn test_payment_history_pagination() {
    // Arrange
    let app = setup_test_app().await;
    let user = app.create_user();
    let snapshot = app.subscribe(&user, "pro").await;
    let now = chrono::Utc::now().timestamp();

    for i in 0..3 {
        let (status, body) = app
            .deliver_event(
                &new_event_id(),
                "invoice.paid",
                now + i,
                invoice_object(
                    &format!("in_test_{}", i),
                    snapshot.customer_id(),
                    Some(&snapshot.id),
                    1900,
                    Some(now + i),
                ),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "processed");
    }

    // Act
    let response = app
        .send(api_request(
            "GET",
            "/api/billing/payments?page=1&per_page=2",
            Some(&user.access_token),
            None,
        ))
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["status"], "succeeded");
    assert_eq!(items[0]["amount"], 1900);
    assert_eq!(items[0]["currency"], "usd");

    let pagination = &body["data"]["pagination"];
    assert_eq!(pagination["total_count"], 3);
    assert_eq!(pagination["total_pages"], 2);
    assert_eq!(pagination["has_next"], true);
    assert_eq!(pagination["has_prev"], false);
}

#[tokio::test]
async fn test_payment_history_rejects_invalid_page_size() {
    let app = setup_test_app().await;
    let user = app.create_user();

    for query in ["per_page=0", "per_page=101", "page=0"] {
        let response = app
            .send(api_request(
                "GET",
                &format!("/api/billing/payments?{}", query),
                Some(&user.access_token),
                None,
            ))
            .await;
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "query {} should be rejected",
            query
        );
    }
}

#[tokio::test]
async fn test_provider_outage_returns_service_unavailable() {
    // Arrange
    let app = setup_test_app().await;
    let user = app.create_user();
    app.gateway.set_unavailable(true);

    // Act
    let response = app
        .send(api_request(
            "POST",
            "/api/billing/checkout",
            Some(&user.access_token),
            Some(json!({ "tier": "pro" })),
        ))
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
}
