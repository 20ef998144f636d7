// tests/integration/webhook_tests.rs

use crate::common::app_helper::{setup_test_app, setup_test_app_with_config};
use crate::common::request::{api_request, body_json};
use crate::common::stripe_helper::{
    checkout_session_object, customer_object, event_payload, invoice_object, new_event_id,
    signed_webhook_request, subscription_object, webhook_request,
};
use axum::http::StatusCode;
use billing_backend::config::AppConfig;
use billing_backend::domain::provider_objects::ExpandableId;
use billing_backend::domain::webhook_event_model;
use billing_backend::repository::{
    billing_customer_repository::BillingCustomerRepository,
    payment_repository::PaymentRepository, subscription_repository::SubscriptionRepository,
    webhook_event_repository::WebhookEventRepository,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;

#[tokio::test]
async fn test_webhook_requires_signature() {
    // Arrange
    let app = setup_test_app().await;
    let payload = event_payload(
        &new_event_id(),
        "customer.subscription.updated",
        chrono::Utc::now().timestamp(),
        json!({ "id": "sub_x" }),
    );

    // Act
    let response = app.send(webhook_request(&payload, None)).await;

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_rejects_invalid_signature() {
    let app = setup_test_app().await;
    let payload = event_payload(
        &new_event_id(),
        "customer.subscription.updated",
        chrono::Utc::now().timestamp(),
        json!({ "id": "sub_x" }),
    );
    let timestamp = chrono::Utc::now().timestamp();
    let forged = format!("t={},v1={}", timestamp, "0".repeat(64));

    let response = app.send(webhook_request(&payload, Some(&forged))).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    // 検証に失敗したイベントは記録しない
    let count = webhook_event_model::Entity::find()
        .count(&app.db())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_webhook_rejects_malformed_payload() {
    let app = setup_test_app().await;

    let response = app.send(signed_webhook_request("{not json")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_completed_links_customer_and_subscription() {
    // Arrange & Act
    let app = setup_test_app().await;
    let user = app.create_user();
    let snapshot = app.subscribe(&user, "pro").await;

    // Assert
    let subscription = SubscriptionRepository::new(app.db())
        .find_by_stripe_subscription_id(&snapshot.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subscription.user_id, user.id);
    assert_eq!(subscription.tier, "pro");
    assert_eq!(subscription.status, "active");
    assert!(subscription.last_event_at.is_some());
    assert!(subscription.stripe_metered_item_id.is_some());

    let customer = BillingCustomerRepository::new(app.db())
        .find_by_user_id(user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(customer.stripe_customer_id, snapshot.customer_id());
    assert_eq!(customer.email, "checkout@example.com");
}

#[tokio::test]
async fn test_duplicate_delivery_is_acknowledged_once() {
    // Arrange
    let app = setup_test_app().await;
    let user = app.create_user();
    let snapshot = app.subscribe(&user, "pro").await;
    let event_id = new_event_id();
    let now = chrono::Utc::now().timestamp();
    let invoice = invoice_object(
        "in_dup",
        snapshot.customer_id(),
        Some(&snapshot.id),
        1900,
        Some(now),
    );

    // Act
    let (first_status, first) = app
        .deliver_event(&event_id, "invoice.paid", now, invoice.clone())
        .await;
    let (second_status, second) = app
        .deliver_event(&event_id, "invoice.paid", now, invoice)
        .await;

    // Assert
    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(first["outcome"], "processed");
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(second["received"], true);
    assert_eq!(second["outcome"], "duplicate");

    let count = webhook_event_model::Entity::find()
        .filter(webhook_event_model::Column::StripeEventId.eq(event_id.as_str()))
        .count(&app.db())
        .await
        .unwrap();
    assert_eq!(count, 1);

    let payments = PaymentRepository::new(app.db())
        .find_recent_by_user_id(user.id, 10)
        .await
        .unwrap();
    assert_eq!(payments.len(), 1);
}

#[tokio::test]
async fn test_stale_subscription_event_is_ignored() {
    // Arrange
    let app = setup_test_app().await;
    let user = app.create_user();
    let snapshot = app.subscribe(&user, "pro").await;
    let now = chrono::Utc::now().timestamp();

    let mut outdated = snapshot.clone();
    outdated.status = "past_due".to_string();

    // Act: チェックアウト完了より前に作成されたイベント
    let (status, body) = app
        .deliver_event(
            &new_event_id(),
            "customer.subscription.updated",
            now - 3600,
            subscription_object(&outdated),
        )
        .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ignored");

    let subscription = SubscriptionRepository::new(app.db())
        .find_by_stripe_subscription_id(&snapshot.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subscription.status, "active");
}

#[tokio::test]
async fn test_newer_subscription_event_is_applied() {
    // Arrange
    let app = setup_test_app().await;
    let user = app.create_user();
    let snapshot = app.subscribe(&user, "pro").await;
    let now = chrono::Utc::now().timestamp();

    let mut updated = snapshot.clone();
    updated.cancel_at_period_end = true;
    updated.cancel_at = updated.current_period_end;

    // Act
    let (_, body) = app
        .deliver_event(
            &new_event_id(),
            "customer.subscription.updated",
            now + 60,
            subscription_object(&updated),
        )
        .await;

    // Assert
    assert_eq!(body["outcome"], "processed");
    let subscription = SubscriptionRepository::new(app.db())
        .find_by_stripe_subscription_id(&snapshot.id)
        .await
        .unwrap()
        .unwrap();
    assert!(subscription.cancel_at_period_end);
    assert!(subscription.cancel_at.is_some());
}

#[tokio::test]
async fn test_subscription_deleted_ends_entitlement() {
    let app = setup_test_app().await;
    let user = app.create_user();
    let snapshot = app.subscribe(&user, "pro").await;
    let now = chrono::Utc::now().timestamp();

    let mut ended = snapshot.clone();
    ended.status = "canceled".to_string();
    ended.ended_at = Some(now);

    let (_, body) = app
        .deliver_event(
            &new_event_id(),
            "customer.subscription.deleted",
            now + 60,
            subscription_object(&ended),
        )
        .await;
    assert_eq!(body["outcome"], "processed");

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
}

#[tokio::test]
async fn test_succeeded_payment_is_not_downgraded() {
    // Arrange
    let app = setup_test_app().await;
    let user = app.create_user();
    let snapshot = app.subscribe(&user, "pro").await;
    let now = chrono::Utc::now().timestamp();

    let (_, paid) = app
        .deliver_event(
            &new_event_id(),
            "invoice.paid",
            now,
            invoice_object(
                "in_paid",
                snapshot.customer_id(),
                Some(&snapshot.id),
                1900,
                Some(now),
            ),
        )
        .await;
    assert_eq!(paid["outcome"], "processed");

    // Act: 遅れて届いた失敗通知
    let (status, failed) = app
        .deliver_event(
            &new_event_id(),
            "invoice.payment_failed",
            now + 10,
            invoice_object(
                "in_paid",
                snapshot.customer_id(),
                Some(&snapshot.id),
                1900,
                None,
            ),
        )
        .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(failed["outcome"], "ignored");

    let payment = PaymentRepository::new(app.db())
        .find_by_stripe_invoice_id("in_paid")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, "succeeded");
    assert_eq!(payment.amount, 1900);
    assert!(payment.paid_at.is_some());
}

#[tokio::test]
async fn test_failed_payment_is_recorded() {
    let app = setup_test_app().await;
    let user = app.create_user();
    let snapshot = app.subscribe(&user, "pro").await;
    let now = chrono::Utc::now().timestamp();

    let (_, body) = app
        .deliver_event(
            &new_event_id(),
            "invoice.payment_failed",
            now,
            invoice_object(
                "in_failed",
                snapshot.customer_id(),
                Some(&snapshot.id),
                4900,
                None,
            ),
        )
        .await;

    assert_eq!(body["outcome"], "processed");
    let payment = PaymentRepository::new(app.db())
        .find_by_stripe_invoice_id("in_failed")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, "failed");
    assert_eq!(payment.amount, 4900);
    assert_eq!(payment.user_id, user.id);
    assert!(payment.paid_at.is_none());
}

#[tokio::test]
async fn test_subscription_without_known_owner_is_ignored() {
    // Arrange
    let app = setup_test_app().await;
    let user = app.create_user();
    let snapshot = app.subscribe(&user, "pro").await;

    let mut orphan = snapshot.clone();
    orphan.id = "sub_orphan".to_string();
    orphan.customer = ExpandableId::Id("cus_unknown".to_string());
    orphan.metadata.clear();

    // Act
    let (status, body) = app
        .deliver_event(
            &new_event_id(),
            "customer.subscription.created",
            chrono::Utc::now().timestamp(),
            subscription_object(&orphan),
        )
        .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ignored");
    let stored = SubscriptionRepository::new(app.db())
        .find_by_stripe_subscription_id("sub_orphan")
        .await
        .unwrap();
    assert!(stored.is_none());
}

#[tokio::test]
async fn test_customer_deleted_removes_billing_account() {
    // Arrange
    let app = setup_test_app().await;
    let user = app.create_user();
    app.start_checkout(&user, "pro", "month").await;
    let customer = BillingCustomerRepository::new(app.db())
        .find_by_user_id(user.id)
        .await
        .unwrap()
        .unwrap();

    // Act
    let (_, body) = app
        .deliver_event(
            &new_event_id(),
            "customer.deleted",
            chrono::Utc::now().timestamp(),
            customer_object(&customer.stripe_customer_id),
        )
        .await;

    // Assert
    assert_eq!(body["outcome"], "processed");
    let response = app
        .send(api_request(
            "POST",
            "/api/billing/portal",
            Some(&user.access_token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unhandled_event_type_is_ignored() {
    let app = setup_test_app().await;
    let event_id = new_event_id();

    let (status, body) = app
        .deliver_event(
            &event_id,
            "charge.refunded",
            chrono::Utc::now().timestamp(),
            json!({ "id": "ch_test", "object": "charge" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ignored");

    let record = WebhookEventRepository::new(app.db())
        .find_by_stripe_event_id(&event_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, "ignored");
    assert_eq!(record.event_type, "charge.refunded");
    assert!(record.processed_at.is_some());
}

#[tokio::test]
async fn test_failed_event_is_reprocessed_on_redelivery() {
    // Arrange: プロバイダー側にまだ存在しないサブスクリプション
    let app = setup_test_app().await;
    let user = app.create_user();
    let session_id = app.start_checkout(&user, "pro", "month").await;
    let mut late = app.gateway.complete_checkout(&session_id).unwrap();
    late.id = "sub_late".to_string();

    let event_id = new_event_id();
    let object = checkout_session_object(&session_id, late.customer_id(), &late.id, user.id);
    let now = chrono::Utc::now().timestamp();

    // Act: 初回は取得に失敗
    let (status, first) = app
        .deliver_event(&event_id, "checkout.session.completed", now, object.clone())
        .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["outcome"], "failed");
    let record = WebhookEventRepository::new(app.db())
        .find_by_stripe_event_id(&event_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, "failed");
    assert!(record.error.is_some());

    // Act: 再送時には取得できる
    app.gateway.insert_subscription(late.clone());
    let (_, second) = app
        .deliver_event(&event_id, "checkout.session.completed", now, object)
        .await;

    // Assert
    assert_eq!(second["outcome"], "processed");
    let subscription = SubscriptionRepository::new(app.db())
        .find_by_stripe_subscription_id("sub_late")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subscription.user_id, user.id);

    let count = webhook_event_model::Entity::find()
        .filter(webhook_event_model::Column::StripeEventId.eq(event_id.as_str()))
        .count(&app.db())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_event_created_before_api_cancel_is_ignored() {
    // Arrange: 100秒前に完了したチェックアウト
    let app = setup_test_app().await;
    let user = app.create_user();
    let session_id = app.start_checkout(&user, "pro", "month").await;
    let snapshot = app.gateway.complete_checkout(&session_id).unwrap();
    let now = chrono::Utc::now().timestamp();

    let (_, body) = app
        .deliver_event(
            &new_event_id(),
            "checkout.session.completed",
            now - 100,
            checkout_session_object(&session_id, snapshot.customer_id(), &snapshot.id, user.id),
        )
        .await;
    assert_eq!(body["outcome"], "processed");

    let response = app
        .send(api_request(
            "POST",
            "/api/billing/subscription/cancel",
            Some(&user.access_token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Act: 解約前の状態を持つイベントが解約後に届く
    let (status, body) = app
        .deliver_event(
            &new_event_id(),
            "customer.subscription.updated",
            now - 50,
            subscription_object(&snapshot),
        )
        .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ignored");

    let subscription = SubscriptionRepository::new(app.db())
        .find_by_stripe_subscription_id(&snapshot.id)
        .await
        .unwrap()
        .unwrap();
    assert!(subscription.cancel_at_period_end);
    assert!(
        app.gateway
            .subscription(&snapshot.id)
            .unwrap()
            .cancel_at_period_end
    );
}

#[tokio::test]
async fn test_payment_action_required_is_recorded() {
    // Arrange
    let app = setup_test_app().await;
    let user = app.create_user();
    let snapshot = app.subscribe(&user, "pro").await;

    // Act
    let (status, body) = app
        .deliver_event(
            &new_event_id(),
            "invoice.payment_action_required",
            chrono::Utc::now().timestamp(),
            invoice_object(
                "in_3ds",
                snapshot.customer_id(),
                Some(&snapshot.id),
                4900,
                None,
            ),
        )
        .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "processed");

    let payment = PaymentRepository::new(app.db())
        .find_by_stripe_invoice_id("in_3ds")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.user_id, user.id);
    assert_eq!(payment.status, "requires_action");
    assert_eq!(payment.amount, 4900);
    assert!(payment.paid_at.is_none());
}

#[tokio::test]
async fn test_payment_action_required_does_not_downgrade_succeeded_payment() {
    let app = setup_test_app().await;
    let user = app.create_user();
    let snapshot = app.subscribe(&user, "pro").await;
    let now = chrono::Utc::now().timestamp();

    let (_, paid) = app
        .deliver_event(
            &new_event_id(),
            "invoice.paid",
            now,
            invoice_object(
                "in_settled",
                snapshot.customer_id(),
                Some(&snapshot.id),
                1900,
                Some(now),
            ),
        )
        .await;
    assert_eq!(paid["outcome"], "processed");

    let (_, body) = app
        .deliver_event(
            &new_event_id(),
            "invoice.payment_action_required",
            now + 10,
            invoice_object(
                "in_settled",
                snapshot.customer_id(),
                Some(&snapshot.id),
                1900,
                None,
            ),
        )
        .await;

    assert_eq!(body["outcome"], "ignored");
    let payment = PaymentRepository::new(app.db())
        .find_by_stripe_invoice_id("in_settled")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, "succeeded");
    assert!(payment.paid_at.is_some());
}

#[tokio::test]
async fn test_unsigned_event_is_processed_without_webhook_secret() {
    // Arrange: シークレット未設定の開発モード
    let mut config = AppConfig::for_testing();
    config.stripe.webhook_secret = String::new();
    let app = setup_test_app_with_config(config).await;
    let user = app.create_user();
    let session_id = app.start_checkout(&user, "pro", "month").await;
    let snapshot = app.gateway.complete_checkout(&session_id).unwrap();
    let payload = event_payload(
        &new_event_id(),
        "checkout.session.completed",
        chrono::Utc::now().timestamp(),
        checkout_session_object(&session_id, snapshot.customer_id(), &snapshot.id, user.id),
    );

    // Act
    let response = app.send(webhook_request(&payload, None)).await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["outcome"], "processed");

    let subscription = SubscriptionRepository::new(app.db())
        .find_by_stripe_subscription_id(&snapshot.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subscription.user_id, user.id);
    assert_eq!(subscription.tier, "pro");
}

#[tokio::test]
async fn test_paused_and_resumed_subscription_events() {
    // Arrange
    let app = setup_test_app().await;
    let user = app.create_user();
    let snapshot = app.subscribe(&user, "pro").await;
    let now = chrono::Utc::now().timestamp();

    let mut paused = snapshot.clone();
    paused.status = "paused".to_string();

    // Act: 一時停止
    let (_, body) = app
        .deliver_event(
            &new_event_id(),
            "customer.subscription.paused",
            now + 60,
            subscription_object(&paused),
        )
        .await;

    // Assert: 一時停止中は利用権がない
    assert_eq!(body["outcome"], "processed");
    let subscription = SubscriptionRepository::new(app.db())
        .find_by_stripe_subscription_id(&snapshot.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subscription.status, "paused");

    let response = app
        .send(api_request(
            "GET",
            "/api/billing/subscription",
            Some(&user.access_token),
            None,
        ))
        .await;
    let overview = body_json(response).await;
    assert_eq!(overview["data"]["tier"], "free");
    assert_eq!(overview["data"]["is_entitled"], false);

    // Act: 再開
    let (_, body) = app
        .deliver_event(
            &new_event_id(),
            "customer.subscription.resumed",
            now + 120,
            subscription_object(&snapshot),
        )
        .await;

    // Assert
    assert_eq!(body["outcome"], "processed");
    let response = app
        .send(api_request(
            "GET",
            "/api/billing/subscription",
            Some(&user.access_token),
            None,
        ))
        .await;
    let overview = body_json(response).await;
    assert_eq!(overview["data"]["tier"], "pro");
    assert_eq!(overview["data"]["is_entitled"], true);
}
