// tests/common/stripe_helper.rs

use axum::{
    body::Body,
    http::{header, Request},
};
use billing_backend::domain::provider_objects::SubscriptionSnapshot;
use billing_backend::utils::webhook_signature::signature_header;
use serde_json::{json, Value};
use uuid::Uuid;

/// StripeConfig::for_testing() と同じシークレット
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

pub fn new_event_id() -> String {
    format!("evt_test_{}", Uuid::new_v4().simple())
}

/// Webhookイベントのペイロードを作成
pub fn event_payload(event_id: &str, event_type: &str, created: i64, object: Value) -> String {
    json!({
        "id": event_id,
        "object": "event",
        "api_version": "2024-04-10",
        "created": created,
        "data": {
            "object": object
        },
        "livemode": false,
        "pending_webhooks": 1,
        "request": {
            "id": null,
            "idempotency_key": null
        },
        "type": event_type
    })
    .to_string()
}

/// チェックアウト完了オブジェクト
pub fn checkout_session_object(
    session_id: &str,
    customer_id: &str,
    subscription_id: &str,
    user_id: Uuid,
) -> Value {
    json!({
        "id": session_id,
        "object": "checkout.session",
        "mode": "subscription",
        "status": "complete",
        "payment_status": "paid",
        "customer": customer_id,
        "subscription": subscription_id,
        "client_reference_id": user_id.to_string(),
        "customer_details": {
            "email": "checkout@example.com",
            "name": "Checkout User"
        },
        "metadata": {
            "user_id": user_id.to_string()
        }
    })
}

pub fn subscription_object(subscription: &SubscriptionSnapshot) -> Value {
    let mut value = serde_json::to_value(subscription).unwrap();
    value["object"] = json!("subscription");
    value
}

/// 請求書オブジェクト（amount_due と amount_paid は同額）
pub fn invoice_object(
    invoice_id: &str,
    customer_id: &str,
    subscription_id: Option<&str>,
    amount: i64,
    paid_at: Option<i64>,
) -> Value {
    json!({
        "id": invoice_id,
        "object": "invoice",
        "customer": customer_id,
        "subscription": subscription_id,
        "payment_intent": format!("pi_{}", invoice_id),
        "amount_due": amount,
        "amount_paid": if paid_at.is_some() { amount } else { 0 },
        "currency": "usd",
        "billing_reason": "subscription_cycle",
        "description": null,
        "hosted_invoice_url": format!("https://invoice.stripe.com/i/{}", invoice_id),
        "invoice_pdf": null,
        "period_start": 1_700_000_000,
        "period_end": 1_702_592_000,
        "status_transitions": {
            "paid_at": paid_at
        }
    })
}

pub fn customer_object(customer_id: &str) -> Value {
    json!({
        "id": customer_id,
        "object": "customer",
        "deleted": true
    })
}

/// 署名付きWebhookリクエスト
pub fn signed_webhook_request(payload: &str) -> Request<Body> {
    let timestamp = chrono::Utc::now().timestamp();
    let signature = signature_header(TEST_WEBHOOK_SECRET, timestamp, payload.as_bytes()).unwrap();
    webhook_request(payload, Some(&signature))
}

pub fn webhook_request(payload: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks/stripe")
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(signature) = signature {
        builder = builder.header("stripe-signature", signature);
    }

    builder.body(Body::from(payload.to_string())).unwrap()
}
