// tests/common/app_helper.rs

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use billing_backend::{
    build_router,
    config::AppConfig,
    db::DbPool,
    domain::provider_objects::SubscriptionSnapshot,
    infrastructure::mock_gateway::MockPaymentGateway,
    utils::jwt::JwtManager,
    AppState,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::common::{
    self,
    auth_helper::{create_test_user, TestUser},
    db::TestDatabase,
    request::{api_request, body_json},
    stripe_helper::{checkout_session_object, event_payload, new_event_id, signed_webhook_request},
};

/// ルーター・状態・モックゲートウェイをまとめたテスト用アプリ
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub gateway: Arc<MockPaymentGateway>,
    pub config: AppConfig,
    _db: TestDatabase,
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with_config(AppConfig::for_testing()).await
}

pub async fn setup_test_app_with_config(config: AppConfig) -> TestApp {
    common::init_test_env();

    let db = TestDatabase::new().await;
    let gateway = Arc::new(MockPaymentGateway::new(config.app_base_url.clone()));
    let jwt_manager = Arc::new(JwtManager::new(config.jwt.clone()).unwrap());
    let state = AppState::new(
        db.connection.clone(),
        gateway.clone(),
        jwt_manager,
        &config,
    );
    let router = build_router(state.clone());

    TestApp {
        router,
        state,
        gateway,
        config,
        _db: db,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub fn create_user(&self) -> TestUser {
        create_test_user(&self.state.jwt_manager)
    }

    pub fn db(&self) -> DbPool {
        self.state.db.as_ref().clone()
    }

    /// 署名付きでWebhookイベントを配信
    pub async fn deliver_event(
        &self,
        event_id: &str,
        event_type: &str,
        created: i64,
        object: Value,
    ) -> (StatusCode, Value) {
        let payload = event_payload(event_id, event_type, created, object);
        let response = self.send(signed_webhook_request(&payload)).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    /// APIでチェックアウトを開始し、セッションIDを返す
    pub async fn start_checkout(&self, user: &TestUser, tier: &str, interval: &str) -> String {
        let response = self
            .send(api_request(
                "POST",
                "/api/billing/checkout",
                Some(&user.access_token),
                Some(json!({ "tier": tier, "interval": interval })),
            ))
            .await;
        let body: Value = body_json(response).await;
        body["data"]["session_id"].as_str().unwrap().to_string()
    }

    /// チェックアウト開始から完了Webhookの受信までを実行
    pub async fn subscribe(&self, user: &TestUser, tier: &str) -> SubscriptionSnapshot {
        let session_id = self.start_checkout(user, tier, "month").await;
        let subscription = self.gateway.complete_checkout(&session_id).unwrap();

        let (status, body) = self
            .deliver_event(
                &new_event_id(),
                "checkout.session.completed",
                chrono::Utc::now().timestamp(),
                checkout_session_object(
                    &session_id,
                    subscription.customer_id(),
                    &subscription.id,
                    user.id,
                ),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "processed", "checkout webhook: {}", body);

        subscription
    }
}
