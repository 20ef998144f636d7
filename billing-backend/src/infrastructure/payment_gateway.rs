// src/infrastructure/payment_gateway.rs

use crate::domain::plan::BillingInterval;
use crate::domain::provider_objects::SubscriptionSnapshot;
use crate::domain::subscription_tier::SubscriptionTier;
use crate::domain::usage_record_model::UsageAction;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Invalid request to payment provider: {0}")]
    InvalidRequest(String),

    #[error("Payment provider resource not found: {0}")]
    NotFound(String),

    #[error("Payment provider error: {0}")]
    Provider(String),
}

/// チェックアウトセッション作成パラメータ
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub user_id: Uuid,
    pub tier: SubscriptionTier,
    pub interval: BillingInterval,
    /// 定額課金の価格
    pub price_id: String,
    /// 従量課金の価格（数量なしのラインアイテム）
    pub metered_price_id: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub trial_period_days: Option<u32>,
    pub allow_promotion_codes: bool,
}

impl CheckoutRequest {
    /// セッションとサブスクリプションに付与するメタデータ
    pub fn metadata(&self) -> Vec<(String, String)> {
        vec![
            ("user_id".to_string(), self.user_id.to_string()),
            ("tier".to_string(), self.tier.as_str().to_string()),
            ("interval".to_string(), self.interval.as_str().to_string()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionInfo {
    pub id: String,
    pub url: String,
}

/// 決済プロバイダーとの唯一の接点
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
        user_id: Uuid,
    ) -> Result<String, GatewayError>;

    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSessionInfo, GatewayError>;

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, GatewayError>;

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionSnapshot, GatewayError>;

    async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<SubscriptionSnapshot, GatewayError>;

    async fn cancel_subscription_now(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionSnapshot, GatewayError>;

    /// 定額アイテムの価格を差し替える（日割りはプロバイダー側で計算）
    async fn change_subscription_price(
        &self,
        subscription_id: &str,
        subscription_item_id: &str,
        price_id: &str,
    ) -> Result<SubscriptionSnapshot, GatewayError>;

    /// 従量課金の使用量を報告し、プロバイダー側のレコードIDを返す
    ///
    /// `idempotency_key` が同じ報告はプロバイダー側で一度だけ計上される。
    async fn report_usage(
        &self,
        subscription_item_id: &str,
        quantity: u64,
        action: UsageAction,
        timestamp: DateTime<Utc>,
        idempotency_key: Option<&str>,
    ) -> Result<String, GatewayError>;
}
