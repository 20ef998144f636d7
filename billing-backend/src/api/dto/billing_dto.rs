// src/api/dto/billing_dto.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::payment_model;
use crate::domain::plan::{BillingInterval, PlanInfo};
use crate::domain::subscription_model;
use crate::domain::subscription_tier::SubscriptionTier;
use crate::error::{AppError, AppResult};
use crate::service::billing_service::SubscriptionOverview;
use crate::utils::validation::{validate_interval, validate_paid_tier};

fn default_interval() -> String {
    BillingInterval::Month.as_str().to_string()
}

fn default_true() -> bool {
    true
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    10
}

/// 検証済みのティア名と請求間隔を列挙型に変換
fn parse_plan(tier: &str, interval: &str) -> AppResult<(SubscriptionTier, BillingInterval)> {
    let tier = SubscriptionTier::from_str(tier)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown tier: {}", tier)))?;
    let interval = BillingInterval::from_str(interval)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown interval: {}", interval)))?;
    Ok((tier, interval))
}

// --- Request DTOs ---

/// チェックアウトセッション作成リクエスト
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CheckoutRequestDto {
    #[validate(custom(function = validate_paid_tier))]
    pub tier: String,

    #[serde(default = "default_interval")]
    #[validate(custom(function = validate_interval))]
    pub interval: String,
}

impl CheckoutRequestDto {
    pub fn plan(&self) -> AppResult<(SubscriptionTier, BillingInterval)> {
        parse_plan(&self.tier, &self.interval)
    }
}

/// プラン変更リクエスト
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ChangePlanRequest {
    #[validate(custom(function = validate_paid_tier))]
    pub tier: String,

    #[serde(default = "default_interval")]
    #[validate(custom(function = validate_interval))]
    pub interval: String,
}

impl ChangePlanRequest {
    pub fn plan(&self) -> AppResult<(SubscriptionTier, BillingInterval)> {
        parse_plan(&self.tier, &self.interval)
    }
}

/// 解約リクエスト（省略時は期間終了時に解約）
#[derive(Debug, Serialize, Deserialize)]
pub struct CancelSubscriptionRequest {
    #[serde(default = "default_true")]
    pub at_period_end: bool,
}

impl Default for CancelSubscriptionRequest {
    fn default() -> Self {
        Self {
            at_period_end: true,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PaymentsQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlansQuery {
    pub interval: Option<String>,
}

impl PlansQuery {
    /// 不明な値は月額として扱う
    pub fn interval(&self) -> BillingInterval {
        self.interval
            .as_deref()
            .and_then(BillingInterval::from_str)
            .unwrap_or_default()
    }
}

// --- Response DTOs ---

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PortalResponse {
    pub portal_url: String,
}

/// 料金プラン一覧レスポンス
#[derive(Debug, Serialize)]
pub struct PlansResponse {
    pub interval: BillingInterval,
    pub currency: String,
    pub plans: Vec<PlanInfo>,
    pub publishable_key: String,
    pub test_mode: bool,
}

/// サブスクリプション情報
#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    pub id: Uuid,
    pub stripe_subscription_id: String,
    pub tier: String,
    pub tier_display_name: String,
    pub billing_interval: String,
    pub status: String,
    pub is_entitled: bool,
    pub cancel_at_period_end: bool,
    pub has_metered_usage: bool,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<subscription_model::Model> for SubscriptionResponse {
    fn from(model: subscription_model::Model) -> Self {
        let tier = model.tier();
        let is_entitled = model.is_entitled();
        Self {
            id: model.id,
            stripe_subscription_id: model.stripe_subscription_id,
            tier: tier.as_str().to_string(),
            tier_display_name: tier.display_name().to_string(),
            billing_interval: model.billing_interval,
            status: model.status,
            is_entitled,
            cancel_at_period_end: model.cancel_at_period_end,
            has_metered_usage: model.stripe_metered_item_id.is_some(),
            current_period_start: model.current_period_start,
            current_period_end: model.current_period_end,
            cancel_at: model.cancel_at,
            canceled_at: model.canceled_at,
            ended_at: model.ended_at,
            trial_end: model.trial_end,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// 現在の利用プラン概要
#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptionOverviewResponse {
    pub tier: String,
    pub tier_display_name: String,
    pub is_entitled: bool,
    pub features: Vec<String>,
    pub included_usage: u64,
    pub subscription: Option<SubscriptionResponse>,
}

impl From<SubscriptionOverview> for SubscriptionOverviewResponse {
    fn from(overview: SubscriptionOverview) -> Self {
        Self {
            tier: overview.tier.as_str().to_string(),
            tier_display_name: overview.tier.display_name().to_string(),
            is_entitled: overview.is_entitled,
            features: overview
                .tier
                .features()
                .into_iter()
                .map(str::to_string)
                .collect(),
            included_usage: overview.tier.included_usage(),
            subscription: overview.subscription.map(SubscriptionResponse::from),
        }
    }
}

/// 支払い履歴の1件
#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub stripe_invoice_id: String,
    pub stripe_subscription_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub billing_reason: Option<String>,
    pub description: Option<String>,
    pub hosted_invoice_url: Option<String>,
    pub invoice_pdf: Option<String>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<payment_model::Model> for PaymentResponse {
    fn from(model: payment_model::Model) -> Self {
        Self {
            id: model.id,
            stripe_invoice_id: model.stripe_invoice_id,
            stripe_subscription_id: model.stripe_subscription_id,
            amount: model.amount,
            currency: model.currency,
            status: model.status,
            billing_reason: model.billing_reason,
            description: model.description,
            hosted_invoice_url: model.hosted_invoice_url,
            invoice_pdf: model.invoice_pdf,
            period_start: model.period_start,
            period_end: model.period_end,
            paid_at: model.paid_at,
            created_at: model.created_at,
        }
    }
}
