// src/api/dto/usage_dto.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::usage_record_model::{self, UsageAction};
use crate::service::usage_service::UsageSummary;
use crate::utils::validation::{validate_idempotency_key, validate_usage_action};

/// 従量課金の使用量報告リクエスト
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RecordUsageRequest {
    #[validate(range(
        min = 1,
        max = 1_000_000_000,
        message = "Quantity must be between 1 and 1000000000"
    ))]
    pub quantity: u64,

    #[validate(custom(function = validate_usage_action))]
    pub action: Option<String>,

    #[validate(custom(function = validate_idempotency_key))]
    pub idempotency_key: Option<String>,
}

impl RecordUsageRequest {
    pub fn action(&self) -> UsageAction {
        self.action
            .as_deref()
            .and_then(|action| action.parse().ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsageRecordResponse {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub stripe_usage_record_id: Option<String>,
    pub quantity: i64,
    pub action: String,
    pub idempotency_key: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl From<usage_record_model::Model> for UsageRecordResponse {
    fn from(model: usage_record_model::Model) -> Self {
        Self {
            id: model.id,
            subscription_id: model.subscription_id,
            stripe_usage_record_id: model.stripe_usage_record_id,
            quantity: model.quantity,
            action: model.action,
            idempotency_key: model.idempotency_key,
            recorded_at: model.recorded_at,
        }
    }
}

/// 現在の請求期間の使用量
#[derive(Debug, Serialize, Deserialize)]
pub struct UsageSummaryResponse {
    pub subscription_id: Option<Uuid>,
    pub tier: String,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub total_usage: u64,
    pub included_usage: u64,
    pub overage: u64,
    pub recent_records: Vec<UsageRecordResponse>,
}

impl From<UsageSummary> for UsageSummaryResponse {
    fn from(summary: UsageSummary) -> Self {
        Self {
            subscription_id: summary.subscription_id,
            tier: summary.tier.as_str().to_string(),
            period_start: summary.period_start,
            period_end: summary.period_end,
            total_usage: summary.total_usage,
            included_usage: summary.included_usage,
            overage: summary.overage,
            recent_records: summary
                .recent_records
                .into_iter()
                .map(UsageRecordResponse::from)
                .collect(),
        }
    }
}
