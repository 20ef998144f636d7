// src/service/usage_service.rs

use crate::db::DbPool;
use crate::domain::subscription_tier::SubscriptionTier;
use crate::domain::usage_record_model::{self, UsageAction};
use crate::error::{AppError, AppResult};
use crate::infrastructure::payment_gateway::PaymentGateway;
use crate::repository::subscription_repository::SubscriptionRepository;
use crate::repository::usage_record_repository::{CreateUsageRecord, UsageRecordRepository};
use chrono::{DateTime, Utc};
use sea_orm::SqlErr;
use std::sync::Arc;
use uuid::Uuid;

pub const MAX_USAGE_QUANTITY: u64 = 1_000_000_000;
const RECENT_RECORD_LIMIT: u64 = 10;

#[derive(Debug, Clone)]
pub struct RecordedUsage {
    pub record: usage_record_model::Model,
    /// 冪等キーにより既存の記録を返した
    pub replayed: bool,
}

/// 現在の請求期間の使用量
#[derive(Debug, Clone)]
pub struct UsageSummary {
    pub subscription_id: Option<Uuid>,
    pub tier: SubscriptionTier,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub total_usage: u64,
    pub included_usage: u64,
    pub overage: u64,
    pub recent_records: Vec<usage_record_model::Model>,
}

#[derive(Clone)]
pub struct UsageService {
    usage_repo: Arc<UsageRecordRepository>,
    subscription_repo: Arc<SubscriptionRepository>,
    gateway: Arc<dyn PaymentGateway>,
}

impl UsageService {
    pub fn new(db: DbPool, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            usage_repo: Arc::new(UsageRecordRepository::new(db.clone())),
            subscription_repo: Arc::new(SubscriptionRepository::new(db)),
            gateway,
        }
    }

    pub async fn record_usage(
        &self,
        user_id: Uuid,
        quantity: u64,
        action: UsageAction,
        idempotency_key: Option<String>,
    ) -> AppResult<RecordedUsage> {
        if quantity == 0 || quantity > MAX_USAGE_QUANTITY {
            return Err(AppError::ValidationError(format!(
                "quantity must be between 1 and {}",
                MAX_USAGE_QUANTITY
            )));
        }

        if let Some(key) = &idempotency_key {
            if let Some(record) = self.usage_repo.find_by_idempotency_key(key).await? {
                return Self::replay(record, user_id);
            }
        }

        let subscription = self
            .subscription_repo
            .find_entitled_by_user_id(user_id)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest("An active subscription is required to record usage".to_string())
            })?;
        let item_id = subscription.stripe_metered_item_id.clone().ok_or_else(|| {
            AppError::BadRequest("Your subscription does not include metered usage".to_string())
        })?;

        // プロバイダー側の冪等キーはアカウント全体で共有されるためユーザー単位にする
        let provider_key = idempotency_key
            .as_ref()
            .map(|key| format!("usage-{}-{}", user_id, key));
        let recorded_at = Utc::now();
        let stripe_usage_record_id = self
            .gateway
            .report_usage(
                &item_id,
                quantity,
                action,
                recorded_at,
                provider_key.as_deref(),
            )
            .await?;

        let created = self
            .usage_repo
            .create(CreateUsageRecord {
                user_id,
                subscription_id: subscription.id,
                stripe_subscription_item_id: item_id,
                stripe_usage_record_id: Some(stripe_usage_record_id),
                quantity: i64::try_from(quantity).unwrap_or(i64::MAX),
                action: action.as_str().to_string(),
                idempotency_key: idempotency_key.clone(),
                recorded_at,
            })
            .await;

        match created {
            Ok(record) => {
                tracing::info!(
                    user_id = %user_id,
                    subscription_id = %subscription.id,
                    quantity = quantity,
                    action = %action.as_str(),
                    "Usage recorded"
                );
                Ok(RecordedUsage {
                    record,
                    replayed: false,
                })
            }
            // 同じ冪等キーの同時リクエストに負けた場合は勝った方の記録を返す
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                let key = idempotency_key.ok_or(AppError::DbErr(e))?;
                let record = self
                    .usage_repo
                    .find_by_idempotency_key(&key)
                    .await?
                    .ok_or_else(|| {
                        AppError::InternalServerError(
                            "Usage record vanished after a conflict".to_string(),
                        )
                    })?;
                Self::replay(record, user_id)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn replay(record: usage_record_model::Model, user_id: Uuid) -> AppResult<RecordedUsage> {
        if record.user_id != user_id {
            return Err(AppError::Conflict(
                "Idempotency key has already been used".to_string(),
            ));
        }
        tracing::debug!(
            usage_record_id = %record.id,
            "Returning stored usage record for idempotency key"
        );
        Ok(RecordedUsage {
            record,
            replayed: true,
        })
    }

    pub async fn usage_summary(&self, user_id: Uuid) -> AppResult<UsageSummary> {
        let Some(subscription) = self
            .subscription_repo
            .find_entitled_by_user_id(user_id)
            .await?
        else {
            let tier = SubscriptionTier::Free;
            return Ok(UsageSummary {
                subscription_id: None,
                tier,
                period_start: None,
                period_end: None,
                total_usage: 0,
                included_usage: tier.included_usage(),
                overage: 0,
                recent_records: Vec::new(),
            });
        };

        let records = self
            .usage_repo
            .find_by_subscription_since(subscription.id, subscription.current_period_start)
            .await?;
        let total_usage = total_usage(&records);

        let tier = subscription.tier();
        let included_usage = tier.included_usage();
        let recent_records = self
            .usage_repo
            .find_recent_by_subscription(subscription.id, RECENT_RECORD_LIMIT)
            .await?;

        Ok(UsageSummary {
            subscription_id: Some(subscription.id),
            tier,
            period_start: subscription.current_period_start,
            period_end: subscription.current_period_end,
            total_usage,
            included_usage,
            overage: total_usage.saturating_sub(included_usage),
            recent_records,
        })
    }
}

/// 記録順に集計（incrementは加算、setは置き換え）
pub fn total_usage(records: &[usage_record_model::Model]) -> u64 {
    records.iter().fold(0u64, |total, record| {
        let quantity = u64::try_from(record.quantity).unwrap_or(0);
        match record.action() {
            UsageAction::Increment => total.saturating_add(quantity),
            UsageAction::Set => quantity,
        }
    })
}
