// src/repository/subscription_repository.rs

use crate::domain::subscription_model::{
    self, ActiveModel as SubscriptionActiveModel, Column, Entity as SubscriptionEntity,
    SubscriptionStatus,
};
use chrono::{DateTime, Utc};
use sea_orm::entity::*;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DbConn, DbErr, Order, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

const ENTITLED_STATUSES: [SubscriptionStatus; 3] = [
    SubscriptionStatus::Active,
    SubscriptionStatus::Trialing,
    SubscriptionStatus::PastDue,
];

#[derive(Debug, Clone)]
pub struct SubscriptionRepository {
    db: DbConn,
}

impl SubscriptionRepository {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }

    pub async fn find_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<subscription_model::Model>, DbErr> {
        SubscriptionEntity::find()
            .filter(Column::StripeSubscriptionId.eq(stripe_subscription_id))
            .one(&self.db)
            .await
    }

    /// 有料機能を利用できる最新のサブスクリプション
    pub async fn find_entitled_by_user_id(
        &self,
        user_id: Uuid,
    ) -> Result<Option<subscription_model::Model>, DbErr> {
        SubscriptionEntity::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::Status.is_in(ENTITLED_STATUSES.iter().map(|s| s.as_str())))
            .order_by(Column::CreatedAt, Order::Desc)
            .one(&self.db)
            .await
    }

    pub async fn find_latest_by_user_id(
        &self,
        user_id: Uuid,
    ) -> Result<Option<subscription_model::Model>, DbErr> {
        SubscriptionEntity::find()
            .filter(Column::UserId.eq(user_id))
            .order_by(Column::CreatedAt, Order::Desc)
            .one(&self.db)
            .await
    }

    /// プロバイダーのサブスクリプションIDをキーに作成または更新
    ///
    /// `last_event_at` が None の場合は既存の値を保持する。
    pub async fn upsert(
        &self,
        upsert: UpsertSubscription,
    ) -> Result<subscription_model::Model, DbErr> {
        let now = Utc::now();
        let stripe_subscription_id = upsert.stripe_subscription_id.clone();

        let mut update_columns = vec![
            Column::StripeCustomerId,
            Column::StripePriceId,
            Column::StripeMeteredItemId,
            Column::Tier,
            Column::BillingInterval,
            Column::Status,
            Column::CancelAtPeriodEnd,
            Column::CurrentPeriodStart,
            Column::CurrentPeriodEnd,
            Column::CancelAt,
            Column::CanceledAt,
            Column::EndedAt,
            Column::TrialEnd,
            Column::UpdatedAt,
        ];
        if upsert.last_event_at.is_some() {
            update_columns.push(Column::LastEventAt);
        }

        let model = SubscriptionActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(upsert.user_id),
            stripe_customer_id: Set(upsert.stripe_customer_id),
            stripe_subscription_id: Set(upsert.stripe_subscription_id),
            stripe_price_id: Set(upsert.stripe_price_id),
            stripe_metered_item_id: Set(upsert.stripe_metered_item_id),
            tier: Set(upsert.tier),
            billing_interval: Set(upsert.billing_interval),
            status: Set(upsert.status),
            cancel_at_period_end: Set(upsert.cancel_at_period_end),
            current_period_start: Set(upsert.current_period_start),
            current_period_end: Set(upsert.current_period_end),
            cancel_at: Set(upsert.cancel_at),
            canceled_at: Set(upsert.canceled_at),
            ended_at: Set(upsert.ended_at),
            trial_end: Set(upsert.trial_end),
            last_event_at: Set(upsert.last_event_at),
            created_at: Set(now),
            updated_at: Set(now),
        };

        SubscriptionEntity::insert(model)
            .on_conflict(
                OnConflict::column(Column::StripeSubscriptionId)
                    .update_columns(update_columns)
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        self.find_by_stripe_subscription_id(&stripe_subscription_id)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound("Subscription not found".to_string()))
    }
}

/// サブスクリプション作成・更新用構造体
#[derive(Debug, Clone)]
pub struct UpsertSubscription {
    pub user_id: Uuid,
    pub stripe_customer_id: String,
    pub stripe_subscription_id: String,
    pub stripe_price_id: String,
    pub stripe_metered_item_id: Option<String>,
    pub tier: String,
    pub billing_interval: String,
    pub status: String,
    pub cancel_at_period_end: bool,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
    pub last_event_at: Option<DateTime<Utc>>,
}
