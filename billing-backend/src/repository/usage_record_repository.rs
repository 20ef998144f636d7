// src/repository/usage_record_repository.rs

use crate::domain::usage_record_model::{
    self, ActiveModel as UsageRecordActiveModel, Column, Entity as UsageRecordEntity,
};
use chrono::{DateTime, Utc};
use sea_orm::entity::*;
use sea_orm::{DbConn, DbErr, Order, QueryFilter, QueryOrder, QuerySelect, Set};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UsageRecordRepository {
    db: DbConn,
}

impl UsageRecordRepository {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }

    pub async fn find_by_idempotency_key(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<usage_record_model::Model>, DbErr> {
        UsageRecordEntity::find()
            .filter(Column::IdempotencyKey.eq(idempotency_key))
            .one(&self.db)
            .await
    }

    pub async fn create(
        &self,
        create: CreateUsageRecord,
    ) -> Result<usage_record_model::Model, DbErr> {
        let record = UsageRecordActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(create.user_id),
            subscription_id: Set(create.subscription_id),
            stripe_subscription_item_id: Set(create.stripe_subscription_item_id),
            stripe_usage_record_id: Set(create.stripe_usage_record_id),
            quantity: Set(create.quantity),
            action: Set(create.action),
            idempotency_key: Set(create.idempotency_key),
            recorded_at: Set(create.recorded_at),
            created_at: Set(Utc::now()),
        };

        record.insert(&self.db).await
    }

    /// 指定時刻以降の記録を古い順に取得
    pub async fn find_by_subscription_since(
        &self,
        subscription_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<usage_record_model::Model>, DbErr> {
        let mut query = UsageRecordEntity::find().filter(Column::SubscriptionId.eq(subscription_id));
        if let Some(since) = since {
            query = query.filter(Column::RecordedAt.gte(since));
        }

        query
            .order_by(Column::RecordedAt, Order::Asc)
            .order_by(Column::CreatedAt, Order::Asc)
            .all(&self.db)
            .await
    }

    pub async fn find_recent_by_subscription(
        &self,
        subscription_id: Uuid,
        limit: u64,
    ) -> Result<Vec<usage_record_model::Model>, DbErr> {
        UsageRecordEntity::find()
            .filter(Column::SubscriptionId.eq(subscription_id))
            .order_by(Column::RecordedAt, Order::Desc)
            .order_by(Column::CreatedAt, Order::Desc)
            .limit(limit)
            .all(&self.db)
            .await
    }
}

/// 使用量記録作成用構造体
#[derive(Debug, Clone)]
pub struct CreateUsageRecord {
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub stripe_subscription_item_id: String,
    pub stripe_usage_record_id: Option<String>,
    pub quantity: i64,
    pub action: String,
    pub idempotency_key: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
