// src/repository/webhook_event_repository.rs

use crate::domain::webhook_event_model::{
    self, ActiveModel as WebhookEventActiveModel, Column, Entity as WebhookEventEntity,
    WebhookEventStatus,
};
use chrono::{DateTime, Utc};
use sea_orm::entity::*;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DbConn, DbErr, QueryFilter, Set};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct WebhookEventRepository {
    db: DbConn,
}

impl WebhookEventRepository {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }

    pub async fn find_by_stripe_event_id(
        &self,
        stripe_event_id: &str,
    ) -> Result<Option<webhook_event_model::Model>, DbErr> {
        WebhookEventEntity::find()
            .filter(Column::StripeEventId.eq(stripe_event_id))
            .one(&self.db)
            .await
    }

    /// イベントを処理中として記録（再送時は状態をリセット）
    pub async fn begin_processing(
        &self,
        record: RecordWebhookEvent,
    ) -> Result<webhook_event_model::Model, DbErr> {
        let stripe_event_id = record.stripe_event_id.clone();

        let model = WebhookEventActiveModel {
            id: Set(Uuid::new_v4()),
            stripe_event_id: Set(record.stripe_event_id),
            event_type: Set(record.event_type),
            livemode: Set(record.livemode),
            status: Set(WebhookEventStatus::Processing.as_str().to_string()),
            error: Set(None),
            event_created_at: Set(record.event_created_at),
            received_at: Set(Utc::now()),
            processed_at: Set(None),
        };

        WebhookEventEntity::insert(model)
            .on_conflict(
                OnConflict::column(Column::StripeEventId)
                    .update_columns([
                        Column::Status,
                        Column::Error,
                        Column::ReceivedAt,
                        Column::ProcessedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        self.find_by_stripe_event_id(&stripe_event_id)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound("Webhook event not found".to_string()))
    }

    pub async fn mark_finished(
        &self,
        id: Uuid,
        status: WebhookEventStatus,
        error: Option<String>,
    ) -> Result<webhook_event_model::Model, DbErr> {
        let event = WebhookEventEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound("Webhook event not found".to_string()))?;

        let mut active_model: WebhookEventActiveModel = event.into();
        active_model.status = Set(status.as_str().to_string());
        active_model.error = Set(error);
        active_model.processed_at = Set(Some(Utc::now()));
        active_model.update(&self.db).await
    }
}

/// Webhookイベント記録用構造体
#[derive(Debug, Clone)]
pub struct RecordWebhookEvent {
    pub stripe_event_id: String,
    pub event_type: String,
    pub livemode: bool,
    pub event_created_at: DateTime<Utc>,
}
