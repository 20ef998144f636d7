// src/domain/webhook_event_model.rs

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 受信したWebhookイベントの処理記録（重複排除用）
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "webhook_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub stripe_event_id: String,

    pub event_type: String,

    pub livemode: bool,

    pub status: String,

    #[sea_orm(nullable)]
    pub error: Option<String>,

    pub event_created_at: DateTime<Utc>,

    pub received_at: DateTime<Utc>,

    #[sea_orm(nullable)]
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn status(&self) -> Option<WebhookEventStatus> {
        self.status.parse().ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookEventStatus {
    Processing,
    Processed,
    Ignored,
    Failed,
}

impl WebhookEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventStatus::Processing => "processing",
            WebhookEventStatus::Processed => "processed",
            WebhookEventStatus::Ignored => "ignored",
            WebhookEventStatus::Failed => "failed",
        }
    }

    /// 処理が完了しており再適用しない状態か
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            WebhookEventStatus::Processed | WebhookEventStatus::Ignored
        )
    }
}

impl FromStr for WebhookEventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(WebhookEventStatus::Processing),
            "processed" => Ok(WebhookEventStatus::Processed),
            "ignored" => Ok(WebhookEventStatus::Ignored),
            "failed" => Ok(WebhookEventStatus::Failed),
            _ => Err(format!("Invalid webhook event status: {}", s)),
        }
    }
}
