// src/domain/subscription_model.rs

use crate::domain::plan::BillingInterval;
use crate::domain::subscription_tier::SubscriptionTier;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    pub stripe_customer_id: String,

    #[sea_orm(unique)]
    pub stripe_subscription_id: String,

    /// 定額（licensed）アイテムの価格ID
    pub stripe_price_id: String,

    #[sea_orm(nullable)]
    pub stripe_metered_item_id: Option<String>,

    pub tier: String,

    pub billing_interval: String,

    pub status: String,

    pub cancel_at_period_end: bool,

    #[sea_orm(nullable)]
    pub current_period_start: Option<DateTime<Utc>>,

    #[sea_orm(nullable)]
    pub current_period_end: Option<DateTime<Utc>>,

    #[sea_orm(nullable)]
    pub cancel_at: Option<DateTime<Utc>>,

    #[sea_orm(nullable)]
    pub canceled_at: Option<DateTime<Utc>>,

    #[sea_orm(nullable)]
    pub ended_at: Option<DateTime<Utc>>,

    #[sea_orm(nullable)]
    pub trial_end: Option<DateTime<Utc>>,

    /// 適用済みWebhookイベントの最新created
    #[sea_orm(nullable)]
    pub last_event_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "crate::domain::usage_record_model::Entity")]
    UsageRecords,
}

impl Related<crate::domain::usage_record_model::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UsageRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn tier(&self) -> SubscriptionTier {
        SubscriptionTier::from_str(&self.tier).unwrap_or_default()
    }

    pub fn interval(&self) -> BillingInterval {
        BillingInterval::from_str(&self.billing_interval).unwrap_or_default()
    }

    pub fn status(&self) -> Option<SubscriptionStatus> {
        self.status.parse().ok()
    }

    /// 有料機能を利用できる状態か
    pub fn is_entitled(&self) -> bool {
        self.status().is_some_and(|s| s.is_entitled())
    }
}

/// サブスクリプションステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
    PastDue,
    Unpaid,
    Trialing,
    Incomplete,
    IncompleteExpired,
    Paused,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::Paused => "paused",
        }
    }

    pub fn is_entitled(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing | SubscriptionStatus::PastDue
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Canceled | SubscriptionStatus::IncompleteExpired
        )
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "unpaid" => Ok(SubscriptionStatus::Unpaid),
            "trialing" => Ok(SubscriptionStatus::Trialing),
            "incomplete" => Ok(SubscriptionStatus::Incomplete),
            "incomplete_expired" => Ok(SubscriptionStatus::IncompleteExpired),
            "paused" => Ok(SubscriptionStatus::Paused),
            _ => Err(format!("Invalid subscription status: {}", s)),
        }
    }
}
