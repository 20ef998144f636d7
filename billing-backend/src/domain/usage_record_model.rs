// src/domain/usage_record_model.rs

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "usage_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    pub subscription_id: Uuid,

    pub stripe_subscription_item_id: String,

    #[sea_orm(nullable)]
    pub stripe_usage_record_id: Option<String>,

    pub quantity: i64,

    pub action: String,

    #[sea_orm(unique, nullable)]
    pub idempotency_key: Option<String>,

    pub recorded_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::domain::subscription_model::Entity",
        from = "Column::SubscriptionId",
        to = "crate::domain::subscription_model::Column::Id",
        on_delete = "Cascade"
    )]
    Subscription,
}

impl Related<crate::domain::subscription_model::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscription.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn action(&self) -> UsageAction {
        self.action.parse().unwrap_or_default()
    }
}

/// 従量課金の報告方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UsageAction {
    /// 既存の値に加算
    #[default]
    Increment,
    /// 期間の合計値を置き換え
    Set,
}

impl UsageAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageAction::Increment => "increment",
            UsageAction::Set => "set",
        }
    }
}

impl FromStr for UsageAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "increment" => Ok(UsageAction::Increment),
            "set" => Ok(UsageAction::Set),
            _ => Err(format!("Invalid usage action: {}", s)),
        }
    }
}
