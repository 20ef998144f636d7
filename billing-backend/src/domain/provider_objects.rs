// src/domain/provider_objects.rs

//! 決済プロバイダーのオブジェクトをSDKから切り離したスナップショット
//!
//! Webhookのペイロードとasync-stripeのレスポンスはどちらも同じJSON表現を持つため、
//! 必要なフィールドだけをここで受け取る。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// IDのみ、または展開済みオブジェクト
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpandableId {
    Id(String),
    Object { id: String },
}

impl ExpandableId {
    pub fn id(&self) -> &str {
        match self {
            ExpandableId::Id(id) => id,
            ExpandableId::Object { id } => id,
        }
    }
}

impl From<&str> for ExpandableId {
    fn from(id: &str) -> Self {
        ExpandableId::Id(id.to_string())
    }
}

/// UNIX秒をUTC日時に変換
pub fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
}

fn metadata_user_id(metadata: &HashMap<String, String>) -> Option<Uuid> {
    metadata
        .get("user_id")
        .and_then(|value| Uuid::parse_str(value).ok())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringSnapshot {
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub usage_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub id: String,
    #[serde(default)]
    pub recurring: Option<RecurringSnapshot>,
}

impl PriceSnapshot {
    pub fn is_metered(&self) -> bool {
        self.recurring
            .as_ref()
            .and_then(|r| r.usage_type.as_deref())
            == Some("metered")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionItemSnapshot {
    pub id: String,
    pub price: PriceSnapshot,
    #[serde(default)]
    pub quantity: Option<u64>,
    /// 新しいAPIバージョンでは期間がアイテム側にある
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ItemList {
    #[serde(default)]
    pub data: Vec<SubscriptionItemSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSnapshot {
    pub id: String,
    pub customer: ExpandableId,
    pub status: String,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at: Option<i64>,
    #[serde(default)]
    pub canceled_at: Option<i64>,
    #[serde(default)]
    pub ended_at: Option<i64>,
    #[serde(default)]
    pub trial_end: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub items: ItemList,
}

impl SubscriptionSnapshot {
    pub fn customer_id(&self) -> &str {
        self.customer.id()
    }

    /// 定額課金のアイテム（プランを決める価格）
    pub fn licensed_item(&self) -> Option<&SubscriptionItemSnapshot> {
        self.items.data.iter().find(|item| !item.price.is_metered())
    }

    pub fn metered_item(&self) -> Option<&SubscriptionItemSnapshot> {
        self.items.data.iter().find(|item| item.price.is_metered())
    }

    pub fn period_start(&self) -> Option<DateTime<Utc>> {
        timestamp(self.current_period_start.or_else(|| {
            self.items
                .data
                .iter()
                .find_map(|item| item.current_period_start)
        }))
    }

    pub fn period_end(&self) -> Option<DateTime<Utc>> {
        timestamp(self.current_period_end.or_else(|| {
            self.items
                .data
                .iter()
                .find_map(|item| item.current_period_end)
        }))
    }

    pub fn metadata_user_id(&self) -> Option<Uuid> {
        metadata_user_id(&self.metadata)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StatusTransitions {
    #[serde(default)]
    pub paid_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SubscriptionDetails {
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSnapshot {
    pub id: String,
    #[serde(default)]
    pub customer: Option<ExpandableId>,
    #[serde(default)]
    pub subscription: Option<ExpandableId>,
    #[serde(default)]
    pub payment_intent: Option<ExpandableId>,
    #[serde(default)]
    pub amount_due: i64,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub billing_reason: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub hosted_invoice_url: Option<String>,
    #[serde(default)]
    pub invoice_pdf: Option<String>,
    #[serde(default)]
    pub period_start: Option<i64>,
    #[serde(default)]
    pub period_end: Option<i64>,
    #[serde(default)]
    pub status_transitions: StatusTransitions,
    #[serde(default)]
    pub subscription_details: Option<SubscriptionDetails>,
}

impl InvoiceSnapshot {
    pub fn customer_id(&self) -> Option<&str> {
        self.customer.as_ref().map(ExpandableId::id)
    }

    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription.as_ref().map(ExpandableId::id)
    }

    pub fn metadata_user_id(&self) -> Option<Uuid> {
        self.subscription_details
            .as_ref()
            .and_then(|details| metadata_user_id(&details.metadata))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSessionSnapshot {
    pub id: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub customer: Option<ExpandableId>,
    #[serde(default)]
    pub subscription: Option<ExpandableId>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSessionSnapshot {
    /// client_reference_id を優先し、無ければメタデータから
    pub fn user_id(&self) -> Option<Uuid> {
        self.client_reference_id
            .as_deref()
            .and_then(|value| Uuid::parse_str(value).ok())
            .or_else(|| metadata_user_id(&self.metadata))
    }

    pub fn is_subscription(&self) -> bool {
        self.mode.as_deref() == Some("subscription")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}
