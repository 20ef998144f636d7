// src/domain/provider_event.rs

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// 署名検証済みのWebhookイベント
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub created: i64,
    #[serde(default)]
    pub livemode: bool,
    pub data: EventData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl ProviderEvent {
    pub fn kind(&self) -> ProviderEventKind {
        ProviderEventKind::from_type(&self.event_type)
    }

    pub fn data_object<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data.object)
    }
}

/// ディスパッチ対象のイベント種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEventKind {
    CheckoutSessionCompleted,
    SubscriptionChanged,
    InvoicePaid,
    InvoicePaymentFailed,
    InvoicePaymentActionRequired,
    CustomerDeleted,
    Unhandled,
}

impl ProviderEventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "customer.subscription.created"
            | "customer.subscription.updated"
            | "customer.subscription.deleted"
            | "customer.subscription.paused"
            | "customer.subscription.resumed" => Self::SubscriptionChanged,
            "invoice.paid" | "invoice.payment_succeeded" => Self::InvoicePaid,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            "invoice.payment_action_required" => Self::InvoicePaymentActionRequired,
            "customer.deleted" => Self::CustomerDeleted,
            _ => Self::Unhandled,
        }
    }
}
