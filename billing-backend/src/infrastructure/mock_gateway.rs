// src/infrastructure/mock_gateway.rs

//! 開発モードとテスト用のインメモリ決済ゲートウェイ

use super::payment_gateway::{CheckoutRequest, CheckoutSessionInfo, GatewayError, PaymentGateway};
use crate::domain::provider_objects::{
    ExpandableId, ItemList, PriceSnapshot, RecurringSnapshot, SubscriptionItemSnapshot,
    SubscriptionSnapshot,
};
use crate::domain::usage_record_model::UsageAction;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// モックが受け付けた使用量報告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageReport {
    pub id: String,
    pub subscription_item_id: String,
    pub quantity: u64,
    pub action: UsageAction,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    customers: HashMap<String, Uuid>,
    checkout_sessions: HashMap<String, CheckoutRequest>,
    subscriptions: HashMap<String, SubscriptionSnapshot>,
    usage_reports: Vec<UsageReport>,
    usage_keys: HashMap<String, String>,
    unavailable: bool,
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}_mock_{}", prefix, self.next_id)
    }
}

pub struct MockPaymentGateway {
    base_url: String,
    state: Mutex<MockState>,
}

impl MockPaymentGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            state: Mutex::new(MockState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn available_state(&self) -> Result<MutexGuard<'_, MockState>, GatewayError> {
        let state = self.state();
        if state.unavailable {
            return Err(GatewayError::Provider(
                "Mock payment provider is unavailable".to_string(),
            ));
        }
        Ok(state)
    }

    /// 障害をシミュレートする
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    pub fn insert_subscription(&self, subscription: SubscriptionSnapshot) {
        self.state()
            .subscriptions
            .insert(subscription.id.clone(), subscription);
    }

    pub fn subscription(&self, subscription_id: &str) -> Option<SubscriptionSnapshot> {
        self.state().subscriptions.get(subscription_id).cloned()
    }

    pub fn customers_created(&self) -> usize {
        self.state().customers.len()
    }

    pub fn usage_reports(&self) -> Vec<UsageReport> {
        self.state().usage_reports.clone()
    }

    /// ホスト型チェックアウトの完了を再現し、作成されたサブスクリプションを返す
    pub fn complete_checkout(&self, session_id: &str) -> Option<SubscriptionSnapshot> {
        let mut state = self.state();
        let request = state.checkout_sessions.remove(session_id)?;
        let subscription_id = state.next_id("sub");
        let licensed_item_id = state.next_id("si");
        let metered_item_id = state.next_id("si");

        let now = Utc::now();
        let mut items = vec![SubscriptionItemSnapshot {
            id: licensed_item_id,
            price: price_snapshot(&request.price_id, request.interval.as_str(), "licensed"),
            quantity: Some(1),
            current_period_start: None,
            current_period_end: None,
        }];
        if let Some(metered_price_id) = &request.metered_price_id {
            items.push(SubscriptionItemSnapshot {
                id: metered_item_id,
                price: price_snapshot(metered_price_id, request.interval.as_str(), "metered"),
                quantity: None,
                current_period_start: None,
                current_period_end: None,
            });
        }

        let period_days = match request.interval {
            crate::domain::plan::BillingInterval::Month => 30,
            crate::domain::plan::BillingInterval::Year => 365,
        };
        let trial_end = request
            .trial_period_days
            .map(|days| (now + Duration::days(i64::from(days))).timestamp());

        let subscription = SubscriptionSnapshot {
            id: subscription_id.clone(),
            customer: ExpandableId::Id(request.customer_id.clone()),
            status: if trial_end.is_some() {
                "trialing".to_string()
            } else {
                "active".to_string()
            },
            cancel_at_period_end: false,
            current_period_start: Some(now.timestamp()),
            current_period_end: Some((now + Duration::days(period_days)).timestamp()),
            cancel_at: None,
            canceled_at: None,
            ended_at: None,
            trial_end,
            metadata: request.metadata().into_iter().collect(),
            items: ItemList { data: items },
        };

        state
            .subscriptions
            .insert(subscription_id, subscription.clone());
        Some(subscription)
    }
}

fn price_snapshot(price_id: &str, interval: &str, usage_type: &str) -> PriceSnapshot {
    PriceSnapshot {
        id: price_id.to_string(),
        recurring: Some(RecurringSnapshot {
            interval: Some(interval.to_string()),
            usage_type: Some(usage_type.to_string()),
        }),
    }
}

fn not_found(subscription_id: &str) -> GatewayError {
    GatewayError::NotFound(format!("No such subscription: '{}'", subscription_id))
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_customer(
        &self,
        email: &str,
        _name: Option<&str>,
        user_id: Uuid,
    ) -> Result<String, GatewayError> {
        let mut state = self.available_state()?;
        let customer_id = state.next_id("cus");
        state.customers.insert(customer_id.clone(), user_id);
        tracing::debug!(customer_id = %customer_id, email = %email, "Mock customer created");
        Ok(customer_id)
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSessionInfo, GatewayError> {
        let mut state = self.available_state()?;
        let session_id = state.next_id("cs");
        let url = format!(
            "{}/billing/mock-checkout?session_id={}",
            self.base_url, session_id
        );
        state.checkout_sessions.insert(session_id.clone(), request);
        Ok(CheckoutSessionInfo {
            id: session_id,
            url,
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, GatewayError> {
        let _state = self.available_state()?;
        Ok(format!(
            "{}/billing/mock-portal?customer={}&return_url={}",
            self.base_url,
            urlencoding::encode(customer_id),
            urlencoding::encode(return_url)
        ))
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionSnapshot, GatewayError> {
        self.available_state()?
            .subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| not_found(subscription_id))
    }

    async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<SubscriptionSnapshot, GatewayError> {
        let mut state = self.available_state()?;
        let subscription = state
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| not_found(subscription_id))?;

        subscription.cancel_at_period_end = cancel_at_period_end;
        subscription.cancel_at = if cancel_at_period_end {
            subscription.current_period_end
        } else {
            None
        };
        subscription.canceled_at = cancel_at_period_end.then(|| Utc::now().timestamp());
        Ok(subscription.clone())
    }

    async fn cancel_subscription_now(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionSnapshot, GatewayError> {
        let mut state = self.available_state()?;
        let subscription = state
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| not_found(subscription_id))?;

        let now = Utc::now().timestamp();
        subscription.status = "canceled".to_string();
        subscription.canceled_at = Some(now);
        subscription.ended_at = Some(now);
        Ok(subscription.clone())
    }

    async fn change_subscription_price(
        &self,
        subscription_id: &str,
        subscription_item_id: &str,
        price_id: &str,
    ) -> Result<SubscriptionSnapshot, GatewayError> {
        let mut state = self.available_state()?;
        let subscription = state
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| not_found(subscription_id))?;

        let item = subscription
            .items
            .data
            .iter_mut()
            .find(|item| item.id == subscription_item_id)
            .ok_or_else(|| {
                GatewayError::InvalidRequest(format!(
                    "No such subscription item: '{}'",
                    subscription_item_id
                ))
            })?;
        item.price.id = price_id.to_string();
        Ok(subscription.clone())
    }

    async fn report_usage(
        &self,
        subscription_item_id: &str,
        quantity: u64,
        action: UsageAction,
        timestamp: DateTime<Utc>,
        idempotency_key: Option<&str>,
    ) -> Result<String, GatewayError> {
        let mut state = self.available_state()?;
        if let Some(id) = idempotency_key.and_then(|key| state.usage_keys.get(key)) {
            return Ok(id.clone());
        }

        let id = state.next_id("mbur");
        if let Some(key) = idempotency_key {
            state.usage_keys.insert(key.to_string(), id.clone());
        }
        state.usage_reports.push(UsageReport {
            id: id.clone(),
            subscription_item_id: subscription_item_id.to_string(),
            quantity,
            action,
            timestamp,
        });
        Ok(id)
    }
}
