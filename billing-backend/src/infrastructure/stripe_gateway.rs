// src/infrastructure/stripe_gateway.rs

use super::payment_gateway::{CheckoutRequest, CheckoutSessionInfo, GatewayError, PaymentGateway};
use crate::config::StripeConfig;
use crate::domain::provider_objects::SubscriptionSnapshot;
use crate::domain::usage_record_model::UsageAction;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use stripe::{
    BillingPortalSession, CancelSubscription, CheckoutSession, CheckoutSessionMode, Client,
    CreateBillingPortalSession, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionSubscriptionData, CreateCustomer, CreateUsageRecord, Customer,
    CustomerId, RequestStrategy, StripeError, Subscription, SubscriptionId, SubscriptionItemId,
    UpdateSubscription, UpdateSubscriptionItems, UsageRecord,
    UsageRecordAction,
};
use uuid::Uuid;

/// async-stripe を使った本番用ゲートウェイ
#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
}

impl StripeGateway {
    pub fn new(config: &StripeConfig) -> Self {
        if config.secret_key.is_empty() {
            tracing::warn!("Stripe client initialized with empty key - payments will not work");
        }
        Self {
            client: Client::new(config.secret_key.clone()),
        }
    }
}

fn map_stripe_error(error: StripeError, operation: &str) -> GatewayError {
    tracing::error!(operation = %operation, error = %error, "Stripe API call failed");
    match error {
        StripeError::Stripe(request_error) => {
            let message = request_error
                .message
                .clone()
                .unwrap_or_else(|| format!("Stripe returned HTTP {}", request_error.http_status));
            match request_error.http_status {
                404 => GatewayError::NotFound(message),
                400 => GatewayError::InvalidRequest(message),
                _ => GatewayError::Provider(message),
            }
        }
        other => GatewayError::Provider(format!("{}: {}", operation, other)),
    }
}

/// SDKのオブジェクトをシリアライズ表現経由でスナップショットに変換
fn to_snapshot<T: Serialize>(object: &T) -> Result<SubscriptionSnapshot, GatewayError> {
    serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .map_err(|e| GatewayError::Provider(format!("Unexpected subscription payload: {}", e)))
}

fn parse_id<T: std::str::FromStr>(value: &str, kind: &str) -> Result<T, GatewayError> {
    value
        .parse()
        .map_err(|_| GatewayError::InvalidRequest(format!("Invalid {} ID: {}", kind, value)))
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
        user_id: Uuid,
    ) -> Result<String, GatewayError> {
        let params = CreateCustomer {
            email: Some(email),
            name,
            metadata: Some(
                [("user_id".to_string(), user_id.to_string())]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        };

        let customer = Customer::create(&self.client, params)
            .await
            .map_err(|e| map_stripe_error(e, "create_customer"))?;

        Ok(customer.id.to_string())
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSessionInfo, GatewayError> {
        let customer: CustomerId = parse_id(&request.customer_id, "customer")?;
        let metadata: HashMap<String, String> = request.metadata().into_iter().collect();
        let client_reference_id = request.user_id.to_string();

        let mut line_items = vec![CreateCheckoutSessionLineItems {
            price: Some(request.price_id.clone()),
            quantity: Some(1),
            ..Default::default()
        }];
        if let Some(metered_price_id) = &request.metered_price_id {
            // 従量課金の価格には数量を指定しない
            line_items.push(CreateCheckoutSessionLineItems {
                price: Some(metered_price_id.clone()),
                ..Default::default()
            });
        }

        let params = CreateCheckoutSession {
            cancel_url: Some(&request.cancel_url),
            success_url: Some(&request.success_url),
            customer: Some(customer),
            client_reference_id: Some(&client_reference_id),
            line_items: Some(line_items),
            mode: Some(CheckoutSessionMode::Subscription),
            metadata: Some(metadata.clone()),
            subscription_data: Some(CreateCheckoutSessionSubscriptionData {
                metadata: Some(metadata),
                trial_period_days: request.trial_period_days,
                ..Default::default()
            }),
            allow_promotion_codes: request.allow_promotion_codes.then_some(true),
            ..Default::default()
        };

        let session = CheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| {
                if e.to_string().contains("No such price") {
                    tracing::error!(
                        price_id = %request.price_id,
                        "Stripe rejected the price ID; check that price IDs (not product IDs) are configured"
                    );
                }
                map_stripe_error(e, "create_checkout_session")
            })?;

        let url = session.url.ok_or_else(|| {
            GatewayError::Provider("Checkout session was created without a URL".to_string())
        })?;

        Ok(CheckoutSessionInfo {
            id: session.id.to_string(),
            url,
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, GatewayError> {
        let params = CreateBillingPortalSession {
            customer: parse_id(customer_id, "customer")?,
            return_url: Some(return_url),
            configuration: None,
            expand: &[],
            flow_data: None,
            locale: None,
            on_behalf_of: None,
        };

        let session = BillingPortalSession::create(&self.client, params)
            .await
            .map_err(|e| map_stripe_error(e, "create_portal_session"))?;

        Ok(session.url)
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionSnapshot, GatewayError> {
        let id: SubscriptionId = parse_id(subscription_id, "subscription")?;
        let subscription = Subscription::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| map_stripe_error(e, "retrieve_subscription"))?;

        to_snapshot(&subscription)
    }

    async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel_at_period_end: bool,
    ) -> Result<SubscriptionSnapshot, GatewayError> {
        let id: SubscriptionId = parse_id(subscription_id, "subscription")?;
        let params = UpdateSubscription {
            cancel_at_period_end: Some(cancel_at_period_end),
            ..Default::default()
        };

        let subscription = Subscription::update(&self.client, &id, params)
            .await
            .map_err(|e| map_stripe_error(e, "set_cancel_at_period_end"))?;

        to_snapshot(&subscription)
    }

    async fn cancel_subscription_now(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionSnapshot, GatewayError> {
        let id: SubscriptionId = parse_id(subscription_id, "subscription")?;
        let subscription = Subscription::cancel(&self.client, &id, CancelSubscription::default())
            .await
            .map_err(|e| map_stripe_error(e, "cancel_subscription_now"))?;

        to_snapshot(&subscription)
    }

    async fn change_subscription_price(
        &self,
        subscription_id: &str,
        subscription_item_id: &str,
        price_id: &str,
    ) -> Result<SubscriptionSnapshot, GatewayError> {
        let id: SubscriptionId = parse_id(subscription_id, "subscription")?;
        let params = UpdateSubscription {
            items: Some(vec![UpdateSubscriptionItems {
                id: Some(subscription_item_id.to_string()),
                price: Some(price_id.to_string()),
                ..Default::default()
            }]),
            proration_behavior: Some(stripe::generated::billing::subscription::SubscriptionProrationBehavior::CreateProrations),
            ..Default::default()
        };

        let subscription = Subscription::update(&self.client, &id, params)
            .await
            .map_err(|e| map_stripe_error(e, "change_subscription_price"))?;

        to_snapshot(&subscription)
    }

    async fn report_usage(
        &self,
        subscription_item_id: &str,
        quantity: u64,
        action: UsageAction,
        timestamp: DateTime<Utc>,
        idempotency_key: Option<&str>,
    ) -> Result<String, GatewayError> {
        let item_id: SubscriptionItemId = parse_id(subscription_item_id, "subscription item")?;

        let mut params = CreateUsageRecord {
            quantity,
            ..Default::default()
        };
        params.timestamp = Some(timestamp.timestamp());
        params.action = Some(match action {
            UsageAction::Increment => UsageRecordAction::Increment,
            UsageAction::Set => UsageRecordAction::Set,
        });

        let client = match idempotency_key {
            Some(key) => self
                .client
                .clone()
                .with_strategy(RequestStrategy::Idempotent(key.to_string())),
            None => self.client.clone(),
        };

        let record = UsageRecord::create(&client, &item_id, params)
            .await
            .map_err(|e| map_stripe_error(e, "report_usage"))?;

        Ok(record.id.to_string())
    }
}
