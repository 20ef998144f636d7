// src/service/webhook_service.rs

use crate::config::StripeConfig;
use crate::db::DbPool;
use crate::domain::payment_model::PaymentStatus;
use crate::domain::provider_event::{ProviderEvent, ProviderEventKind};
use crate::domain::provider_objects::{
    CheckoutSessionSnapshot, CustomerSnapshot, InvoiceSnapshot, SubscriptionSnapshot,
};
use crate::domain::webhook_event_model::WebhookEventStatus;
use crate::error::{AppError, AppResult};
use crate::infrastructure::payment_gateway::PaymentGateway;
use crate::repository::webhook_event_repository::{RecordWebhookEvent, WebhookEventRepository};
use crate::service::billing_service::{BillingService, SyncOutcome};
use crate::utils::webhook_signature::WebhookVerifier;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Webhook受信結果（プロバイダーへの応答に含める）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookOutcome {
    Processed,
    Ignored,
    Duplicate,
    Failed,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Processed => "processed",
            WebhookOutcome::Ignored => "ignored",
            WebhookOutcome::Duplicate => "duplicate",
            WebhookOutcome::Failed => "failed",
        }
    }
}

enum Dispatch {
    Processed,
    Ignored(String),
}

impl<T> From<SyncOutcome<T>> for Dispatch {
    fn from(outcome: SyncOutcome<T>) -> Self {
        match outcome {
            SyncOutcome::Applied(_) => Dispatch::Processed,
            SyncOutcome::Stale => Dispatch::Ignored("stale event".to_string()),
            SyncOutcome::Skipped => {
                Dispatch::Ignored("payment already succeeded".to_string())
            }
            SyncOutcome::Unowned => Dispatch::Ignored("owner could not be resolved".to_string()),
        }
    }
}

#[derive(Clone)]
pub struct WebhookService {
    verifier: Option<WebhookVerifier>,
    event_repo: Arc<WebhookEventRepository>,
    billing_service: Arc<BillingService>,
    gateway: Arc<dyn PaymentGateway>,
}

impl WebhookService {
    pub fn new(
        db: DbPool,
        billing_service: Arc<BillingService>,
        gateway: Arc<dyn PaymentGateway>,
        config: &StripeConfig,
    ) -> Self {
        let verifier = if config.webhook_secret.is_empty() {
            // 本番設定ではシークレット必須のため、ここに来るのは開発モードのみ
            None
        } else {
            Some(WebhookVerifier::new(
                config.webhook_secret.clone(),
                config.webhook_tolerance_secs,
            ))
        };

        Self {
            verifier,
            event_repo: Arc::new(WebhookEventRepository::new(db)),
            billing_service,
            gateway,
        }
    }

    /// 署名を検証し、イベントを一度だけ適用する
    pub async fn handle(&self, payload: &[u8], signature: Option<&str>) -> AppResult<WebhookOutcome> {
        match &self.verifier {
            Some(verifier) => {
                let signature = signature.ok_or_else(|| {
                    tracing::warn!("Webhook request without Stripe-Signature header");
                    AppError::BadRequest("Missing Stripe-Signature header".to_string())
                })?;
                verifier.verify(payload, signature).inspect_err(|e| {
                    tracing::warn!(error = %e, "Webhook signature verification failed");
                })?;
            }
            None => {
                tracing::warn!(
                    "STRIPE_WEBHOOK_SECRET not set - skipping signature verification (development mode)"
                );
            }
        }

        let event: ProviderEvent = serde_json::from_slice(payload).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse webhook payload");
            AppError::BadRequest(format!("Invalid webhook payload: {}", e))
        })?;

        if let Some(existing) = self.event_repo.find_by_stripe_event_id(&event.id).await? {
            if existing.status().is_some_and(|s| s.is_settled()) {
                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    "Duplicate webhook event acknowledged"
                );
                return Ok(WebhookOutcome::Duplicate);
            }
        }

        let event_created_at = DateTime::from_timestamp(event.created, 0).unwrap_or_else(Utc::now);
        let record = self
            .event_repo
            .begin_processing(RecordWebhookEvent {
                stripe_event_id: event.id.clone(),
                event_type: event.event_type.clone(),
                livemode: event.livemode,
                event_created_at,
            })
            .await?;

        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            "Processing webhook event"
        );

        let outcome = match self.dispatch(&event, event_created_at).await {
            Ok(Dispatch::Processed) => {
                self.event_repo
                    .mark_finished(record.id, WebhookEventStatus::Processed, None)
                    .await?;
                WebhookOutcome::Processed
            }
            Ok(Dispatch::Ignored(reason)) => {
                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    reason = %reason,
                    "Webhook event ignored"
                );
                self.event_repo
                    .mark_finished(record.id, WebhookEventStatus::Ignored, Some(reason))
                    .await?;
                WebhookOutcome::Ignored
            }
            Err(e) => {
                // プロバイダーには成功を返し、失敗は記録に残す
                tracing::error!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    error = %e,
                    "Webhook event handling failed"
                );
                self.event_repo
                    .mark_finished(record.id, WebhookEventStatus::Failed, Some(e.to_string()))
                    .await?;
                WebhookOutcome::Failed
            }
        };

        Ok(outcome)
    }

    async fn dispatch(
        &self,
        event: &ProviderEvent,
        event_created_at: DateTime<Utc>,
    ) -> AppResult<Dispatch> {
        match event.kind() {
            ProviderEventKind::CheckoutSessionCompleted => {
                let session: CheckoutSessionSnapshot = parse_object(event)?;
                self.handle_checkout_completed(&session, event_created_at)
                    .await
            }
            ProviderEventKind::SubscriptionChanged => {
                let subscription: SubscriptionSnapshot = parse_object(event)?;
                let outcome = self
                    .billing_service
                    .apply_subscription_snapshot(&subscription, Some(event_created_at), None)
                    .await?;
                Ok(outcome.into())
            }
            ProviderEventKind::InvoicePaid => {
                self.handle_invoice(event, PaymentStatus::Succeeded).await
            }
            ProviderEventKind::InvoicePaymentFailed => {
                self.handle_invoice(event, PaymentStatus::Failed).await
            }
            ProviderEventKind::InvoicePaymentActionRequired => {
                self.handle_invoice(event, PaymentStatus::RequiresAction)
                    .await
            }
            ProviderEventKind::CustomerDeleted => {
                let customer: CustomerSnapshot = parse_object(event)?;
                let removed = self.billing_service.forget_customer(&customer.id).await?;
                tracing::info!(
                    stripe_customer_id = %customer.id,
                    removed = removed,
                    "Customer mapping removed"
                );
                Ok(Dispatch::Processed)
            }
            ProviderEventKind::Unhandled => {
                tracing::debug!(event_type = %event.event_type, "Unhandled webhook event type");
                Ok(Dispatch::Ignored(format!(
                    "unhandled event type {}",
                    event.event_type
                )))
            }
        }
    }

    async fn handle_checkout_completed(
        &self,
        session: &CheckoutSessionSnapshot,
        event_created_at: DateTime<Utc>,
    ) -> AppResult<Dispatch> {
        if !session.is_subscription() {
            return Ok(Dispatch::Ignored(
                "checkout session is not a subscription".to_string(),
            ));
        }

        let Some(user_id) = session.user_id() else {
            tracing::warn!(session_id = %session.id, "Checkout session has no user reference");
            return Ok(Dispatch::Ignored("owner could not be resolved".to_string()));
        };
        let Some(customer_id) = session.customer.as_ref().map(|c| c.id().to_string()) else {
            return Ok(Dispatch::Ignored(
                "checkout session has no customer".to_string(),
            ));
        };

        let details = session.customer_details.clone().unwrap_or_default();
        self.billing_service
            .link_customer(user_id, &customer_id, details.email, details.name)
            .await?;

        let Some(subscription_id) = session.subscription.as_ref().map(|s| s.id().to_string())
        else {
            return Ok(Dispatch::Ignored(
                "checkout session has no subscription".to_string(),
            ));
        };

        let subscription = self
            .gateway
            .retrieve_subscription(&subscription_id)
            .await?;
        let outcome = self
            .billing_service
            .apply_subscription_snapshot(&subscription, Some(event_created_at), Some(user_id))
            .await?;

        tracing::info!(
            user_id = %user_id,
            session_id = %session.id,
            stripe_subscription_id = %subscription_id,
            "Checkout completed"
        );

        Ok(outcome.into())
    }

    async fn handle_invoice(
        &self,
        event: &ProviderEvent,
        status: PaymentStatus,
    ) -> AppResult<Dispatch> {
        let invoice: InvoiceSnapshot = parse_object(event)?;
        let outcome = self.billing_service.apply_invoice(&invoice, status).await?;
        Ok(outcome.into())
    }
}

fn parse_object<T: serde::de::DeserializeOwned>(event: &ProviderEvent) -> AppResult<T> {
    event.data_object().map_err(|e| {
        AppError::BadRequest(format!(
            "Unexpected {} payload: {}",
            event.event_type, e
        ))
    })
}
