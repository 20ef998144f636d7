// src/service/billing_service.rs

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::domain::billing_customer_model;
use crate::domain::payment_model::{self, PaymentStatus};
use crate::domain::plan::{BillingInterval, PlanCatalog, PlanInfo};
use crate::domain::provider_objects::{timestamp, InvoiceSnapshot, SubscriptionSnapshot};
use crate::domain::subscription_model;
use crate::domain::subscription_tier::SubscriptionTier;
use crate::error::{AppError, AppResult};
use crate::infrastructure::payment_gateway::{CheckoutRequest, CheckoutSessionInfo, PaymentGateway};
use crate::repository::billing_customer_repository::{
    BillingCustomerRepository, UpsertBillingCustomer,
};
use crate::repository::payment_repository::{PaymentRepository, UpsertPayment};
use crate::repository::subscription_repository::{SubscriptionRepository, UpsertSubscription};
use crate::utils::error_helper::internal_server_error;
use crate::utils::jwt::UserClaims;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub const MAX_PAYMENTS_PER_PAGE: u64 = 100;

/// スナップショット適用の結果
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome<T> {
    Applied(T),
    /// 既に新しいイベントが適用済み
    Stale,
    /// 確定済みの支払いを後発のイベントで上書きしない
    Skipped,
    /// 所有ユーザーを特定できない
    Unowned,
}

/// 現在のサブスクリプション概要
#[derive(Debug, Clone)]
pub struct SubscriptionOverview {
    pub subscription: Option<subscription_model::Model>,
    pub tier: SubscriptionTier,
    pub is_entitled: bool,
}

#[derive(Debug, Clone)]
pub struct PaymentPage {
    pub items: Vec<payment_model::Model>,
    pub page: u64,
    pub per_page: u64,
    pub total_items: u64,
    pub total_pages: u64,
}

#[derive(Clone)]
pub struct BillingService {
    customer_repo: Arc<BillingCustomerRepository>,
    subscription_repo: Arc<SubscriptionRepository>,
    payment_repo: Arc<PaymentRepository>,
    gateway: Arc<dyn PaymentGateway>,
    catalog: Arc<PlanCatalog>,
    app_base_url: String,
    trial_period_days: Option<u32>,
    allow_promotion_codes: bool,
}

impl BillingService {
    pub fn new(db: DbPool, gateway: Arc<dyn PaymentGateway>, config: &AppConfig) -> Self {
        Self {
            customer_repo: Arc::new(BillingCustomerRepository::new(db.clone())),
            subscription_repo: Arc::new(SubscriptionRepository::new(db.clone())),
            payment_repo: Arc::new(PaymentRepository::new(db)),
            gateway,
            catalog: Arc::new(PlanCatalog::from_config(&config.stripe)),
            app_base_url: config.app_base_url.clone(),
            trial_period_days: config.stripe.trial_period_days,
            allow_promotion_codes: config.stripe.allow_promotion_codes,
        }
    }

    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    pub fn plans(&self, interval: BillingInterval) -> Vec<PlanInfo> {
        self.catalog.plans(interval)
    }

    // --- 顧客 ---

    /// 既存の顧客を返すか、プロバイダーに作成して対応を保存
    pub async fn ensure_customer(
        &self,
        user: &UserClaims,
    ) -> AppResult<billing_customer_model::Model> {
        if let Some(customer) = self.customer_repo.find_by_user_id(user.user_id).await? {
            return Ok(customer);
        }

        let stripe_customer_id = self
            .gateway
            .create_customer(&user.email, user.name.as_deref(), user.user_id)
            .await?;

        tracing::info!(
            user_id = %user.user_id,
            stripe_customer_id = %stripe_customer_id,
            "Payment provider customer created"
        );

        let customer = self
            .customer_repo
            .upsert(UpsertBillingCustomer {
                user_id: user.user_id,
                stripe_customer_id,
                email: user.email.clone(),
                name: user.name.clone(),
            })
            .await?;

        Ok(customer)
    }

    /// チェックアウト完了時などプロバイダー側の情報から対応を保存
    pub async fn link_customer(
        &self,
        user_id: Uuid,
        stripe_customer_id: &str,
        email: Option<String>,
        name: Option<String>,
    ) -> AppResult<billing_customer_model::Model> {
        let existing = self.customer_repo.find_by_user_id(user_id).await?;

        let email = email
            .or_else(|| existing.as_ref().map(|c| c.email.clone()))
            .unwrap_or_default();
        let name = name.or_else(|| existing.and_then(|c| c.name));

        let customer = self
            .customer_repo
            .upsert(UpsertBillingCustomer {
                user_id,
                stripe_customer_id: stripe_customer_id.to_string(),
                email,
                name,
            })
            .await?;

        Ok(customer)
    }

    pub async fn find_customer(
        &self,
        user_id: Uuid,
    ) -> AppResult<Option<billing_customer_model::Model>> {
        Ok(self.customer_repo.find_by_user_id(user_id).await?)
    }

    pub async fn forget_customer(&self, stripe_customer_id: &str) -> AppResult<u64> {
        Ok(self
            .customer_repo
            .delete_by_stripe_customer_id(stripe_customer_id)
            .await?)
    }

    // --- チェックアウト・ポータル ---

    pub async fn create_checkout_session(
        &self,
        user: &UserClaims,
        tier: SubscriptionTier,
        interval: BillingInterval,
    ) -> AppResult<CheckoutSessionInfo> {
        if !tier.is_paid() {
            return Err(AppError::BadRequest(
                "The free plan does not require checkout".to_string(),
            ));
        }

        let price_id = self
            .catalog
            .price_id(tier, interval)
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "The {} plan is not available with {}ly billing",
                    tier.display_name(),
                    interval
                ))
            })?
            .to_string();

        if let Some(current) = self
            .subscription_repo
            .find_entitled_by_user_id(user.user_id)
            .await?
        {
            return Err(AppError::Conflict(format!(
                "You already have an active {} subscription; change your plan instead",
                current.tier().display_name()
            )));
        }

        let customer = self.ensure_customer(user).await?;

        let request = CheckoutRequest {
            customer_id: customer.stripe_customer_id,
            user_id: user.user_id,
            tier,
            interval,
            price_id,
            metered_price_id: self.catalog.metered_price_id().map(str::to_string),
            success_url: format!(
                "{}/billing?checkout=success&session_id={{CHECKOUT_SESSION_ID}}",
                self.app_base_url
            ),
            cancel_url: format!("{}/pricing?checkout=canceled", self.app_base_url),
            trial_period_days: self.trial_period_days,
            allow_promotion_codes: self.allow_promotion_codes,
        };

        let session = self.gateway.create_checkout_session(request).await?;

        tracing::info!(
            user_id = %user.user_id,
            tier = %tier,
            interval = %interval,
            session_id = %session.id,
            "Checkout session created"
        );

        Ok(session)
    }

    pub async fn create_portal_session(&self, user_id: Uuid) -> AppResult<String> {
        let customer = self
            .customer_repo
            .find_by_user_id(user_id)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest("No billing account exists for this user yet".to_string())
            })?;

        let return_url = format!("{}/billing", self.app_base_url);
        let url = self
            .gateway
            .create_portal_session(&customer.stripe_customer_id, &return_url)
            .await?;

        Ok(url)
    }

    // --- サブスクリプション ---

    /// 有効なサブスクリプションを優先し、無ければ最新のもの
    pub async fn current_subscription(
        &self,
        user_id: Uuid,
    ) -> AppResult<Option<subscription_model::Model>> {
        if let Some(subscription) = self.subscription_repo.find_entitled_by_user_id(user_id).await? {
            return Ok(Some(subscription));
        }
        Ok(self.subscription_repo.find_latest_by_user_id(user_id).await?)
    }

    pub async fn subscription_overview(&self, user_id: Uuid) -> AppResult<SubscriptionOverview> {
        let subscription = self.current_subscription(user_id).await?;
        let is_entitled = subscription.as_ref().is_some_and(|s| s.is_entitled());
        let tier = match &subscription {
            Some(s) if is_entitled => s.tier(),
            _ => SubscriptionTier::Free,
        };

        Ok(SubscriptionOverview {
            subscription,
            tier,
            is_entitled,
        })
    }

    pub async fn effective_tier(&self, user_id: Uuid) -> AppResult<SubscriptionTier> {
        Ok(self
            .subscription_repo
            .find_entitled_by_user_id(user_id)
            .await?
            .map_or(SubscriptionTier::Free, |s| s.tier()))
    }

    async fn entitled_subscription(&self, user_id: Uuid) -> AppResult<subscription_model::Model> {
        self.subscription_repo
            .find_entitled_by_user_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("No active subscription found".to_string()))
    }

    pub async fn cancel_subscription(
        &self,
        user_id: Uuid,
        at_period_end: bool,
    ) -> AppResult<subscription_model::Model> {
        let subscription = self.entitled_subscription(user_id).await?;

        let snapshot = if at_period_end {
            self.gateway
                .set_cancel_at_period_end(&subscription.stripe_subscription_id, true)
                .await?
        } else {
            self.gateway
                .cancel_subscription_now(&subscription.stripe_subscription_id)
                .await?
        };

        tracing::info!(
            user_id = %user_id,
            stripe_subscription_id = %subscription.stripe_subscription_id,
            at_period_end = at_period_end,
            "Subscription cancellation requested"
        );

        self.sync_from_provider(snapshot, user_id).await
    }

    pub async fn resume_subscription(&self, user_id: Uuid) -> AppResult<subscription_model::Model> {
        let subscription = self.entitled_subscription(user_id).await?;
        if !subscription.cancel_at_period_end {
            return Err(AppError::BadRequest(
                "Subscription is not scheduled for cancellation".to_string(),
            ));
        }

        let snapshot = self
            .gateway
            .set_cancel_at_period_end(&subscription.stripe_subscription_id, false)
            .await?;

        tracing::info!(
            user_id = %user_id,
            stripe_subscription_id = %subscription.stripe_subscription_id,
            "Subscription resumed"
        );

        self.sync_from_provider(snapshot, user_id).await
    }

    pub async fn change_plan(
        &self,
        user_id: Uuid,
        tier: SubscriptionTier,
        interval: BillingInterval,
    ) -> AppResult<subscription_model::Model> {
        if !tier.is_paid() {
            return Err(AppError::BadRequest(
                "Cancel your subscription to move to the free plan".to_string(),
            ));
        }

        let price_id = self.catalog.price_id(tier, interval).ok_or_else(|| {
            AppError::BadRequest(format!(
                "The {} plan is not available with {}ly billing",
                tier.display_name(),
                interval
            ))
        })?;

        let subscription = self.entitled_subscription(user_id).await?;
        if subscription.stripe_price_id == price_id {
            return Err(AppError::BadRequest(
                "You are already on this plan".to_string(),
            ));
        }

        // 定額アイテムのIDはプロバイダーから取得する
        let current = self
            .gateway
            .retrieve_subscription(&subscription.stripe_subscription_id)
            .await?;
        let item_id = current
            .licensed_item()
            .map(|item| item.id.clone())
            .ok_or_else(|| {
                internal_server_error(
                    format!(
                        "Subscription {} has no licensed item",
                        subscription.stripe_subscription_id
                    ),
                    "billing_service::change_plan",
                    "Subscription has no plan item to change",
                )
            })?;

        let snapshot = self
            .gateway
            .change_subscription_price(&subscription.stripe_subscription_id, &item_id, price_id)
            .await?;

        tracing::info!(
            user_id = %user_id,
            stripe_subscription_id = %subscription.stripe_subscription_id,
            from_price = %subscription.stripe_price_id,
            to_price = %price_id,
            "Subscription plan changed"
        );

        self.sync_from_provider(snapshot, user_id).await
    }

    async fn sync_from_provider(
        &self,
        snapshot: SubscriptionSnapshot,
        user_id: Uuid,
    ) -> AppResult<subscription_model::Model> {
        match self
            .apply_subscription_snapshot(&snapshot, None, Some(user_id))
            .await?
        {
            SyncOutcome::Applied(model) => Ok(model),
            _ => Err(internal_server_error(
                format!("Provider snapshot for {} was not applied", snapshot.id),
                "billing_service::sync_from_provider",
                "Failed to store subscription",
            )),
        }
    }

    /// プロバイダーのサブスクリプションをローカルに反映（Webhookと共通）
    ///
    /// `event_created` はWebhook由来の場合のみ指定し、それより新しいイベントが
    /// 適用済みなら何もしない。API経由の反映（None）は書き込み時刻を
    /// `last_event_at` に記録するため、それ以前に作成されたイベントは以後古いものとして扱われる。
    pub async fn apply_subscription_snapshot(
        &self,
        snapshot: &SubscriptionSnapshot,
        event_created: Option<DateTime<Utc>>,
        known_user_id: Option<Uuid>,
    ) -> AppResult<SyncOutcome<subscription_model::Model>> {
        let existing = self
            .subscription_repo
            .find_by_stripe_subscription_id(&snapshot.id)
            .await?;

        if let (Some(event_at), Some(last_event_at)) = (
            event_created,
            existing.as_ref().and_then(|s| s.last_event_at),
        ) {
            if event_at < last_event_at {
                tracing::info!(
                    stripe_subscription_id = %snapshot.id,
                    event_at = %event_at,
                    last_event_at = %last_event_at,
                    "Skipping stale subscription event"
                );
                return Ok(SyncOutcome::Stale);
            }
        }

        let last_event_at = match event_created {
            Some(event_at) => event_at,
            None => {
                let now = Utc::now();
                existing
                    .as_ref()
                    .and_then(|s| s.last_event_at)
                    .map_or(now, |last| last.max(now))
            }
        };

        let user_id = match snapshot.metadata_user_id().or(known_user_id) {
            Some(user_id) => Some(user_id),
            None => self
                .customer_repo
                .find_by_stripe_customer_id(snapshot.customer_id())
                .await?
                .map(|c| c.user_id)
                .or_else(|| existing.as_ref().map(|s| s.user_id)),
        };
        let Some(user_id) = user_id else {
            tracing::warn!(
                stripe_subscription_id = %snapshot.id,
                stripe_customer_id = %snapshot.customer_id(),
                "Cannot resolve owner of subscription"
            );
            return Ok(SyncOutcome::Unowned);
        };

        let licensed_item = snapshot
            .licensed_item()
            .or_else(|| snapshot.items.data.first());
        let price_id = licensed_item
            .map(|item| item.price.id.clone())
            .or_else(|| existing.as_ref().map(|s| s.stripe_price_id.clone()))
            .unwrap_or_default();

        let (tier, interval) = match self.catalog.resolve_price(&price_id) {
            Some(resolved) => resolved,
            None => {
                let tier = snapshot
                    .metadata
                    .get("tier")
                    .and_then(|t| SubscriptionTier::from_str(t))
                    .unwrap_or_default();
                let interval = licensed_item
                    .and_then(|item| item.price.recurring.as_ref())
                    .and_then(|r| r.interval.as_deref())
                    .or_else(|| snapshot.metadata.get("interval").map(String::as_str))
                    .and_then(BillingInterval::from_str)
                    .unwrap_or_default();
                tracing::warn!(
                    stripe_subscription_id = %snapshot.id,
                    price_id = %price_id,
                    tier = %tier,
                    "Price is not in the plan catalog; using fallback tier"
                );
                (tier, interval)
            }
        };

        let model = self
            .subscription_repo
            .upsert(UpsertSubscription {
                user_id,
                stripe_customer_id: snapshot.customer_id().to_string(),
                stripe_subscription_id: snapshot.id.clone(),
                stripe_price_id: price_id,
                stripe_metered_item_id: snapshot.metered_item().map(|item| item.id.clone()),
                tier: tier.as_str().to_string(),
                billing_interval: interval.as_str().to_string(),
                status: snapshot.status.clone(),
                cancel_at_period_end: snapshot.cancel_at_period_end,
                current_period_start: snapshot.period_start(),
                current_period_end: snapshot.period_end(),
                cancel_at: timestamp(snapshot.cancel_at),
                canceled_at: timestamp(snapshot.canceled_at),
                ended_at: timestamp(snapshot.ended_at),
                trial_end: timestamp(snapshot.trial_end),
                last_event_at: Some(last_event_at),
            })
            .await?;

        tracing::info!(
            user_id = %user_id,
            stripe_subscription_id = %model.stripe_subscription_id,
            status = %model.status,
            tier = %model.tier,
            "Subscription synchronized"
        );

        Ok(SyncOutcome::Applied(model))
    }

    // --- 支払い ---

    /// 請求書を支払い履歴として反映
    pub async fn apply_invoice(
        &self,
        invoice: &InvoiceSnapshot,
        status: PaymentStatus,
    ) -> AppResult<SyncOutcome<payment_model::Model>> {
        let existing = self.payment_repo.find_by_stripe_invoice_id(&invoice.id).await?;

        if let Some(existing) = &existing {
            if existing.status == PaymentStatus::Succeeded.as_str()
                && status != PaymentStatus::Succeeded
            {
                tracing::info!(
                    stripe_invoice_id = %invoice.id,
                    status = %status.as_str(),
                    "Ignoring late update for a succeeded payment"
                );
                return Ok(SyncOutcome::Skipped);
            }
        }

        let Some(user_id) = self.resolve_invoice_owner(invoice, existing.as_ref()).await? else {
            tracing::warn!(
                stripe_invoice_id = %invoice.id,
                "Cannot resolve owner of invoice"
            );
            return Ok(SyncOutcome::Unowned);
        };

        let (amount, paid_at) = match status {
            PaymentStatus::Succeeded => (
                invoice.amount_paid,
                timestamp(invoice.status_transitions.paid_at).or_else(|| Some(Utc::now())),
            ),
            _ => (invoice.amount_due, None),
        };

        let payment = self
            .payment_repo
            .upsert(UpsertPayment {
                user_id,
                stripe_invoice_id: invoice.id.clone(),
                stripe_payment_intent_id: invoice
                    .payment_intent
                    .as_ref()
                    .map(|pi| pi.id().to_string()),
                stripe_subscription_id: invoice.subscription_id().map(str::to_string),
                amount,
                currency: invoice
                    .currency
                    .clone()
                    .unwrap_or_else(|| self.catalog.currency().to_string())
                    .to_lowercase(),
                status: status.as_str().to_string(),
                billing_reason: invoice.billing_reason.clone(),
                description: invoice.description.clone(),
                hosted_invoice_url: invoice.hosted_invoice_url.clone(),
                invoice_pdf: invoice.invoice_pdf.clone(),
                period_start: timestamp(invoice.period_start),
                period_end: timestamp(invoice.period_end),
                paid_at,
            })
            .await?;

        tracing::info!(
            user_id = %user_id,
            stripe_invoice_id = %payment.stripe_invoice_id,
            status = %payment.status,
            amount = payment.amount,
            "Payment recorded"
        );

        Ok(SyncOutcome::Applied(payment))
    }

    async fn resolve_invoice_owner(
        &self,
        invoice: &InvoiceSnapshot,
        existing: Option<&payment_model::Model>,
    ) -> AppResult<Option<Uuid>> {
        if let Some(customer_id) = invoice.customer_id() {
            if let Some(customer) = self.customer_repo.find_by_stripe_customer_id(customer_id).await? {
                return Ok(Some(customer.user_id));
            }
        }

        if let Some(subscription_id) = invoice.subscription_id() {
            if let Some(subscription) = self
                .subscription_repo
                .find_by_stripe_subscription_id(subscription_id)
                .await?
            {
                return Ok(Some(subscription.user_id));
            }
        }

        Ok(invoice
            .metadata_user_id()
            .or_else(|| existing.map(|p| p.user_id)))
    }

    pub async fn list_payments(
        &self,
        user_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> AppResult<PaymentPage> {
        if page == 0 {
            return Err(AppError::BadRequest("page must be at least 1".to_string()));
        }
        if per_page == 0 || per_page > MAX_PAYMENTS_PER_PAGE {
            return Err(AppError::BadRequest(format!(
                "per_page must be between 1 and {}",
                MAX_PAYMENTS_PER_PAGE
            )));
        }

        let (items, total_items, total_pages) = self
            .payment_repo
            .find_by_user_id_paginated(user_id, page, per_page)
            .await?;

        Ok(PaymentPage {
            items,
            page,
            per_page,
            total_items,
            total_pages,
        })
    }

    pub async fn recent_payments(
        &self,
        user_id: Uuid,
        limit: u64,
    ) -> AppResult<Vec<payment_model::Model>> {
        Ok(self.payment_repo.find_recent_by_user_id(user_id, limit).await?)
    }
}
