// src/repository/payment_repository.rs

use crate::domain::payment_model::{
    self, ActiveModel as PaymentActiveModel, Column, Entity as PaymentEntity,
};
use chrono::{DateTime, Utc};
use sea_orm::entity::*;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DbConn, DbErr, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    db: DbConn,
}

impl PaymentRepository {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }

    pub async fn find_by_stripe_invoice_id(
        &self,
        stripe_invoice_id: &str,
    ) -> Result<Option<payment_model::Model>, DbErr> {
        PaymentEntity::find()
            .filter(Column::StripeInvoiceId.eq(stripe_invoice_id))
            .one(&self.db)
            .await
    }

    /// ユーザーIDで支払い履歴を検索（ページは1始まり）
    ///
    /// 戻り値は (支払い, 総件数, 総ページ数)。
    pub async fn find_by_user_id_paginated(
        &self,
        user_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<payment_model::Model>, u64, u64), DbErr> {
        let paginator = PaymentEntity::find()
            .filter(Column::UserId.eq(user_id))
            .order_by(Column::CreatedAt, Order::Desc)
            .order_by(Column::Id, Order::Desc)
            .paginate(&self.db, per_page);

        let totals = paginator.num_items_and_pages().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items, totals.number_of_items, totals.number_of_pages))
    }

    pub async fn find_recent_by_user_id(
        &self,
        user_id: Uuid,
        limit: u64,
    ) -> Result<Vec<payment_model::Model>, DbErr> {
        PaymentEntity::find()
            .filter(Column::UserId.eq(user_id))
            .order_by(Column::CreatedAt, Order::Desc)
            .limit(limit)
            .all(&self.db)
            .await
    }

    /// 請求書IDをキーに作成または更新
    pub async fn upsert(&self, upsert: UpsertPayment) -> Result<payment_model::Model, DbErr> {
        let now = Utc::now();
        let stripe_invoice_id = upsert.stripe_invoice_id.clone();

        let model = PaymentActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(upsert.user_id),
            stripe_invoice_id: Set(upsert.stripe_invoice_id),
            stripe_payment_intent_id: Set(upsert.stripe_payment_intent_id),
            stripe_subscription_id: Set(upsert.stripe_subscription_id),
            amount: Set(upsert.amount),
            currency: Set(upsert.currency),
            status: Set(upsert.status),
            billing_reason: Set(upsert.billing_reason),
            description: Set(upsert.description),
            hosted_invoice_url: Set(upsert.hosted_invoice_url),
            invoice_pdf: Set(upsert.invoice_pdf),
            period_start: Set(upsert.period_start),
            period_end: Set(upsert.period_end),
            paid_at: Set(upsert.paid_at),
            created_at: Set(now),
            updated_at: Set(now),
        };

        PaymentEntity::insert(model)
            .on_conflict(
                OnConflict::column(Column::StripeInvoiceId)
                    .update_columns([
                        Column::StripePaymentIntentId,
                        Column::StripeSubscriptionId,
                        Column::Amount,
                        Column::Currency,
                        Column::Status,
                        Column::BillingReason,
                        Column::Description,
                        Column::HostedInvoiceUrl,
                        Column::InvoicePdf,
                        Column::PeriodStart,
                        Column::PeriodEnd,
                        Column::PaidAt,
                        Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        self.find_by_stripe_invoice_id(&stripe_invoice_id)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound("Payment not found".to_string()))
    }
}

/// 支払い作成・更新用構造体
#[derive(Debug, Clone)]
pub struct UpsertPayment {
    pub user_id: Uuid,
    pub stripe_invoice_id: String,
    pub stripe_payment_intent_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub billing_reason: Option<String>,
    pub description: Option<String>,
    pub hosted_invoice_url: Option<String>,
    pub invoice_pdf: Option<String>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
}
