// src/repository/billing_customer_repository.rs

use crate::domain::billing_customer_model::{
    self, ActiveModel as BillingCustomerActiveModel, Column, Entity as BillingCustomerEntity,
};
use chrono::Utc;
use sea_orm::entity::*;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DbConn, DbErr, QueryFilter, Set};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct BillingCustomerRepository {
    db: DbConn,
}

impl BillingCustomerRepository {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }

    pub async fn find_by_user_id(
        &self,
        user_id: Uuid,
    ) -> Result<Option<billing_customer_model::Model>, DbErr> {
        BillingCustomerEntity::find()
            .filter(Column::UserId.eq(user_id))
            .one(&self.db)
            .await
    }

    pub async fn find_by_stripe_customer_id(
        &self,
        stripe_customer_id: &str,
    ) -> Result<Option<billing_customer_model::Model>, DbErr> {
        BillingCustomerEntity::find()
            .filter(Column::StripeCustomerId.eq(stripe_customer_id))
            .one(&self.db)
            .await
    }

    /// ユーザーIDをキーに顧客の対応を作成または更新
    pub async fn upsert(
        &self,
        upsert: UpsertBillingCustomer,
    ) -> Result<billing_customer_model::Model, DbErr> {
        let now = Utc::now();
        let user_id = upsert.user_id;

        let model = BillingCustomerActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(upsert.user_id),
            stripe_customer_id: Set(upsert.stripe_customer_id),
            email: Set(upsert.email),
            name: Set(upsert.name),
            created_at: Set(now),
            updated_at: Set(now),
        };

        BillingCustomerEntity::insert(model)
            .on_conflict(
                OnConflict::column(Column::UserId)
                    .update_columns([
                        Column::StripeCustomerId,
                        Column::Email,
                        Column::Name,
                        Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        self.find_by_user_id(user_id)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound("Billing customer not found".to_string()))
    }

    /// プロバイダー側で削除された顧客の対応を削除
    pub async fn delete_by_stripe_customer_id(&self, stripe_customer_id: &str) -> Result<u64, DbErr> {
        let result = BillingCustomerEntity::delete_many()
            .filter(Column::StripeCustomerId.eq(stripe_customer_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

/// 顧客対応の作成・更新用構造体
#[derive(Debug, Clone)]
pub struct UpsertBillingCustomer {
    pub user_id: Uuid,
    pub stripe_customer_id: String,
    pub email: String,
    pub name: Option<String>,
}
