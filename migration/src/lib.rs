// migration/src/lib.rs
pub use sea_orm_migration::prelude::*;

// 顧客・サブスクリプション関連マイグレーション
mod m20250801_000001_create_billing_customers_table;
mod m20250801_000002_create_subscriptions_table;

// 支払い・使用量関連マイグレーション
mod m20250801_000003_create_payments_table;
mod m20250801_000004_create_usage_records_table;

// Webhook関連マイグレーション
mod m20250801_000005_create_webhook_events_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250801_000001_create_billing_customers_table::Migration),
            Box::new(m20250801_000002_create_subscriptions_table::Migration),
            // usage_records は subscriptions を参照するため後に作成
            Box::new(m20250801_000003_create_payments_table::Migration),
            Box::new(m20250801_000004_create_usage_records_table::Migration),
            Box::new(m20250801_000005_create_webhook_events_table::Migration),
        ]
    }
}
