use sea_orm_migration::prelude::*;

use crate::m20250801_000002_create_subscriptions_table::Subscriptions;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 従量課金の使用量レコード
        manager
            .create_table(
                Table::create()
                    .table(UsageRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UsageRecords::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UsageRecords::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(UsageRecords::SubscriptionId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UsageRecords::StripeSubscriptionItemId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UsageRecords::StripeUsageRecordId)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(UsageRecords::Quantity)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UsageRecords::Action)
                            .string()
                            .not_null()
                            .default("increment"),
                    )
                    .col(
                        ColumnDef::new(UsageRecords::IdempotencyKey)
                            .string()
                            .null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(UsageRecords::RecordedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UsageRecords::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_usage_records_subscription_id")
                            .from(UsageRecords::Table, UsageRecords::SubscriptionId)
                            .to(Subscriptions::Table, Subscriptions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_usage_records_subscription_recorded_at")
                    .table(UsageRecords::Table)
                    .col(UsageRecords::SubscriptionId)
                    .col(UsageRecords::RecordedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UsageRecords::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum UsageRecords {
    Table,
    Id,
    UserId,
    SubscriptionId,
    StripeSubscriptionItemId,
    StripeUsageRecordId,
    Quantity,
    Action,
    IdempotencyKey,
    RecordedAt,
    CreatedAt,
}
