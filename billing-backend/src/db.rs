// src/db.rs
use crate::config::AppConfig;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;

pub type DbPool = DatabaseConnection;

pub async fn create_db_pool(config: &AppConfig) -> Result<DbPool, DbErr> {
    Database::connect(connect_options(&config.database_url)).await
}

pub fn connect_options(database_url: &str) -> ConnectOptions {
    let mut opt = ConnectOptions::new(database_url.to_string());

    if database_url.starts_with("sqlite:") && database_url.contains(":memory:") {
        // インメモリDBは接続ごとに別データベースになるため1本に固定
        opt.max_connections(1).min_connections(1);
    } else {
        opt.max_connections(20).min_connections(2);
    }

    opt.connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(false);

    opt
}

/// 未適用のマイグレーションを実行
pub async fn run_migrations(db: &DbPool) -> Result<(), DbErr> {
    Migrator::up(db, None).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// ヘルスチェック用の疎通確認
pub async fn check_connection(db: &DbPool) -> bool {
    match db.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Database ping failed");
            false
        }
    }
}
