// src/main.rs
use billing_backend::config::AppConfig;
use billing_backend::db::{create_db_pool, run_migrations};
use billing_backend::infrastructure::{
    mock_gateway::MockPaymentGateway, payment_gateway::PaymentGateway,
    stripe_gateway::StripeGateway,
};
use billing_backend::logging::init_tracing;
use billing_backend::utils::jwt::JwtManager;
use billing_backend::{build_router, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    tracing::info!("Starting Billing Backend server...");

    // 設定を読み込む
    let app_config = AppConfig::from_env()?;
    tracing::info!(
        environment = %app_config.environment,
        app_base_url = %app_config.app_base_url,
        payment_development_mode = app_config.stripe.development_mode,
        "Configuration loaded"
    );

    // データベース接続を作成
    let db_pool = create_db_pool(&app_config).await?;
    tracing::info!("Database pool created successfully.");

    if app_config.auto_migrate {
        run_migrations(&db_pool).await?;
    }

    // 開発モードではStripeを呼ばずにモックで動作させる
    let gateway: Arc<dyn PaymentGateway> = if app_config.stripe.development_mode {
        tracing::warn!("PAYMENT_DEVELOPMENT_MODE enabled - using mock payment gateway");
        if !app_config.is_development() {
            tracing::warn!(
                environment = %app_config.environment,
                "Mock payment gateway is active outside the development environment"
            );
        }
        Arc::new(MockPaymentGateway::new(app_config.app_base_url.clone()))
    } else {
        Arc::new(StripeGateway::new(&app_config.stripe))
    };

    let jwt_manager = Arc::new(JwtManager::new(app_config.jwt.clone())?);
    let app_state = AppState::new(db_pool, gateway, jwt_manager, &app_config);
    let app_router = build_router(app_state);

    // サーバーの起動
    let server_addr = app_config.server_addr();
    tracing::info!("Router configured. Server listening on {}", server_addr);

    let listener = TcpListener::bind(&server_addr).await?;
    axum::serve(listener, app_router.into_make_service()).await?;

    Ok(())
}
