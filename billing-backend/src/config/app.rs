use super::{bool_var, optional_var, parsed_var, required_var, ConfigError, StripeConfig};
use crate::utils::jwt::JwtConfig;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// 画面やリダイレクトURLの組み立てに使う公開URL（末尾スラッシュなし）
    pub app_base_url: String,
    /// 未ログイン時のリダイレクト先（ホストアプリのログイン画面）
    pub login_url: String,
    pub cors_allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
    pub auto_migrate: bool,
    pub jwt: JwtConfig,
    pub stripe: StripeConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // .env ファイルを読み込む (存在しなくてもエラーにしない)

        let environment = optional_var("ENVIRONMENT").unwrap_or_else(|| "development".to_string());
        let app_base_url = optional_var("APP_BASE_URL")
            .unwrap_or_else(|| "http://localhost:5000".to_string())
            .trim_end_matches('/')
            .to_string();
        let login_url =
            optional_var("LOGIN_URL").unwrap_or_else(|| format!("{}/login", app_base_url));

        Ok(Self {
            host: optional_var("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parsed_var("PORT", 5000)?,
            database_url: required_var("DATABASE_URL")?,
            cors_allowed_origins: optional_var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|| app_base_url.clone())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            request_timeout_secs: parsed_var("REQUEST_TIMEOUT_SECS", 30)?,
            auto_migrate: bool_var("AUTO_MIGRATE", environment != "production")?,
            jwt: JwtConfig::from_env()?,
            stripe: StripeConfig::from_env()?,
            environment,
            app_base_url,
            login_url,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn is_test(&self) -> bool {
        self.environment == "test"
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// base URL にパスを連結
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.app_base_url, path)
    }

    /// テスト用の設定を作成
    pub fn for_testing() -> Self {
        Self {
            environment: "test".to_string(),
            host: "127.0.0.1".to_string(),
            port: 5000,
            database_url: "sqlite::memory:".to_string(),
            app_base_url: "http://localhost:5000".to_string(),
            login_url: "http://localhost:5000/login".to_string(),
            cors_allowed_origins: vec!["http://localhost:5000".to_string()],
            request_timeout_secs: 30,
            auto_migrate: true,
            jwt: JwtConfig::for_testing(),
            stripe: StripeConfig::for_testing(),
        }
    }
}
