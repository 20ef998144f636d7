use super::{bool_var, optional_var, parsed_var, required_var, ConfigError};
use crate::domain::plan::BillingInterval;
use crate::domain::subscription_tier::SubscriptionTier;

/// Webhook署名のタイムスタンプ許容誤差（秒）
pub const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

#[derive(Clone, Debug)]
pub struct StripeConfig {
    pub secret_key: String,
    pub publishable_key: String,
    pub webhook_secret: String,
    pub webhook_tolerance_secs: i64,
    pub pro_price_id: Option<String>,
    pub pro_yearly_price_id: Option<String>,
    pub enterprise_price_id: Option<String>,
    pub enterprise_yearly_price_id: Option<String>,
    /// 従量課金用の価格ID（usage_type=metered）
    pub metered_price_id: Option<String>,
    pub currency: String,
    pub allow_promotion_codes: bool,
    pub trial_period_days: Option<u32>,
    pub development_mode: bool,
}

impl StripeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let development_mode = bool_var("PAYMENT_DEVELOPMENT_MODE", false)?;

        let webhook_tolerance_secs =
            parsed_var("STRIPE_WEBHOOK_TOLERANCE_SECS", DEFAULT_WEBHOOK_TOLERANCE_SECS)?;
        let currency = optional_var("BILLING_CURRENCY")
            .unwrap_or_else(|| "usd".to_string())
            .to_lowercase();
        let allow_promotion_codes = bool_var("STRIPE_ALLOW_PROMOTION_CODES", false)?;
        let trial_period_days = match optional_var("STRIPE_TRIAL_PERIOD_DAYS") {
            Some(_) => Some(parsed_var("STRIPE_TRIAL_PERIOD_DAYS", 0u32)?),
            None => None,
        };

        let config = if development_mode {
            tracing::info!("Payment development mode enabled - using mock gateway");
            Self {
                secret_key: optional_var("STRIPE_SECRET_KEY").unwrap_or_default(),
                publishable_key: optional_var("STRIPE_PUBLISHABLE_KEY").unwrap_or_default(),
                webhook_secret: optional_var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
                webhook_tolerance_secs,
                pro_price_id: optional_var("STRIPE_PRO_PRICE_ID"),
                pro_yearly_price_id: optional_var("STRIPE_PRO_YEARLY_PRICE_ID"),
                enterprise_price_id: optional_var("STRIPE_ENTERPRISE_PRICE_ID"),
                enterprise_yearly_price_id: optional_var("STRIPE_ENTERPRISE_YEARLY_PRICE_ID"),
                metered_price_id: optional_var("STRIPE_METERED_PRICE_ID"),
                currency,
                allow_promotion_codes,
                trial_period_days,
                development_mode: true,
            }
        } else {
            // 本番/テストモードの設定
            Self {
                secret_key: required_var("STRIPE_SECRET_KEY")?,
                publishable_key: required_var("STRIPE_PUBLISHABLE_KEY")?,
                webhook_secret: required_var("STRIPE_WEBHOOK_SECRET")?,
                webhook_tolerance_secs,
                pro_price_id: Some(required_var("STRIPE_PRO_PRICE_ID")?),
                pro_yearly_price_id: optional_var("STRIPE_PRO_YEARLY_PRICE_ID"),
                enterprise_price_id: Some(required_var("STRIPE_ENTERPRISE_PRICE_ID")?),
                enterprise_yearly_price_id: optional_var("STRIPE_ENTERPRISE_YEARLY_PRICE_ID"),
                metered_price_id: optional_var("STRIPE_METERED_PRICE_ID"),
                currency,
                allow_promotion_codes,
                trial_period_days,
                development_mode: false,
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// 価格IDの形式を検証
    pub fn validate(&self) -> Result<(), ConfigError> {
        let price_ids = [
            ("STRIPE_PRO_PRICE_ID", &self.pro_price_id),
            ("STRIPE_PRO_YEARLY_PRICE_ID", &self.pro_yearly_price_id),
            ("STRIPE_ENTERPRISE_PRICE_ID", &self.enterprise_price_id),
            (
                "STRIPE_ENTERPRISE_YEARLY_PRICE_ID",
                &self.enterprise_yearly_price_id,
            ),
            ("STRIPE_METERED_PRICE_ID", &self.metered_price_id),
        ];

        for (key, value) in price_ids {
            if let Some(price_id) = value {
                if price_id.starts_with("prod_") {
                    tracing::error!(
                        "{} is a product ID ({}), but it should be a price ID (starting with 'price_')",
                        key,
                        price_id
                    );
                    return Err(ConfigError::Invalid {
                        key,
                        reason: "use a price ID instead of a product ID".to_string(),
                    });
                }
            }
        }

        if self.webhook_tolerance_secs <= 0 {
            return Err(ConfigError::Invalid {
                key: "STRIPE_WEBHOOK_TOLERANCE_SECS",
                reason: "must be positive".to_string(),
            });
        }

        Ok(())
    }

    pub fn is_test_mode(&self) -> bool {
        self.secret_key.starts_with("sk_test_") || self.development_mode
    }

    pub fn get_price_id(&self, tier: SubscriptionTier, interval: BillingInterval) -> Option<&str> {
        match (tier, interval) {
            (SubscriptionTier::Pro, BillingInterval::Month) => self.pro_price_id.as_deref(),
            (SubscriptionTier::Pro, BillingInterval::Year) => self.pro_yearly_price_id.as_deref(),
            (SubscriptionTier::Enterprise, BillingInterval::Month) => {
                self.enterprise_price_id.as_deref()
            }
            (SubscriptionTier::Enterprise, BillingInterval::Year) => {
                self.enterprise_yearly_price_id.as_deref()
            }
            (SubscriptionTier::Free, _) => None,
        }
    }

    /// テスト用の設定（モックゲートウェイ前提）
    pub fn for_testing() -> Self {
        Self {
            secret_key: String::new(),
            publishable_key: "pk_test_mock".to_string(),
            webhook_secret: "whsec_test_secret".to_string(),
            webhook_tolerance_secs: DEFAULT_WEBHOOK_TOLERANCE_SECS,
            pro_price_id: Some("price_test_pro_monthly".to_string()),
            pro_yearly_price_id: Some("price_test_pro_yearly".to_string()),
            enterprise_price_id: Some("price_test_enterprise_monthly".to_string()),
            enterprise_yearly_price_id: None,
            metered_price_id: Some("price_test_metered".to_string()),
            currency: "usd".to_string(),
            allow_promotion_codes: false,
            trial_period_days: None,
            development_mode: true,
        }
    }
}
