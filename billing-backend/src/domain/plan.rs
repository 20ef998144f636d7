// src/domain/plan.rs

use crate::config::StripeConfig;
use crate::domain::subscription_tier::SubscriptionTier;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 請求間隔
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    #[default]
    Month,
    Year,
}

impl BillingInterval {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "month" | "monthly" => Some(Self::Month),
            "year" | "yearly" | "annual" => Some(Self::Year),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

impl FromStr for BillingInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s).ok_or_else(|| format!("Invalid billing interval: {}", s))
    }
}

impl std::fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 料金ページ・APIで表示するプラン情報
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlanInfo {
    pub tier: SubscriptionTier,
    pub name: &'static str,
    pub description: &'static str,
    pub interval: BillingInterval,
    /// 最小通貨単位の表示用金額
    pub amount: i64,
    pub currency: String,
    pub price_id: Option<String>,
    pub included_usage: u64,
    pub features: Vec<&'static str>,
    /// 価格IDが設定されていない有料プランは選択不可
    pub available: bool,
}

/// 設定された価格IDから組み立てる料金カタログ
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    prices: Vec<(SubscriptionTier, BillingInterval, String)>,
    metered_price_id: Option<String>,
    currency: String,
}

impl PlanCatalog {
    pub fn from_config(config: &StripeConfig) -> Self {
        let mut prices = Vec::new();
        for tier in [SubscriptionTier::Pro, SubscriptionTier::Enterprise] {
            for interval in [BillingInterval::Month, BillingInterval::Year] {
                if let Some(price_id) = config.get_price_id(tier, interval) {
                    prices.push((tier, interval, price_id.to_string()));
                }
            }
        }

        Self {
            prices,
            metered_price_id: config.metered_price_id.clone(),
            currency: config.currency.clone(),
        }
    }

    pub fn plans(&self, interval: BillingInterval) -> Vec<PlanInfo> {
        SubscriptionTier::all()
            .into_iter()
            .map(|tier| {
                let price_id = self.price_id(tier, interval).map(str::to_string);
                let amount = match interval {
                    BillingInterval::Month => tier.monthly_amount(),
                    BillingInterval::Year => tier.yearly_amount(),
                };
                PlanInfo {
                    tier,
                    name: tier.display_name(),
                    description: tier.description(),
                    interval,
                    amount,
                    currency: self.currency.clone(),
                    available: !tier.is_paid() || price_id.is_some(),
                    price_id,
                    included_usage: tier.included_usage(),
                    features: tier.features(),
                }
            })
            .collect()
    }

    pub fn price_id(&self, tier: SubscriptionTier, interval: BillingInterval) -> Option<&str> {
        self.prices
            .iter()
            .find(|(t, i, _)| *t == tier && *i == interval)
            .map(|(_, _, price_id)| price_id.as_str())
    }

    /// 価格IDから階層と請求間隔を逆引き
    pub fn resolve_price(&self, price_id: &str) -> Option<(SubscriptionTier, BillingInterval)> {
        self.prices
            .iter()
            .find(|(_, _, id)| id == price_id)
            .map(|(tier, interval, _)| (*tier, *interval))
    }

    pub fn metered_price_id(&self) -> Option<&str> {
        self.metered_price_id.as_deref()
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }
}
