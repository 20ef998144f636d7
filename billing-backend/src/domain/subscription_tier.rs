// src/domain/subscription_tier.rs

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// サブスクリプション階層
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Pro,
    Enterprise,
}

impl SubscriptionTier {
    /// 文字列からSubscriptionTierに変換
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "free" => Some(Self::Free),
            "pro" => Some(Self::Pro),
            "enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }

    /// SubscriptionTierを文字列として取得
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }

    /// 階層レベルを数値で取得
    pub fn level(&self) -> u8 {
        match self {
            Self::Free => 1,
            Self::Pro => 2,
            Self::Enterprise => 3,
        }
    }

    /// 指定した階層以上かチェック
    pub fn is_at_least(&self, other: &Self) -> bool {
        self.level() >= other.level()
    }

    /// 課金対象の階層か
    pub fn is_paid(&self) -> bool {
        !matches!(self, Self::Free)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Pro => "Pro",
            Self::Enterprise => "Enterprise",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Free => "Get started at no cost",
            Self::Pro => "For professionals and growing teams",
            Self::Enterprise => "For organizations with advanced needs",
        }
    }

    /// プランに含まれる従量課金の無料枠（請求期間あたり）
    pub fn included_usage(&self) -> u64 {
        match self {
            Self::Free => 1_000,
            Self::Pro => 100_000,
            Self::Enterprise => 1_000_000,
        }
    }

    /// 表示用の月額（最小通貨単位）
    pub fn monthly_amount(&self) -> i64 {
        match self {
            Self::Free => 0,
            Self::Pro => 1_900,
            Self::Enterprise => 9_900,
        }
    }

    /// 表示用の年額（最小通貨単位、2か月分割引）
    pub fn yearly_amount(&self) -> i64 {
        self.monthly_amount() * 10
    }

    pub fn features(&self) -> Vec<&'static str> {
        match self {
            Self::Free => vec![
                "Up to 1,000 API calls per month",
                "Community support",
                "Basic analytics",
            ],
            Self::Pro => vec![
                "Up to 100,000 API calls per month",
                "Usage-based overage billing",
                "Email support",
                "Advanced analytics",
            ],
            Self::Enterprise => vec![
                "Up to 1,000,000 API calls per month",
                "Usage-based overage billing",
                "Priority support",
                "Dedicated account manager",
                "Custom integrations",
            ],
        }
    }

    /// 全ての有効な階層を取得
    pub fn all() -> Vec<Self> {
        vec![Self::Free, Self::Pro, Self::Enterprise]
    }
}

impl FromStr for SubscriptionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s).ok_or_else(|| format!("Invalid subscription tier: {}", s))
    }
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
