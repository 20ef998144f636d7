use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationError;

/// 冪等キー用正規表現（英数字と `_-:.`、1〜255文字）
pub static IDEMPOTENCY_KEY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-:.]{1,255}$").unwrap());

/// 冪等キーバリデーション
pub fn validate_idempotency_key(key: &str) -> Result<(), ValidationError> {
    if IDEMPOTENCY_KEY_REGEX.is_match(key) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_idempotency_key").with_message(
            "Idempotency key may only contain letters, digits, '_', '-', ':' and '.' (max 255)"
                .into(),
        ))
    }
}

/// 有料プランのティア名バリデーション
pub fn validate_paid_tier(tier: &str) -> Result<(), ValidationError> {
    match tier.to_lowercase().as_str() {
        "pro" | "enterprise" => Ok(()),
        _ => Err(ValidationError::new("invalid_tier")
            .with_message("Tier must be one of: pro, enterprise".into())),
    }
}

/// 請求間隔バリデーション
pub fn validate_interval(interval: &str) -> Result<(), ValidationError> {
    match interval.to_lowercase().as_str() {
        "month" | "year" => Ok(()),
        _ => Err(ValidationError::new("invalid_interval")
            .with_message("Interval must be one of: month, year".into())),
    }
}

/// 使用量の報告方法バリデーション
pub fn validate_usage_action(action: &str) -> Result<(), ValidationError> {
    match action {
        "increment" | "set" => Ok(()),
        _ => Err(ValidationError::new("invalid_usage_action")
            .with_message("Action must be one of: increment, set".into())),
    }
}
