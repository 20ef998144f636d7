// src/config.rs
pub mod app;
pub mod stripe;

pub use app::AppConfig;
pub use stripe::StripeConfig;

use crate::utils::jwt::JwtError;
use std::env;
use thiserror::Error;

/// 設定読み込み時のエラー
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Invalid JWT configuration: {0}")]
    Jwt(#[from] JwtError),
}

/// 空文字列を未設定として扱う
pub(crate) fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn required_var(key: &'static str) -> Result<String, ConfigError> {
    optional_var(key).ok_or(ConfigError::Missing(key))
}

pub(crate) fn bool_var(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match optional_var(key) {
        None => Ok(default),
        Some(value) => match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                reason: format!("expected a boolean, got '{}'", value),
            }),
        },
    }
}

pub(crate) fn parsed_var<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional_var(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
    }
}
