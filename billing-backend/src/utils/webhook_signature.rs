// src/utils/webhook_signature.rs

//! Stripe-Signature ヘッダーの検証
//!
//! ヘッダー形式は `t=<unix秒>,v1=<hex>[,v1=<hex>...]`。
//! `"{t}.{body}"` の HMAC-SHA256 をいずれかの v1 と定数時間で比較し、
//! タイムスタンプが許容範囲内であることを確認する。

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WebhookSignatureError {
    #[error("Malformed signature header: {0}")]
    MalformedHeader(String),

    #[error("No v1 signature found in header")]
    NoSignatures,

    #[error("Signature does not match the payload")]
    SignatureMismatch,

    #[error("Timestamp outside the tolerance window")]
    TimestampOutOfTolerance,

    #[error("Webhook secret is not usable")]
    InvalidSecret,
}

/// パース済みの署名ヘッダー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, WebhookSignatureError> {
        let mut timestamp: Option<i64> = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part.trim().split_once('=').ok_or_else(|| {
                WebhookSignatureError::MalformedHeader("expected key=value pairs".to_string())
            })?;

            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| {
                        WebhookSignatureError::MalformedHeader("invalid timestamp".to_string())
                    })?);
                }
                "v1" => {
                    // 16進数として読めないものは一致しない署名として扱う
                    if let Ok(bytes) = hex::decode(value) {
                        signatures.push(bytes);
                    }
                }
                // v0 など他のスキームは無視
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            WebhookSignatureError::MalformedHeader("missing timestamp".to_string())
        })?;

        if signatures.is_empty() {
            return Err(WebhookSignatureError::NoSignatures);
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    pub fn verify(&self, payload: &[u8], header: &str) -> Result<(), WebhookSignatureError> {
        self.verify_at(payload, header, chrono::Utc::now().timestamp())
    }

    pub fn verify_at(
        &self,
        payload: &[u8],
        header: &str,
        now: i64,
    ) -> Result<(), WebhookSignatureError> {
        let header = SignatureHeader::parse(header)?;
        let mac = signed_mac(&self.secret, header.timestamp, payload)?;

        let matched = header
            .signatures
            .iter()
            .any(|signature| mac.clone().verify_slice(signature).is_ok());

        if !matched {
            return Err(WebhookSignatureError::SignatureMismatch);
        }

        if (now - header.timestamp).abs() > self.tolerance_secs {
            return Err(WebhookSignatureError::TimestampOutOfTolerance);
        }

        Ok(())
    }
}

fn signed_mac(
    secret: &str,
    timestamp: i64,
    payload: &[u8],
) -> Result<HmacSha256, WebhookSignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookSignatureError::InvalidSecret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// ペイロードに署名して hex 文字列を返す
pub fn compute_signature(
    secret: &str,
    timestamp: i64,
    payload: &[u8],
) -> Result<String, WebhookSignatureError> {
    let mac = signed_mac(secret, timestamp, payload)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// `t=..,v1=..` 形式のヘッダー値を組み立てる（開発ツール・テスト用）
pub fn signature_header(
    secret: &str,
    timestamp: i64,
    payload: &[u8],
) -> Result<String, WebhookSignatureError> {
    let signature = compute_signature(secret, timestamp, payload)?;
    Ok(format!("t={},v1={}", timestamp, signature))
}
