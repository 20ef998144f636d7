// src/pages/mod.rs

//! サーバーサイドレンダリングの画面（料金プラン・請求管理）

pub mod billing;
pub mod pricing;

use chrono::{DateTime, Utc};

/// 小数点以下を持たない通貨（最小単位がそのまま金額）
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "bif", "clp", "djf", "gnf", "jpy", "kmf", "krw", "mga", "pyg", "rwf", "ugx", "vnd", "vuv",
    "xaf", "xof", "xpf",
];

/// 画面上部に表示する通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Info,
    Error,
}

impl FlashKind {
    fn css_class(&self) -> &'static str {
        match self {
            FlashKind::Success => "flash flash-success",
            FlashKind::Info => "flash flash-info",
            FlashKind::Error => "flash flash-error",
        }
    }
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }

    /// クエリパラメータから通知を組み立てる（errorが最優先）
    pub fn from_query(
        checkout: Option<&str>,
        notice: Option<&str>,
        error: Option<&str>,
    ) -> Option<Self> {
        if let Some(error) = error.filter(|e| !e.is_empty()) {
            return Some(Self::error(error));
        }

        match checkout {
            Some("success") => {
                return Some(Self::success(
                    "Thanks for subscribing! Your plan will be active in a moment.",
                ))
            }
            Some("canceled") => return Some(Self::info("Checkout was canceled.")),
            _ => {}
        }

        match notice {
            Some("canceled") => Some(Self::info(
                "Your subscription will end at the close of the current period.",
            )),
            Some("resumed") => Some(Self::success("Your subscription has been resumed.")),
            _ => None,
        }
    }

    fn render(&self) -> String {
        format!(
            r#"<div class="{}" role="status">{}</div>"#,
            self.kind.css_class(),
            escape_html(&self.message)
        )
    }
}

/// HTML特殊文字をエスケープ
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 最小単位の金額を表示用に整形
pub fn format_amount(amount: i64, currency: &str) -> String {
    let code = currency.to_uppercase();
    if ZERO_DECIMAL_CURRENCIES.contains(&currency.to_lowercase().as_str()) {
        return format!("{} {}", amount, code);
    }

    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{}{}.{:02} {}", sign, abs / 100, abs % 100, code)
}

pub fn format_date(value: Option<DateTime<Utc>>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.format("%Y-%m-%d").to_string())
}

const STYLES: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; color: #1f2933; background: #f5f7fa; }
header { background: #fff; border-bottom: 1px solid #e4e7eb; padding: 12px 24px; display: flex; justify-content: space-between; }
header a { color: #3e4c59; margin-right: 16px; text-decoration: none; }
main { max-width: 960px; margin: 24px auto; padding: 0 16px; }
.cards { display: flex; gap: 16px; flex-wrap: wrap; }
.card { background: #fff; border: 1px solid #e4e7eb; border-radius: 8px; padding: 20px; flex: 1 1 260px; }
.card.current { border-color: #2f80ed; box-shadow: 0 0 0 2px #2f80ed33; }
.price { font-size: 1.6em; font-weight: 600; }
.badge { display: inline-block; font-size: .8em; padding: 2px 8px; border-radius: 10px; background: #e1effe; color: #1a56db; }
.flash { padding: 12px 16px; border-radius: 6px; margin-bottom: 16px; }
.flash-success { background: #def7ec; color: #03543f; }
.flash-info { background: #e1effe; color: #1e429f; }
.flash-error { background: #fde8e8; color: #9b1c1c; }
table { width: 100%; border-collapse: collapse; background: #fff; }
th, td { text-align: left; padding: 8px; border-bottom: 1px solid #e4e7eb; }
form.inline { display: inline; }
button { cursor: pointer; padding: 8px 14px; border-radius: 6px; border: 1px solid #2f80ed; background: #2f80ed; color: #fff; }
button.secondary { background: #fff; color: #2f80ed; }
"#;

/// 共通レイアウト
pub fn layout(title: &str, user_email: Option<&str>, flash: Option<&Flash>, body: &str) -> String {
    let account = match user_email {
        Some(email) => format!(r#"<span>{}</span>"#, escape_html(email)),
        None => String::new(),
    };
    let flash = flash.map(Flash::render).unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>{styles}</style>
</head>
<body>
<header><nav><a href="/pricing">Pricing</a><a href="/billing">Billing</a></nav>{account}</header>
<main>
{flash}
{body}
</main>
</body>
</html>"#,
        title = escape_html(title),
        styles = STYLES,
        account = account,
        flash = flash,
        body = body,
    )
}
