// src/pages/billing.rs

use super::{escape_html, format_amount, format_date, layout, Flash};
use crate::domain::payment_model;
use crate::service::billing_service::SubscriptionOverview;
use crate::service::usage_service::UsageSummary;

pub struct BillingPage<'a> {
    pub user_email: &'a str,
    pub overview: &'a SubscriptionOverview,
    pub usage: &'a UsageSummary,
    pub payments: &'a [payment_model::Model],
    /// ポータルを開ける（顧客登録済み）
    pub has_billing_account: bool,
    pub flash: Option<Flash>,
}

fn post_button(action: &str, label: &str, class: &str) -> String {
    format!(
        r#"<form class="inline" method="post" action="{action}"><button type="submit" class="{class}">{label}</button></form>"#,
        action = action,
        class = class,
        label = escape_html(label),
    )
}

fn subscription_section(page: &BillingPage<'_>) -> String {
    let overview = page.overview;
    let mut actions = Vec::new();

    let details = match &overview.subscription {
        Some(subscription) => {
            let mut lines = vec![
                format!(
                    "<p>Plan: <strong>{}</strong> ({}ly)</p>",
                    escape_html(subscription.tier().display_name()),
                    escape_html(&subscription.billing_interval)
                ),
                format!(
                    r#"<p>Status: <span class="badge">{}</span></p>"#,
                    escape_html(&subscription.status)
                ),
                format!(
                    "<p>Current period: {} to {}</p>",
                    format_date(subscription.current_period_start),
                    format_date(subscription.current_period_end)
                ),
            ];

            if subscription.trial_end.is_some() && subscription.status == "trialing" {
                lines.push(format!(
                    "<p>Trial ends on {}</p>",
                    format_date(subscription.trial_end)
                ));
            }

            if overview.is_entitled {
                if subscription.cancel_at_period_end {
                    lines.push(format!(
                        "<p>Your subscription ends on {}.</p>",
                        format_date(subscription.cancel_at.or(subscription.current_period_end))
                    ));
                    actions.push(post_button("/billing/resume", "Resume subscription", ""));
                } else {
                    actions.push(post_button(
                        "/billing/cancel",
                        "Cancel at period end",
                        "secondary",
                    ));
                }
            }

            lines.concat()
        }
        None => String::new(),
    };

    if !overview.is_entitled {
        actions.push(r#"<a href="/pricing">Choose a plan</a>"#.to_string());
    }
    if page.has_billing_account {
        actions.push(post_button(
            "/billing/portal",
            "Manage payment methods & invoices",
            "secondary",
        ));
    }

    format!(
        r#"<section class="card" id="subscription">
<h2>Subscription</h2>
<p>Current tier: <strong>{tier}</strong></p>
{details}
<p>{actions}</p>
</section>"#,
        tier = escape_html(overview.tier.display_name()),
        details = details,
        actions = actions.join(" "),
    )
}

fn usage_section(usage: &UsageSummary) -> String {
    let overage = if usage.overage > 0 {
        format!(
            r#"<p class="flash flash-error">{} units over the included quota</p>"#,
            usage.overage
        )
    } else {
        String::new()
    };

    format!(
        r#"<section class="card" id="usage">
<h2>Usage this period</h2>
<p><strong>{total}</strong> of {included} included units</p>
<p>Period: {start} to {end}</p>
{overage}
</section>"#,
        total = usage.total_usage,
        included = usage.included_usage,
        start = format_date(usage.period_start),
        end = format_date(usage.period_end),
        overage = overage,
    )
}

/// http(s) 以外のURLはリンクにしない
fn invoice_link(url: Option<&str>) -> String {
    match url {
        Some(url) if url.starts_with("https://") || url.starts_with("http://") => format!(
            r#"<a href="{}" rel="noopener noreferrer">View</a>"#,
            escape_html(url)
        ),
        _ => "-".to_string(),
    }
}

fn payments_section(payments: &[payment_model::Model]) -> String {
    if payments.is_empty() {
        return r#"<section id="payments"><h2>Payment history</h2><p>No payments yet.</p></section>"#
            .to_string();
    }

    let rows: String = payments
        .iter()
        .map(|payment| {
            format!(
                "<tr><td>{date}</td><td>{description}</td><td>{amount}</td><td>{status}</td><td>{link}</td></tr>",
                date = format_date(payment.paid_at.or(Some(payment.created_at))),
                description = escape_html(
                    payment
                        .description
                        .as_deref()
                        .or(payment.billing_reason.as_deref())
                        .unwrap_or("Invoice")
                ),
                amount = format_amount(payment.amount, &payment.currency),
                status = escape_html(&payment.status),
                link = invoice_link(payment.hosted_invoice_url.as_deref()),
            )
        })
        .collect();

    format!(
        r#"<section id="payments">
<h2>Payment history</h2>
<table>
<thead><tr><th>Date</th><th>Description</th><th>Amount</th><th>Status</th><th>Invoice</th></tr></thead>
<tbody>{rows}</tbody>
</table>
</section>"#,
        rows = rows
    )
}

pub fn render(page: &BillingPage<'_>) -> String {
    let body = format!(
        r#"<h1>Billing</h1>
<div class="cards">{subscription}{usage}</div>
{payments}"#,
        subscription = subscription_section(page),
        usage = usage_section(page.usage),
        payments = payments_section(page.payments),
    );

    layout("Billing", Some(page.user_email), page.flash.as_ref(), &body)
}
