// src/pages/pricing.rs

use super::{escape_html, format_amount, layout, Flash};
use crate::domain::plan::{BillingInterval, PlanInfo};
use crate::domain::subscription_tier::SubscriptionTier;

pub struct PricingPage<'a> {
    pub plans: &'a [PlanInfo],
    pub interval: BillingInterval,
    /// ログイン中のみ
    pub current_tier: Option<SubscriptionTier>,
    pub user_email: Option<&'a str>,
    pub flash: Option<Flash>,
}

fn interval_toggle(current: BillingInterval) -> String {
    [BillingInterval::Month, BillingInterval::Year]
        .iter()
        .map(|interval| {
            let label = match interval {
                BillingInterval::Month => "Monthly",
                BillingInterval::Year => "Yearly",
            };
            if *interval == current {
                format!(r#"<strong>{}</strong>"#, label)
            } else {
                format!(
                    r#"<a href="/pricing?interval={}">{}</a>"#,
                    interval.as_str(),
                    label
                )
            }
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

fn plan_action(plan: &PlanInfo, current_tier: Option<SubscriptionTier>) -> String {
    if current_tier == Some(plan.tier) {
        return r#"<span class="badge">Current plan</span>"#.to_string();
    }
    if !plan.tier.is_paid() {
        return "<span>Included with every account</span>".to_string();
    }
    if !plan.available {
        return format!(
            "<span>Not available with {}ly billing</span>",
            plan.interval.as_str()
        );
    }
    // 既に有料プラン契約中の場合はプラン変更をポータルから行う
    if current_tier.is_some_and(|tier| tier.is_paid()) {
        return r#"<a href="/billing">Manage your plan</a>"#.to_string();
    }

    format!(
        r#"<form method="post" action="/billing/checkout">
<input type="hidden" name="tier" value="{tier}">
<input type="hidden" name="interval" value="{interval}">
<button type="submit">Subscribe to {name}</button>
</form>"#,
        tier = plan.tier.as_str(),
        interval = plan.interval.as_str(),
        name = escape_html(plan.name),
    )
}

fn plan_card(plan: &PlanInfo, current_tier: Option<SubscriptionTier>) -> String {
    let class = if current_tier == Some(plan.tier) {
        "card current"
    } else {
        "card"
    };
    let features: String = plan
        .features
        .iter()
        .map(|feature| format!("<li>{}</li>", escape_html(feature)))
        .collect();

    format!(
        r#"<section class="{class}" data-tier="{tier}">
<h2>{name}</h2>
<p class="price">{price} <small>/ {interval}</small></p>
<p>{description}</p>
<p>{included} usage units included</p>
<ul>{features}</ul>
{action}
</section>"#,
        class = class,
        tier = plan.tier.as_str(),
        name = escape_html(plan.name),
        price = format_amount(plan.amount, &plan.currency),
        interval = plan.interval.as_str(),
        description = escape_html(plan.description),
        included = plan.included_usage,
        features = features,
        action = plan_action(plan, current_tier),
    )
}

pub fn render(page: &PricingPage<'_>) -> String {
    let cards: String = page
        .plans
        .iter()
        .map(|plan| plan_card(plan, page.current_tier))
        .collect();

    let body = format!(
        r#"<h1>Plans &amp; pricing</h1>
<p>{toggle}</p>
<div class="cards">{cards}</div>"#,
        toggle = interval_toggle(page.interval),
        cards = cards,
    );

    layout("Pricing", page.user_email, page.flash.as_ref(), &body)
}
