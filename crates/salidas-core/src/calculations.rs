//! Reconciliation engine: seller indicators and campaign reports
//!
//! Every function here is pure and total. Inputs are never validated;
//! a zero unit price is replaced by 1 instead of producing an error.

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;

use crate::model::{
    Campaign, CampaignReport, CampaignView, Expense, Seller, SellerDetail, SellerIndicators,
};

/// Round a currency figure to 2 decimal places, ties away from zero.
///
/// Rounds the exact binary value, so `1.005` (stored as 1.00499...) becomes `1.0`.
pub fn round2(value: f64) -> f64 {
    Decimal::from_f64_retain(value)
        .and_then(|d| {
            d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
                .to_f64()
        })
        .unwrap_or(value)
}

/// Unit price used as a divisor. Zero becomes 1.
fn effective_price(unit_price: f64) -> f64 {
    if unit_price == 0.0 || unit_price.is_nan() {
        1.0
    } else {
        unit_price
    }
}

/// Sum in a fixed order so the result does not depend on input order
fn ordered_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut values: Vec<f64> = values.into_iter().collect();
    values.sort_by(f64::total_cmp);
    values.into_iter().fold(0.0, |acc, v| acc + v)
}

/// Compute reconciliation indicators for one seller.
///
/// `expenses` must all belong to `seller`; this is not checked.
pub fn compute_seller_indicators(
    campaign: &Campaign,
    seller: &Seller,
    expenses: &[Expense],
) -> SellerIndicators {
    let total_expenses = round2(expenses.iter().fold(0.0, |acc, e| acc + e.amount));
    let reported_revenue = round2(seller.cash_revenue + seller.electronic_revenue);
    let price = effective_price(campaign.unit_price);

    let units_from_revenue = if price > 0.0 {
        reported_revenue / price
    } else {
        0.0
    };

    // A seller cannot sell more than they were handed; the excess shows up
    // as a negative discrepancy instead.
    let units_sold = if campaign.uses_distribution {
        units_from_revenue.min(seller.assigned_stock)
    } else {
        units_from_revenue
    };

    let calculated_surplus = if campaign.uses_distribution {
        (seller.assigned_stock - units_sold).max(0.0)
    } else {
        0.0
    };

    let expected_revenue = round2(units_sold * price);
    let discrepancy = round2(expected_revenue - reported_revenue);
    let net_profit = round2(reported_revenue - total_expenses);

    SellerIndicators {
        units_sold,
        expected_revenue,
        total_expenses,
        reported_revenue,
        calculated_surplus,
        discrepancy,
        net_profit,
    }
}

/// Partition expenses by owning seller, keeping input order within each group.
///
/// Sellers without expenses have no entry.
pub fn group_expenses_by_seller(expenses: &[Expense]) -> HashMap<&str, Vec<&Expense>> {
    let mut groups: HashMap<&str, Vec<&Expense>> = HashMap::new();
    for expense in expenses {
        groups
            .entry(expense.seller_id.as_str())
            .or_default()
            .push(expense);
    }
    groups
}

/// Attach expenses and indicators to each seller, in seller order
pub fn build_seller_details(
    campaign: &Campaign,
    sellers: &[Seller],
    expenses: &[Expense],
) -> Vec<SellerDetail> {
    let by_seller = group_expenses_by_seller(expenses);

    sellers
        .iter()
        .map(|seller| {
            let owned: Vec<Expense> = by_seller
                .get(seller.id.as_str())
                .map(|group| group.iter().map(|e| (*e).clone()).collect())
                .unwrap_or_default();
            let indicators = compute_seller_indicators(campaign, seller, &owned);

            SellerDetail {
                seller: seller.clone(),
                expenses: owned,
                indicators,
            }
        })
        .collect()
}

/// Aggregate every seller of a campaign into campaign totals
pub fn build_campaign_report(
    campaign: &Campaign,
    sellers: &[Seller],
    expenses: &[Expense],
) -> CampaignReport {
    let details = build_seller_details(campaign, sellers, expenses);
    summarize(campaign, &details)
}

/// Seller details plus campaign report in one value
pub fn build_campaign_view(
    campaign: &Campaign,
    sellers: &[Seller],
    expenses: &[Expense],
) -> CampaignView {
    let seller_details = build_seller_details(campaign, sellers, expenses);
    let report = summarize(campaign, &seller_details);
    let pending_inventory = report.pending_inventory;

    CampaignView {
        campaign: campaign.clone(),
        seller_details,
        report,
        pending_inventory,
    }
}

fn summarize(campaign: &Campaign, details: &[SellerDetail]) -> CampaignReport {
    let indicators = || details.iter().map(|d| &d.indicators);

    let units_sold = ordered_sum(indicators().map(|i| i.units_sold));
    let total_revenue = round2(ordered_sum(indicators().map(|i| i.reported_revenue)));
    let total_expenses = round2(ordered_sum(indicators().map(|i| i.total_expenses)));
    let total_discrepancy_raw = ordered_sum(indicators().map(|i| i.discrepancy));
    let total_profit = round2(ordered_sum(indicators().map(|i| i.net_profit)));

    // Rounded on its own, not derived from total_profit
    let net_revenue = round2(total_revenue - total_expenses);

    let reported_surplus_units = (campaign.total_stock - units_sold).max(0.0);

    let price = effective_price(campaign.unit_price);
    let pending_inventory = if price > 0.0 {
        round2(total_discrepancy_raw.abs() / price)
    } else {
        0.0
    };

    CampaignReport {
        campaign_id: campaign.id.clone(),
        units_sold,
        total_revenue,
        total_expenses,
        net_revenue,
        total_discrepancy: round2(total_discrepancy_raw),
        total_profit,
        reported_surplus_units,
        pending_inventory,
        generated_at: Utc::now().timestamp_millis(),
    }
}
