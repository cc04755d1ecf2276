//! Records for campaigns, sellers and expenses, plus the derived views
//!
//! Stored records are plain values owned by the caller. Indicators, reports
//! and views are recomputed from them on every read.

use serde::{Deserialize, Serialize};

/// A sales campaign ("salida")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    /// Campaign date (YYYY-MM-DD)
    pub date: String,
    pub unit_price: f64,
    /// Units handed out for the whole campaign
    pub total_stock: f64,
    /// Stock is split per seller and reconciled per seller.
    /// When false the campaign runs from a single point.
    #[serde(default = "default_uses_distribution")]
    pub uses_distribution: bool,
    /// Unreturned units, only tracked in single-point mode
    #[serde(default)]
    pub general_surplus: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Epoch milliseconds
    pub created_at: i64,
    pub updated_at: i64,
}

fn default_uses_distribution() -> bool {
    true
}

/// A seller assigned to a campaign ("vendedor asignado")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seller {
    pub id: String,
    pub campaign_id: String,
    pub name: String,
    /// Units handed to this seller (distribution mode only)
    pub assigned_stock: f64,
    /// Units the seller claims were not sold
    pub reported_surplus: f64,
    pub cash_revenue: f64,
    pub electronic_revenue: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Seller {
    /// Revenue reported through one payment method
    pub fn revenue_for(&self, method: PaymentMethod) -> f64 {
        match method {
            PaymentMethod::Cash => self.cash_revenue,
            PaymentMethod::Electronic => self.electronic_revenue,
        }
    }
}

/// An expense paid by a seller during a campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub seller_id: String,
    pub label: String,
    pub amount: f64,
    pub created_at: i64,
}

/// How a seller collected revenue
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PaymentMethod {
    /// Efectivo
    Cash,
    /// Electronic wallet transfers (Yape)
    Electronic,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 2] = [PaymentMethod::Cash, PaymentMethod::Electronic];
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "Cash"),
            PaymentMethod::Electronic => write!(f, "Electronic"),
        }
    }
}

/// Reconciliation indicators for one seller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerIndicators {
    /// Units implied by reported revenue (not rounded)
    pub units_sold: f64,
    pub expected_revenue: f64,
    pub total_expenses: f64,
    pub reported_revenue: f64,
    /// Assigned stock left after units sold (not rounded)
    pub calculated_surplus: f64,
    /// Expected revenue minus reported revenue
    pub discrepancy: f64,
    /// Reported revenue minus expenses
    pub net_profit: f64,
}

/// A seller together with its expenses and indicators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerDetail {
    #[serde(flatten)]
    pub seller: Seller,
    pub expenses: Vec<Expense>,
    pub indicators: SellerIndicators,
}

/// Campaign-level totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignReport {
    pub campaign_id: String,
    pub units_sold: f64,
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub net_revenue: f64,
    pub total_discrepancy: f64,
    pub total_profit: f64,
    /// Campaign stock not accounted for by units sold
    pub reported_surplus_units: f64,
    /// Aggregate discrepancy expressed in units
    pub pending_inventory: f64,
    /// Epoch milliseconds
    pub generated_at: i64,
}

/// Everything a presentation layer needs to render one campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignView {
    pub campaign: Campaign,
    pub seller_details: Vec<SellerDetail>,
    pub report: CampaignReport,
    pub pending_inventory: f64,
}
