//! Sales campaign ("salida") reconciliation engine
//!
//! Given a campaign, its sellers and their expenses, derives units sold,
//! expected vs. reported revenue, discrepancies, profit and the campaign-wide
//! inventory reconciliation. Storage and presentation live elsewhere.

pub mod calculations;
pub mod model;

pub use calculations::{
    build_campaign_report, build_campaign_view, build_seller_details, compute_seller_indicators,
    group_expenses_by_seller, round2,
};
pub use model::{
    Campaign, CampaignReport, CampaignView, Expense, PaymentMethod, Seller, SellerDetail,
    SellerIndicators,
};
