//! Centralized constants for the campaign tracker
//!
//! User-adjustable defaults live in salidas.toml; these are the fallbacks.

// =============================================================================
// Defaults
// =============================================================================

/// Unit price used when a campaign is created without one
pub const DEFAULT_UNIT_PRICE: f64 = 10.0;

/// Label given to expenses recorded with an empty label
pub const DEFAULT_EXPENSE_LABEL: &str = "Gasto";

/// Currency symbol shown in console reports
pub const DEFAULT_CURRENCY: &str = "S/";

/// Date format for campaign dates in listings and reports
pub const DEFAULT_DATE_FORMAT: &str = "%d %b %Y";

/// Storage format for campaign dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// Metadata Keys
// =============================================================================

/// Metadata key holding the id of the active campaign
pub const ACTIVE_CAMPAIGN_KEY: &str = "active_campaign_id";

// =============================================================================
// File Names
// =============================================================================

/// Default config file path
pub const CONFIG_FILENAME: &str = "salidas.toml";

/// Database filename (inside the data directory)
pub const DATABASE_FILENAME: &str = "salidas.sqlite";

/// Per-seller reconciliation CSV filename
pub const SELLERS_REPORT_FILENAME: &str = "sellers.csv";

/// Expense ledger CSV filename
pub const EXPENSES_REPORT_FILENAME: &str = "expenses.csv";

/// Campaign summary CSV filename
pub const SUMMARY_FILENAME: &str = "summary.csv";

// =============================================================================
// Display
// =============================================================================

/// Number of expense labels listed in the console summary
pub const TOP_EXPENSE_LABELS: usize = 5;

/// Characters of an id shown in listings and report folder names
pub const SHORT_ID_LEN: usize = 8;
