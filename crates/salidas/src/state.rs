//! Application state: an in-memory snapshot of the store plus the active campaign
//!
//! Every mutation writes through to the store, updates the snapshot and then
//! re-derives the active campaign view from scratch. Subscribers receive each
//! new view through a watch channel.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use salidas_core::{Campaign, CampaignView, Expense, Seller, build_campaign_view};
use tokio::sync::watch;

use crate::config::Config;
use crate::constants;
use crate::expenses::ExpenseImport;
use crate::store::Store;

/// Errors caused by user input against the current state
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("No active campaign. Select or create a campaign first.")]
    NoActiveCampaign,
    #[error("Campaign '{0}' not found")]
    CampaignNotFound(String),
    #[error("Seller '{0}' not found")]
    SellerNotFound(String),
    #[error("Expense '{0}' not found")]
    ExpenseNotFound(String),
    #[error("'{0}' matches more than one record, use a longer id")]
    AmbiguousId(String),
    #[error("{field} must be a non-negative number (got {value})")]
    NegativeValue { field: &'static str, value: f64 },
    #[error("Invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),
}

/// Input for a new campaign
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub date: String,
    pub unit_price: f64,
    pub total_stock: f64,
    pub uses_distribution: bool,
    pub notes: Option<String>,
}

/// Partial campaign update; `None` leaves a field unchanged.
/// Empty notes clear the stored notes.
#[derive(Debug, Clone, Default)]
pub struct CampaignChanges {
    pub date: Option<String>,
    pub unit_price: Option<f64>,
    pub total_stock: Option<f64>,
    pub uses_distribution: Option<bool>,
    pub general_surplus: Option<f64>,
    pub notes: Option<String>,
}

/// Input for a new seller. Without a campaign id the active campaign is used.
#[derive(Debug, Clone)]
pub struct NewSeller {
    pub campaign_id: Option<String>,
    pub name: String,
    pub assigned_stock: f64,
}

/// Partial seller update
#[derive(Debug, Clone, Default)]
pub struct SellerChanges {
    pub name: Option<String>,
    pub assigned_stock: Option<f64>,
    pub reported_surplus: Option<f64>,
    pub cash_revenue: Option<f64>,
    pub electronic_revenue: Option<f64>,
    pub notes: Option<String>,
}

/// A campaign as shown in listings
#[derive(Debug)]
pub struct CampaignSummary<'a> {
    pub campaign: &'a Campaign,
    pub display_date: String,
    pub seller_count: usize,
    pub is_active: bool,
}

/// Store-backed application state
pub struct AppState {
    store: Store,
    /// Sorted by date, newest first
    campaigns: Vec<Campaign>,
    sellers: Vec<Seller>,
    expenses: Vec<Expense>,
    active_campaign_id: Option<String>,
    view_tx: watch::Sender<Option<CampaignView>>,
}

impl AppState {
    /// Load everything from the store and restore the active campaign
    pub async fn load(store: Store) -> Result<Self> {
        let mut campaigns = store.list_campaigns().await?;
        sort_campaigns(&mut campaigns);
        let sellers = store.list_sellers().await?;
        let expenses = store.list_expenses().await?;

        let persisted = store.get_metadata(constants::ACTIVE_CAMPAIGN_KEY).await?;
        let active_campaign_id = match persisted {
            Some(id) if campaigns.iter().any(|c| c.id == id) => Some(id),
            Some(id) => {
                tracing::warn!(campaign = %id, "active campaign no longer exists");
                campaigns.first().map(|c| c.id.clone())
            }
            None => campaigns.first().map(|c| c.id.clone()),
        };

        tracing::debug!(
            campaigns = campaigns.len(),
            sellers = sellers.len(),
            expenses = expenses.len(),
            "loaded state"
        );

        let (view_tx, _) = watch::channel(None);
        let state = Self {
            store,
            campaigns,
            sellers,
            expenses,
            active_campaign_id,
            view_tx,
        };
        state.publish();
        Ok(state)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Underlying store
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// All campaigns, newest first
    pub fn campaigns(&self) -> &[Campaign] {
        &self.campaigns
    }

    pub fn active_campaign(&self) -> Option<&Campaign> {
        let id = self.active_campaign_id.as_deref()?;
        self.campaigns.iter().find(|c| c.id == id)
    }

    /// Sellers of one campaign, in insertion order
    pub fn sellers_of(&self, campaign_id: &str) -> Vec<&Seller> {
        self.sellers
            .iter()
            .filter(|s| s.campaign_id == campaign_id)
            .collect()
    }

    /// Expenses of one seller, in insertion order
    pub fn expenses_of(&self, seller_id: &str) -> Vec<&Expense> {
        self.expenses
            .iter()
            .filter(|e| e.seller_id == seller_id)
            .collect()
    }

    /// All stored expenses
    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    /// Campaign listing with display dates
    pub fn campaign_summaries(&self, config: &Config) -> Vec<CampaignSummary<'_>> {
        self.campaigns
            .iter()
            .map(|campaign| CampaignSummary {
                campaign,
                display_date: config.display_date(&campaign.date),
                seller_count: self.sellers_of(&campaign.id).len(),
                is_active: self.active_campaign_id.as_deref() == Some(campaign.id.as_str()),
            })
            .collect()
    }

    /// Freshly derived view of the active campaign
    pub fn campaign_view(&self) -> Option<CampaignView> {
        let id = self.active_campaign_id.as_deref()?;
        self.view_for(id)
    }

    /// Freshly derived view of any campaign
    pub fn view_for(&self, campaign_id: &str) -> Option<CampaignView> {
        let campaign = self.campaigns.iter().find(|c| c.id == campaign_id)?;
        let sellers: Vec<Seller> = self.sellers_of(campaign_id).into_iter().cloned().collect();
        let expenses: Vec<Expense> = self
            .expenses
            .iter()
            .filter(|e| sellers.iter().any(|s| s.id == e.seller_id))
            .cloned()
            .collect();

        Some(build_campaign_view(campaign, &sellers, &expenses))
    }

    /// Receive a new view after every change
    pub fn subscribe(&self) -> watch::Receiver<Option<CampaignView>> {
        self.view_tx.subscribe()
    }

    // =========================================================================
    // Id resolution (exact id or unique prefix)
    // =========================================================================

    pub fn resolve_campaign(&self, query: &str) -> Result<&Campaign, StateError> {
        resolve(&self.campaigns, |c| c.id.as_str(), query, StateError::CampaignNotFound)
    }

    pub fn resolve_seller(&self, query: &str) -> Result<&Seller, StateError> {
        resolve(&self.sellers, |s| s.id.as_str(), query, StateError::SellerNotFound)
    }

    pub fn resolve_expense(&self, query: &str) -> Result<&Expense, StateError> {
        resolve(&self.expenses, |e| e.id.as_str(), query, StateError::ExpenseNotFound)
    }

    // =========================================================================
    // Campaigns
    // =========================================================================

    /// Create a campaign and make it active
    pub async fn create_campaign(&mut self, new: NewCampaign) -> Result<Campaign> {
        validate_date(&new.date)?;
        non_negative("unit price", new.unit_price)?;
        non_negative("total stock", new.total_stock)?;

        let now = now_ms();
        let campaign = Campaign {
            id: new_id(),
            date: new.date,
            unit_price: new.unit_price,
            total_stock: new.total_stock,
            uses_distribution: new.uses_distribution,
            general_surplus: 0.0,
            notes: clean_notes(new.notes),
            created_at: now,
            updated_at: now,
        };

        self.store.save_campaign(&campaign).await?;
        self.campaigns.push(campaign.clone());
        sort_campaigns(&mut self.campaigns);
        self.set_active(Some(campaign.id.clone())).await?;

        tracing::info!(campaign = %campaign.id, date = %campaign.date, "created campaign");
        self.publish();
        Ok(campaign)
    }

    pub async fn update_campaign(&mut self, id: &str, changes: CampaignChanges) -> Result<Campaign> {
        let mut campaign = self.resolve_campaign(id)?.clone();

        if let Some(date) = changes.date {
            validate_date(&date)?;
            campaign.date = date;
        }
        if let Some(price) = changes.unit_price {
            campaign.unit_price = non_negative("unit price", price)?;
        }
        if let Some(stock) = changes.total_stock {
            campaign.total_stock = non_negative("total stock", stock)?;
        }
        if let Some(uses_distribution) = changes.uses_distribution {
            campaign.uses_distribution = uses_distribution;
        }
        if let Some(surplus) = changes.general_surplus {
            campaign.general_surplus = non_negative("general surplus", surplus)?;
        }
        if changes.notes.is_some() {
            campaign.notes = clean_notes(changes.notes);
        }
        campaign.updated_at = now_ms();

        self.store.save_campaign(&campaign).await?;
        if let Some(slot) = self.campaigns.iter_mut().find(|c| c.id == campaign.id) {
            *slot = campaign.clone();
        }
        sort_campaigns(&mut self.campaigns);

        tracing::info!(campaign = %campaign.id, "updated campaign");
        self.publish();
        Ok(campaign)
    }

    /// Delete a campaign with its sellers and their expenses
    pub async fn delete_campaign(&mut self, id: &str) -> Result<Campaign> {
        let campaign = self.resolve_campaign(id)?.clone();

        let seller_ids = self
            .store
            .delete_campaign(&campaign.id)
            .await?
            .ok_or_else(|| StateError::CampaignNotFound(campaign.id.clone()))?;

        self.campaigns.retain(|c| c.id != campaign.id);
        self.sellers.retain(|s| s.campaign_id != campaign.id);
        self.expenses.retain(|e| !seller_ids.contains(&e.seller_id));

        if self.active_campaign_id.as_deref() == Some(campaign.id.as_str()) {
            let next = self.campaigns.first().map(|c| c.id.clone());
            self.set_active(next).await?;
        }

        tracing::info!(
            campaign = %campaign.id,
            sellers = seller_ids.len(),
            "deleted campaign"
        );
        self.publish();
        Ok(campaign)
    }

    /// Make a campaign the active one
    pub async fn select_campaign(&mut self, id: &str) -> Result<Campaign> {
        let campaign = self.resolve_campaign(id)?.clone();
        self.set_active(Some(campaign.id.clone())).await?;
        self.publish();
        Ok(campaign)
    }

    // =========================================================================
    // Sellers
    // =========================================================================

    /// Add a seller to the given campaign, or to the active one
    pub async fn add_seller(&mut self, new: NewSeller) -> Result<Seller> {
        let campaign = match new.campaign_id.as_deref() {
            Some(id) => self.resolve_campaign(id)?,
            None => self.active_campaign().ok_or(StateError::NoActiveCampaign)?,
        };
        non_negative("assigned stock", new.assigned_stock)?;

        let now = now_ms();
        let seller = Seller {
            id: new_id(),
            campaign_id: campaign.id.clone(),
            name: new.name.trim().to_string(),
            // Per-seller stock only means something when stock is distributed
            assigned_stock: if campaign.uses_distribution {
                new.assigned_stock
            } else {
                0.0
            },
            reported_surplus: 0.0,
            cash_revenue: 0.0,
            electronic_revenue: 0.0,
            notes: None,
            created_at: now,
            updated_at: now,
        };

        self.store.save_seller(&seller).await?;
        self.sellers.push(seller.clone());

        tracing::info!(seller = %seller.id, campaign = %seller.campaign_id, "added seller");
        self.publish();
        Ok(seller)
    }

    pub async fn update_seller(&mut self, id: &str, changes: SellerChanges) -> Result<Seller> {
        let mut seller = self.resolve_seller(id)?.clone();

        if let Some(name) = changes.name {
            seller.name = name.trim().to_string();
        }
        if let Some(stock) = changes.assigned_stock {
            seller.assigned_stock = non_negative("assigned stock", stock)?;
        }
        if let Some(surplus) = changes.reported_surplus {
            seller.reported_surplus = non_negative("surplus", surplus)?;
        }
        if let Some(cash) = changes.cash_revenue {
            seller.cash_revenue = non_negative("cash revenue", cash)?;
        }
        if let Some(electronic) = changes.electronic_revenue {
            seller.electronic_revenue = non_negative("electronic revenue", electronic)?;
        }
        if changes.notes.is_some() {
            seller.notes = clean_notes(changes.notes);
        }
        seller.updated_at = now_ms();

        self.store.save_seller(&seller).await?;
        if let Some(slot) = self.sellers.iter_mut().find(|s| s.id == seller.id) {
            *slot = seller.clone();
        }

        tracing::info!(seller = %seller.id, "updated seller");
        self.publish();
        Ok(seller)
    }

    /// Delete a seller and its expenses
    pub async fn delete_seller(&mut self, id: &str) -> Result<Seller> {
        let seller = self.resolve_seller(id)?.clone();

        if !self.store.delete_seller(&seller.id).await? {
            return Err(StateError::SellerNotFound(seller.id).into());
        }
        self.sellers.retain(|s| s.id != seller.id);
        self.expenses.retain(|e| e.seller_id != seller.id);

        tracing::info!(seller = %seller.id, "deleted seller");
        self.publish();
        Ok(seller)
    }

    // =========================================================================
    // Expenses
    // =========================================================================

    /// Record an expense for a seller. An empty label becomes "Gasto".
    pub async fn record_expense(&mut self, seller_id: &str, label: &str, amount: f64) -> Result<Expense> {
        let seller_id = self.resolve_seller(seller_id)?.id.clone();
        non_negative("amount", amount)?;

        let expense = Expense {
            id: new_id(),
            seller_id,
            label: clean_label(label),
            amount,
            created_at: now_ms(),
        };

        self.store.add_expense(&expense).await?;
        self.expenses.push(expense.clone());

        tracing::info!(expense = %expense.id, seller = %expense.seller_id, "recorded expense");
        self.publish();
        Ok(expense)
    }

    pub async fn delete_expense(&mut self, id: &str) -> Result<Expense> {
        let expense = self.resolve_expense(id)?.clone();

        if !self.store.delete_expense(&expense.id).await? {
            return Err(StateError::ExpenseNotFound(expense.id).into());
        }
        self.expenses.retain(|e| e.id != expense.id);

        tracing::info!(expense = %expense.id, "deleted expense");
        self.publish();
        Ok(expense)
    }

    /// Import expenses read from CSV. All rows are checked before any is stored.
    pub async fn import_expenses(&mut self, rows: Vec<ExpenseImport>) -> Result<usize> {
        let now = now_ms();
        let mut expenses = Vec::with_capacity(rows.len());
        for row in rows {
            let seller_id = self.resolve_seller(&row.seller_id)?.id.clone();
            non_negative("amount", row.amount)?;
            expenses.push(Expense {
                id: new_id(),
                seller_id,
                label: clean_label(&row.label),
                amount: row.amount,
                created_at: now,
            });
        }

        let count = self.store.import_expenses(&expenses).await?;
        self.expenses.extend(expenses);

        tracing::info!(count, "imported expenses");
        self.publish();
        Ok(count)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn set_active(&mut self, id: Option<String>) -> Result<()> {
        match &id {
            Some(id) => {
                self.store
                    .set_metadata(constants::ACTIVE_CAMPAIGN_KEY, id)
                    .await?
            }
            None => self.store.clear_metadata(constants::ACTIVE_CAMPAIGN_KEY).await?,
        }
        self.active_campaign_id = id;
        Ok(())
    }

    /// Re-derive the active view and hand it to subscribers
    fn publish(&self) {
        self.view_tx.send_replace(self.campaign_view());
    }
}

/// Find a record by exact id, falling back to a unique id prefix
fn resolve<'a, T>(
    items: &'a [T],
    id_of: impl Fn(&T) -> &str,
    query: &str,
    not_found: fn(String) -> StateError,
) -> Result<&'a T, StateError> {
    let query = query.trim();
    if let Some(item) = items.iter().find(|item| id_of(item) == query) {
        return Ok(item);
    }
    if query.is_empty() {
        return Err(not_found(query.to_string()));
    }

    let mut matches = items.iter().filter(|item| id_of(item).starts_with(query));
    match (matches.next(), matches.next()) {
        (Some(item), None) => Ok(item),
        (Some(_), Some(_)) => Err(StateError::AmbiguousId(query.to_string())),
        (None, _) => Err(not_found(query.to_string())),
    }
}

/// Newest date first; ties keep their current order
fn sort_campaigns(campaigns: &mut [Campaign]) {
    campaigns.sort_by(|a, b| b.date.cmp(&a.date));
}

fn validate_date(date: &str) -> Result<(), StateError> {
    NaiveDate::parse_from_str(date, constants::DATE_FORMAT)
        .map(|_| ())
        .map_err(|_| StateError::InvalidDate(date.to_string()))
}

fn non_negative(field: &'static str, value: f64) -> Result<f64, StateError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(StateError::NegativeValue { field, value })
    }
}

fn clean_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

fn clean_label(label: &str) -> String {
    let label = label.trim();
    if label.is_empty() {
        constants::DEFAULT_EXPENSE_LABEL.to_string()
    } else {
        label.to_string()
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
