//! SQLite storage for campaigns, sellers and expenses
//!
//! Records are keyed by string id. Sellers are looked up by campaign id and
//! expenses by seller id. Cascading deletes run inside a transaction.

use anyhow::{Context, Result};
use salidas_core::{Campaign, Expense, Seller};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use std::path::Path;
use std::time::Duration;

/// Database wrapper
pub struct Store {
    pool: SqlitePool,
}

/// Row type for campaigns query
#[derive(FromRow)]
struct CampaignRow {
    id: String,
    date: String,
    unit_price: f64,
    total_stock: f64,
    uses_distribution: Option<bool>,
    general_surplus: Option<f64>,
    notes: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl From<CampaignRow> for Campaign {
    fn from(r: CampaignRow) -> Self {
        Campaign {
            id: r.id,
            date: r.date,
            unit_price: r.unit_price,
            total_stock: r.total_stock,
            // Rows written before single-point mode existed carry NULLs
            uses_distribution: r.uses_distribution.unwrap_or(true),
            general_surplus: r.general_surplus.unwrap_or(0.0),
            notes: r.notes,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Row type for sellers query
#[derive(FromRow)]
struct SellerRow {
    id: String,
    campaign_id: String,
    name: String,
    assigned_stock: f64,
    reported_surplus: f64,
    cash_revenue: f64,
    electronic_revenue: f64,
    notes: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl From<SellerRow> for Seller {
    fn from(r: SellerRow) -> Self {
        Seller {
            id: r.id,
            campaign_id: r.campaign_id,
            name: r.name,
            assigned_stock: r.assigned_stock,
            reported_surplus: r.reported_surplus,
            cash_revenue: r.cash_revenue,
            electronic_revenue: r.electronic_revenue,
            notes: r.notes,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Row type for expenses query
#[derive(FromRow)]
struct ExpenseRow {
    id: String,
    seller_id: String,
    label: String,
    amount: f64,
    created_at: i64,
}

impl From<ExpenseRow> for Expense {
    fn from(r: ExpenseRow) -> Self {
        Expense {
            id: r.id,
            seller_id: r.seller_id,
            label: r.label,
            amount: r.amount,
            created_at: r.created_at,
        }
    }
}

/// How long a connection waits on a locked database
const BUSY_TIMEOUT_MS: u64 = 5000;

const CAMPAIGN_COLUMNS: &str = "id, date, unit_price, total_stock, uses_distribution, \
     general_surplus, notes, created_at, updated_at";

const SELLER_COLUMNS: &str = "id, campaign_id, name, assigned_stock, reported_surplus, \
     cash_revenue, electronic_revenue, notes, created_at, updated_at";

impl Store {
    /// Open or create the database
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Pragmas are per connection; options apply them to each one the pool opens
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));
        let pool = SqlitePool::connect_with(options)
            .await
            .context("Failed to open database")?;

        let store = Self { pool };
        store.init_schema().await?;
        tracing::debug!(path = %path.display(), "opened database");

        Ok(store)
    }

    /// Initialize database schema
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "
            -- One row per sales campaign (salida)
            CREATE TABLE IF NOT EXISTS campaigns (
                id TEXT PRIMARY KEY,
                date TEXT NOT NULL,
                unit_price REAL NOT NULL,
                total_stock REAL NOT NULL,
                uses_distribution INTEGER,
                general_surplus REAL,
                notes TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "
            -- Sellers assigned to a campaign
            CREATE TABLE IF NOT EXISTS sellers (
                id TEXT PRIMARY KEY,
                campaign_id TEXT NOT NULL,
                name TEXT NOT NULL,
                assigned_stock REAL NOT NULL DEFAULT 0,
                reported_surplus REAL NOT NULL DEFAULT 0,
                cash_revenue REAL NOT NULL DEFAULT 0,
                electronic_revenue REAL NOT NULL DEFAULT 0,
                notes TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sellers_campaign ON sellers(campaign_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "
            -- Expenses paid by a seller
            CREATE TABLE IF NOT EXISTS expenses (
                id TEXT PRIMARY KEY,
                seller_id TEXT NOT NULL,
                label TEXT NOT NULL,
                amount REAL NOT NULL,
                created_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_expenses_seller ON expenses(seller_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "
            -- Key/value settings such as the active campaign
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Campaigns
    // =========================================================================

    /// Get all campaigns, newest date first
    pub async fn list_campaigns(&self) -> Result<Vec<Campaign>> {
        let rows: Vec<CampaignRow> = sqlx::query_as(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns ORDER BY date DESC, created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Campaign::from).collect())
    }

    /// Insert or overwrite a campaign
    pub async fn save_campaign(&self, campaign: &Campaign) -> Result<()> {
        sqlx::query(&format!(
            "INSERT OR REPLACE INTO campaigns ({CAMPAIGN_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&campaign.id)
        .bind(&campaign.date)
        .bind(campaign.unit_price)
        .bind(campaign.total_stock)
        .bind(campaign.uses_distribution)
        .bind(campaign.general_surplus)
        .bind(&campaign.notes)
        .bind(campaign.created_at)
        .bind(campaign.updated_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save campaign {}", campaign.id))?;

        Ok(())
    }

    /// Delete a campaign with its sellers and their expenses.
    /// Returns the ids of the deleted sellers, or None if the campaign did not exist.
    pub async fn delete_campaign(&self, id: &str) -> Result<Option<Vec<String>>> {
        let mut tx = self.pool.begin().await?;

        let seller_ids: Vec<(String,)> =
            sqlx::query_as("SELECT id FROM sellers WHERE campaign_id = ?")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        let deleted = sqlx::query("DELETE FROM campaigns WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query("DELETE FROM sellers WHERE campaign_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let seller_ids: Vec<String> = seller_ids.into_iter().map(|(s,)| s).collect();
        delete_expenses_of(&mut tx, &seller_ids).await?;

        tx.commit().await?;
        Ok(Some(seller_ids))
    }

    // =========================================================================
    // Sellers
    // =========================================================================

    /// Get all sellers in insertion order
    pub async fn list_sellers(&self) -> Result<Vec<Seller>> {
        let rows: Vec<SellerRow> = sqlx::query_as(&format!(
            "SELECT {SELLER_COLUMNS} FROM sellers ORDER BY created_at, rowid"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Seller::from).collect())
    }

    /// Insert or overwrite a seller
    pub async fn save_seller(&self, seller: &Seller) -> Result<()> {
        sqlx::query(&format!(
            "INSERT OR REPLACE INTO sellers ({SELLER_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&seller.id)
        .bind(&seller.campaign_id)
        .bind(&seller.name)
        .bind(seller.assigned_stock)
        .bind(seller.reported_surplus)
        .bind(seller.cash_revenue)
        .bind(seller.electronic_revenue)
        .bind(&seller.notes)
        .bind(seller.created_at)
        .bind(seller.updated_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save seller {}", seller.id))?;

        Ok(())
    }

    /// Delete a seller and its expenses
    pub async fn delete_seller(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM sellers WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM expenses WHERE seller_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Expenses
    // =========================================================================

    /// Get all expenses in insertion order
    pub async fn list_expenses(&self) -> Result<Vec<Expense>> {
        let rows: Vec<ExpenseRow> = sqlx::query_as(
            "SELECT id, seller_id, label, amount, created_at
             FROM expenses
             ORDER BY created_at, rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Expense::from).collect())
    }

    /// Add a new expense
    pub async fn add_expense(&self, expense: &Expense) -> Result<()> {
        sqlx::query(
            "INSERT INTO expenses (id, seller_id, label, amount, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&expense.id)
        .bind(&expense.seller_id)
        .bind(&expense.label)
        .bind(expense.amount)
        .bind(expense.created_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to add expense {}", expense.id))?;

        Ok(())
    }

    /// Delete an expense by ID
    pub async fn delete_expense(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Import multiple expenses (in a transaction for atomicity)
    pub async fn import_expenses(&self, expenses: &[Expense]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        for expense in expenses {
            sqlx::query(
                "INSERT INTO expenses (id, seller_id, label, amount, created_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&expense.id)
            .bind(&expense.seller_id)
            .bind(&expense.label)
            .bind(expense.amount)
            .bind(expense.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(expenses.len())
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Get metadata value
    pub async fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(v,)| v))
    }

    /// Set metadata value
    pub async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove a metadata value
    pub async fn clear_metadata(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM metadata WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Utilities
    // =========================================================================

    /// Get row counts
    pub async fn stats(&self) -> Result<StoreStats> {
        let campaigns: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM campaigns")
            .fetch_one(&self.pool)
            .await?;
        let sellers: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sellers")
            .fetch_one(&self.pool)
            .await?;
        let expenses: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM expenses")
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreStats {
            campaigns: campaigns.0 as u64,
            sellers: sellers.0 as u64,
            expenses: expenses.0 as u64,
        })
    }
}

/// Delete every expense owned by the given sellers
async fn delete_expenses_of(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    seller_ids: &[String],
) -> Result<()> {
    if seller_ids.is_empty() {
        return Ok(());
    }

    let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM expenses WHERE seller_id IN (");
    let mut separated = query.separated(", ");
    for id in seller_ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");

    query.build().execute(&mut **tx).await?;
    Ok(())
}

/// Database row counts
#[derive(Debug, PartialEq, Eq)]
pub struct StoreStats {
    pub campaigns: u64,
    pub sellers: u64,
    pub expenses: u64,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} campaigns, {} sellers, {} expenses",
            self.campaigns, self.sellers, self.expenses
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign(id: &str, date: &str) -> Campaign {
        Campaign {
            id: id.to_string(),
            date: date.to_string(),
            unit_price: 10.0,
            total_stock: 300.0,
            uses_distribution: true,
            general_surplus: 0.0,
            notes: Some("Feria".to_string()),
            created_at: 1,
            updated_at: 1,
        }
    }

    fn seller(id: &str, campaign_id: &str, created_at: i64) -> Seller {
        Seller {
            id: id.to_string(),
            campaign_id: campaign_id.to_string(),
            name: "Ana".to_string(),
            assigned_stock: 100.0,
            reported_surplus: 10.0,
            cash_revenue: 700.0,
            electronic_revenue: 200.0,
            notes: None,
            created_at,
            updated_at: created_at,
        }
    }

    fn expense(id: &str, seller_id: &str, amount: f64) -> Expense {
        Expense {
            id: id.to_string(),
            seller_id: seller_id.to_string(),
            label: "Almuerzo".to_string(),
            amount,
            created_at: 1,
        }
    }

    async fn open_temp() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("test.sqlite")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_campaign_round_trip() {
        let (_dir, store) = open_temp().await;
        store.save_campaign(&campaign("s-1", "2025-01-01")).await.unwrap();

        let loaded = store.list_campaigns().await.unwrap();
        assert_eq!(loaded, vec![campaign("s-1", "2025-01-01")]);
    }

    #[tokio::test]
    async fn test_campaigns_newest_first() {
        let (_dir, store) = open_temp().await;
        store.save_campaign(&campaign("old", "2024-05-01")).await.unwrap();
        store.save_campaign(&campaign("new", "2025-02-01")).await.unwrap();

        let ids: Vec<String> = store
            .list_campaigns()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, ["new", "old"]);
    }

    #[tokio::test]
    async fn test_null_mode_columns_get_defaults() {
        let (_dir, store) = open_temp().await;
        sqlx::query(
            "INSERT INTO campaigns (id, date, unit_price, total_stock, created_at, updated_at)
             VALUES ('legacy', '2024-01-01', 10, 50, 0, 0)",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let legacy = store.list_campaigns().await.unwrap().remove(0);
        assert!(legacy.uses_distribution);
        assert_eq!(legacy.general_surplus, 0.0);
    }

    #[tokio::test]
    async fn test_sellers_in_insertion_order() {
        let (_dir, store) = open_temp().await;
        store.save_seller(&seller("v-2", "s-1", 2)).await.unwrap();
        store.save_seller(&seller("v-1", "s-1", 1)).await.unwrap();
        store.save_seller(&seller("v-3", "s-2", 3)).await.unwrap();

        let ids: Vec<String> = store
            .list_sellers()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, ["v-1", "v-2", "v-3"]);
    }

    #[tokio::test]
    async fn test_delete_campaign_cascades() {
        let (_dir, store) = open_temp().await;
        store.save_campaign(&campaign("s-1", "2025-01-01")).await.unwrap();
        store.save_campaign(&campaign("s-2", "2025-01-02")).await.unwrap();
        store.save_seller(&seller("v-1", "s-1", 1)).await.unwrap();
        store.save_seller(&seller("v-2", "s-2", 2)).await.unwrap();
        store.add_expense(&expense("g-1", "v-1", 12.0)).await.unwrap();
        store.add_expense(&expense("g-2", "v-2", 5.0)).await.unwrap();

        let removed = store.delete_campaign("s-1").await.unwrap();
        assert_eq!(removed, Some(vec!["v-1".to_string()]));
        assert_eq!(
            store.stats().await.unwrap(),
            StoreStats {
                campaigns: 1,
                sellers: 1,
                expenses: 1
            }
        );
        assert_eq!(store.delete_campaign("s-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_seller_cascades() {
        let (_dir, store) = open_temp().await;
        store.save_seller(&seller("v-1", "s-1", 1)).await.unwrap();
        store.add_expense(&expense("g-1", "v-1", 12.0)).await.unwrap();

        assert!(store.delete_seller("v-1").await.unwrap());
        assert!(!store.delete_seller("v-1").await.unwrap());
        assert!(store.list_expenses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_and_delete_expenses() {
        let (_dir, store) = open_temp().await;
        let count = store
            .import_expenses(&[expense("g-1", "v-1", 1.0), expense("g-2", "v-1", 2.0)])
            .await
            .unwrap();
        assert_eq!(count, 2);

        assert!(store.delete_expense("g-1").await.unwrap());
        assert!(!store.delete_expense("g-1").await.unwrap());
        assert_eq!(store.list_expenses().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_every_connection_uses_wal_and_busy_timeout() {
        let (_dir, store) = open_temp().await;

        // Hold several connections at once so more than one is configured
        let mut conns = Vec::new();
        for _ in 0..3 {
            conns.push(store.pool.acquire().await.unwrap());
        }
        for conn in conns.iter_mut() {
            let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
                .fetch_one(&mut **conn)
                .await
                .unwrap();
            assert_eq!(mode.to_lowercase(), "wal");

            let (timeout,): (i64,) = sqlx::query_as("PRAGMA busy_timeout")
                .fetch_one(&mut **conn)
                .await
                .unwrap();
            assert_eq!(timeout, 5000);
        }
    }

    #[tokio::test]
    async fn test_metadata() {
        let (_dir, store) = open_temp().await;
        assert_eq!(store.get_metadata("k").await.unwrap(), None);

        store.set_metadata("k", "a").await.unwrap();
        store.set_metadata("k", "b").await.unwrap();
        assert_eq!(store.get_metadata("k").await.unwrap().as_deref(), Some("b"));

        store.clear_metadata("k").await.unwrap();
        assert_eq!(store.get_metadata("k").await.unwrap(), None);
    }

    #[test]
    fn test_stats_display() {
        let stats = StoreStats {
            campaigns: 2,
            sellers: 5,
            expenses: 9,
        };
        assert_eq!(stats.to_string(), "2 campaigns, 5 sellers, 9 expenses");
    }
}
