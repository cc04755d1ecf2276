//! Salidas: sales campaign tracking and reconciliation
//!
//! Records campaigns, the sellers working them, what each seller collected
//! and spent, and reconciles collected revenue against units handed out.

mod config;
mod constants;
mod expenses;
mod reports;
mod state;
mod store;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use config::{Config, FileConfig, normalize_zero};
use reports::{short_id, truncate};
use state::{AppState, CampaignChanges, NewCampaign, NewSeller, SellerChanges, StateError};
use store::Store;

#[derive(Parser, Debug)]
#[command(name = "salidas")]
#[command(about = "Track sales campaigns, seller revenue and expenses")]
struct Args {
    /// Data directory for the database
    #[arg(short, long, default_value = "./data", global = true)]
    data_dir: PathBuf,

    /// Output directory for generated CSV reports
    #[arg(short, long, default_value = "./output", global = true)]
    output_dir: PathBuf,

    /// Config file (optional; defaults apply when missing)
    #[arg(short, long, default_value = constants::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// Verbose output (debug logging on stderr)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage campaigns
    #[command(visible_alias = "salida")]
    Campaign {
        #[command(subcommand)]
        action: CampaignCommand,
    },

    /// Manage the sellers of a campaign
    #[command(visible_alias = "vendedor")]
    Seller {
        #[command(subcommand)]
        action: SellerCommand,
    },

    /// Manage seller expenses
    #[command(visible_alias = "gasto")]
    Expense {
        #[command(subcommand)]
        action: ExpenseCommand,
    },

    /// Show the campaign report
    Report {
        /// Campaign ID (default: active campaign)
        #[arg(long)]
        campaign: Option<String>,

        /// Also write CSV reports to the output directory
        #[arg(long)]
        csv: bool,

        /// Print the report as JSON instead
        #[arg(long, conflicts_with = "csv")]
        json: bool,
    },

    /// Show database statistics
    Stats,
}

#[derive(Subcommand, Debug)]
enum CampaignCommand {
    /// Create a campaign and make it active
    Create {
        /// Date (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,

        /// Price per unit (default from config)
        #[arg(long)]
        price: Option<f64>,

        /// Units handed out for the whole campaign
        #[arg(long)]
        stock: f64,

        /// Sell from a single point instead of distributing stock per seller
        #[arg(long, conflicts_with = "distribution")]
        single_point: bool,

        /// Distribute stock per seller
        #[arg(long)]
        distribution: bool,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// List all campaigns
    List,

    /// Update a campaign
    Update {
        /// Campaign ID (or unique prefix)
        id: String,

        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        price: Option<f64>,

        #[arg(long)]
        stock: Option<f64>,

        /// true = per-seller stock, false = single point
        #[arg(long)]
        distribution: Option<bool>,

        /// Unreturned units in single-point mode
        #[arg(long)]
        general_surplus: Option<f64>,

        /// New notes ("" clears them)
        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a campaign with its sellers and expenses
    Delete {
        /// Campaign ID (or unique prefix)
        id: String,
    },

    /// Make a campaign the active one
    Select {
        /// Campaign ID (or unique prefix)
        id: String,
    },

    /// Show a campaign summary
    Show {
        /// Campaign ID (default: active campaign)
        id: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum SellerCommand {
    /// Add a seller to the active campaign
    Add {
        /// Seller name
        #[arg(long)]
        name: String,

        /// Units handed to the seller (ignored in single-point mode)
        #[arg(long, default_value_t = 0.0)]
        stock: f64,

        /// Campaign ID (default: active campaign)
        #[arg(long)]
        campaign: Option<String>,
    },

    /// List sellers with their indicators
    List {
        /// Campaign ID (default: active campaign)
        #[arg(long)]
        campaign: Option<String>,
    },

    /// Update a seller's stock, surplus or collected revenue
    Update {
        /// Seller ID (or unique prefix)
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        stock: Option<f64>,

        /// Units the seller reports as returned
        #[arg(long)]
        surplus: Option<f64>,

        /// Cash collected
        #[arg(long)]
        cash: Option<f64>,

        /// Electronic payments collected
        #[arg(long)]
        electronic: Option<f64>,

        /// New notes ("" clears them)
        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a seller and their expenses
    Delete {
        /// Seller ID (or unique prefix)
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum ExpenseCommand {
    /// Record an expense for a seller
    Add {
        /// Seller ID (or unique prefix)
        #[arg(long)]
        seller: String,

        /// What the money was spent on (default: "Gasto")
        #[arg(long, default_value = "")]
        label: String,

        /// Amount spent
        #[arg(long)]
        amount: f64,
    },

    /// List expenses of the active campaign
    List {
        /// Only this seller's expenses
        #[arg(long)]
        seller: Option<String>,
    },

    /// Delete an expense by ID
    Delete {
        /// Expense ID (or unique prefix)
        id: String,
    },

    /// Import expenses from a CSV file (seller_id,label,amount)
    Import {
        /// Path to CSV file
        file: PathBuf,
    },

    /// Export all expenses to a CSV file
    Export {
        /// Path to output CSV file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let file_config = FileConfig::load_or_default(&args.config)?;
    let config = Config::from_file(file_config, args.data_dir, args.output_dir);

    let store = Store::open(&config.database_path()).await?;
    let mut state = AppState::load(store).await?;

    match args.command {
        Command::Campaign { action } => handle_campaign_command(action, &mut state, &config).await,
        Command::Seller { action } => handle_seller_command(action, &mut state, &config).await,
        Command::Expense { action } => handle_expense_command(action, &mut state, &config).await,
        Command::Report {
            campaign,
            csv,
            json,
        } => handle_report(&state, &config, campaign.as_deref(), csv, json),
        Command::Stats => handle_stats(&state, &config).await,
    }
}

/// Logs go to stderr; RUST_LOG overrides the level picked by --verbose
fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug,sqlx=warn" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Campaign id from an optional query, falling back to the active campaign
fn target_campaign_id(state: &AppState, query: Option<&str>) -> Result<String> {
    let campaign = match query {
        Some(query) => state.resolve_campaign(query)?,
        None => state.active_campaign().ok_or(StateError::NoActiveCampaign)?,
    };
    Ok(campaign.id.clone())
}

/// Handle campaign subcommands
async fn handle_campaign_command(
    action: CampaignCommand,
    state: &mut AppState,
    config: &Config,
) -> Result<()> {
    match action {
        CampaignCommand::Create {
            date,
            price,
            stock,
            single_point,
            distribution,
            notes,
        } => {
            let uses_distribution = if single_point {
                false
            } else {
                distribution || config.default_uses_distribution
            };
            let date = date.unwrap_or_else(|| {
                chrono::Local::now()
                    .format(constants::DATE_FORMAT)
                    .to_string()
            });

            let campaign = state
                .create_campaign(NewCampaign {
                    date,
                    unit_price: price.unwrap_or(config.default_unit_price),
                    total_stock: stock,
                    uses_distribution,
                    notes,
                })
                .await?;

            println!(
                "Created campaign {} ({}): {} units at {}",
                short_id(&campaign.id),
                config.display_date(&campaign.date),
                campaign.total_stock,
                config.money(campaign.unit_price)
            );
            println!("It is now the active campaign.");
            Ok(())
        }

        CampaignCommand::List => {
            let summaries = state.campaign_summaries(config);
            if summaries.is_empty() {
                println!("No campaigns recorded.");
                println!("\nUse 'salidas campaign create --stock <units>' to start one");
                return Ok(());
            }

            println!(
                "  {:<8}  {:<12} {:>12} {:>8} {:>8}  Mode",
                "ID", "Date", "Price", "Stock", "Sellers"
            );
            println!("{}", "-".repeat(70));
            for summary in &summaries {
                let campaign = summary.campaign;
                println!(
                    "{} {:<8}  {:<12} {:>12} {:>8} {:>8}  {}",
                    if summary.is_active { "*" } else { " " },
                    short_id(&campaign.id),
                    summary.display_date,
                    config.money(campaign.unit_price),
                    campaign.total_stock,
                    summary.seller_count,
                    if campaign.uses_distribution {
                        "distribution"
                    } else {
                        "single point"
                    }
                );
            }
            println!("\n{} campaign(s), * = active", summaries.len());
            Ok(())
        }

        CampaignCommand::Update {
            id,
            date,
            price,
            stock,
            distribution,
            general_surplus,
            notes,
        } => {
            let changes = CampaignChanges {
                date,
                unit_price: price,
                total_stock: stock,
                uses_distribution: distribution,
                general_surplus,
                notes,
            };
            let campaign = state.update_campaign(&id, changes).await?;
            println!(
                "Updated campaign {} ({})",
                short_id(&campaign.id),
                config.display_date(&campaign.date)
            );
            Ok(())
        }

        CampaignCommand::Delete { id } => {
            let campaign = state.delete_campaign(&id).await?;
            println!(
                "Deleted campaign {} ({}) with its sellers and expenses",
                short_id(&campaign.id),
                config.display_date(&campaign.date)
            );
            match state.active_campaign() {
                Some(active) => println!(
                    "Active campaign: {} ({})",
                    short_id(&active.id),
                    config.display_date(&active.date)
                ),
                None => println!("No campaigns left."),
            }
            Ok(())
        }

        CampaignCommand::Select { id } => {
            let campaign = state.select_campaign(&id).await?;
            println!(
                "Active campaign: {} ({})",
                short_id(&campaign.id),
                config.display_date(&campaign.date)
            );
            Ok(())
        }

        CampaignCommand::Show { id } => {
            let campaign_id = target_campaign_id(state, id.as_deref())?;
            let view = state
                .view_for(&campaign_id)
                .ok_or(StateError::CampaignNotFound(campaign_id))?;
            reports::print_summary(&view, config);
            Ok(())
        }
    }
}

/// Handle seller subcommands
async fn handle_seller_command(
    action: SellerCommand,
    state: &mut AppState,
    config: &Config,
) -> Result<()> {
    match action {
        SellerCommand::Add {
            name,
            stock,
            campaign,
        } => {
            let seller = state
                .add_seller(NewSeller {
                    campaign_id: campaign,
                    name,
                    assigned_stock: stock,
                })
                .await?;
            println!(
                "Added seller {}: {} ({} units)",
                short_id(&seller.id),
                seller.name,
                seller.assigned_stock
            );
            Ok(())
        }

        SellerCommand::List { campaign } => {
            let campaign_id = target_campaign_id(state, campaign.as_deref())?;
            let view = state
                .view_for(&campaign_id)
                .ok_or(StateError::CampaignNotFound(campaign_id))?;

            if view.seller_details.is_empty() {
                println!("No sellers in this campaign.");
                println!("\nUse 'salidas seller add --name <name> --stock <units>' to add one");
                return Ok(());
            }

            println!(
                "{:<8}  {:<18} {:>7} {:>7} {:>11} {:>11} {:>10} {:>10}",
                "ID", "Name", "Stock", "Surplus", "Cash", "Electronic", "Expenses", "Diff"
            );
            println!("{}", "-".repeat(92));
            for detail in &view.seller_details {
                let seller = &detail.seller;
                println!(
                    "{:<8}  {:<18} {:>7} {:>7} {:>11.2} {:>11.2} {:>10.2} {:>10.2}",
                    short_id(&seller.id),
                    truncate(&seller.name, 18),
                    seller.assigned_stock,
                    seller.reported_surplus,
                    seller.cash_revenue,
                    seller.electronic_revenue,
                    detail.indicators.total_expenses,
                    normalize_zero(detail.indicators.discrepancy),
                );
            }
            println!("{}", "-".repeat(92));
            println!(
                "{:>60} {}",
                "Total revenue:",
                config.money(view.report.total_revenue)
            );
            println!("\n{} seller(s)", view.seller_details.len());
            Ok(())
        }

        SellerCommand::Update {
            id,
            name,
            stock,
            surplus,
            cash,
            electronic,
            notes,
        } => {
            let changes = SellerChanges {
                name,
                assigned_stock: stock,
                reported_surplus: surplus,
                cash_revenue: cash,
                electronic_revenue: electronic,
                notes,
            };
            let seller = state.update_seller(&id, changes).await?;
            println!(
                "Updated seller {}: {} (cash {}, electronic {})",
                short_id(&seller.id),
                seller.name,
                config.money(seller.cash_revenue),
                config.money(seller.electronic_revenue)
            );
            Ok(())
        }

        SellerCommand::Delete { id } => {
            let seller = state.delete_seller(&id).await?;
            println!(
                "Deleted seller {}: {} and their expenses",
                short_id(&seller.id),
                seller.name
            );
            Ok(())
        }
    }
}

/// Handle expense subcommands
async fn handle_expense_command(
    action: ExpenseCommand,
    state: &mut AppState,
    config: &Config,
) -> Result<()> {
    match action {
        ExpenseCommand::Add {
            seller,
            label,
            amount,
        } => {
            let expense = state.record_expense(&seller, &label, amount).await?;
            println!(
                "Added expense {}: {} - {}",
                short_id(&expense.id),
                expense.label,
                config.money(expense.amount)
            );
            Ok(())
        }

        ExpenseCommand::List { seller } => {
            let sellers = match seller {
                Some(query) => vec![state.resolve_seller(&query)?],
                None => {
                    let campaign_id = target_campaign_id(state, None)?;
                    state.sellers_of(&campaign_id)
                }
            };

            let rows: Vec<_> = sellers
                .iter()
                .flat_map(|s| state.expenses_of(&s.id).into_iter().map(move |e| (*s, e)))
                .collect();

            if rows.is_empty() {
                println!("No expenses recorded.");
                println!("\nUse 'salidas expense add --seller <id> --amount <n>' to add expenses");
                println!("Or 'salidas expense import <file.csv>' to import from CSV");
                return Ok(());
            }

            println!(
                "{:<8}  {:<18} {:<24} {:>12}",
                "ID", "Seller", "Label", "Amount"
            );
            println!("{}", "-".repeat(66));
            let mut total = 0.0;
            for (seller, expense) in &rows {
                println!(
                    "{:<8}  {:<18} {:<24} {:>12}",
                    short_id(&expense.id),
                    truncate(&seller.name, 18),
                    truncate(&expense.label, 24),
                    config.money(expense.amount),
                );
                total += expense.amount;
            }
            println!("{}", "-".repeat(66));
            println!(
                "{:>52} {:>12}",
                "Total:",
                config.money(salidas_core::round2(total))
            );
            println!("\n{} expense(s)", rows.len());
            Ok(())
        }

        ExpenseCommand::Delete { id } => {
            let expense = state.delete_expense(&id).await?;
            println!(
                "Deleted expense {}: {} - {}",
                short_id(&expense.id),
                expense.label,
                config.money(expense.amount)
            );
            Ok(())
        }

        ExpenseCommand::Import { file } => {
            let rows = expenses::load_from_csv(&file)?;
            let count = state.import_expenses(rows).await?;
            println!("Imported {} expenses from {}", count, file.display());
            Ok(())
        }

        ExpenseCommand::Export { file } => {
            let all = state.expenses();
            expenses::export_to_csv(all, &file)?;
            println!("Exported {} expenses to {}", all.len(), file.display());
            Ok(())
        }
    }
}

/// Print (and optionally export) a campaign report
fn handle_report(
    state: &AppState,
    config: &Config,
    campaign: Option<&str>,
    csv: bool,
    json: bool,
) -> Result<()> {
    let campaign_id = target_campaign_id(state, campaign)?;
    let view = state
        .view_for(&campaign_id)
        .ok_or(StateError::CampaignNotFound(campaign_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    reports::print_summary(&view, config);

    if csv {
        println!("\nGenerating CSV reports...");
        let report_dir = reports::generate_all_reports(&config.output_dir, &view, config)?;
        println!("\nReports written to {}", report_dir.display());
    }
    Ok(())
}

/// Print database statistics
async fn handle_stats(state: &AppState, config: &Config) -> Result<()> {
    let stats = state.store().stats().await?;

    println!("Database: {}", config.database_path().display());
    println!("  {}", stats);
    match state.active_campaign() {
        Some(active) => println!(
            "  Active campaign: {} ({})",
            short_id(&active.id),
            config.display_date(&active.date)
        ),
        None => println!("  Active campaign: none"),
    }
    Ok(())
}
