//! Report generation (CSV outputs and console summary)
//!
//! Everything here lays out values already computed by `salidas_core`;
//! no reconciliation happens in this module.

use anyhow::{Context, Result};
use chrono::DateTime;
use csv::Writer;
use salidas_core::{Campaign, CampaignView, PaymentMethod, round2};
use std::path::{Path, PathBuf};

use crate::config::{Config, normalize_zero};
use crate::constants;
use crate::expenses::expenses_by_label;

/// Folder name for one campaign's reports, e.g. `2025-01-01_3f2a9c1e`
pub fn report_dir_name(campaign: &Campaign) -> String {
    format!("{}_{}", campaign.date, short_id(&campaign.id))
}

/// First characters of an id, for listings
pub fn short_id(id: &str) -> &str {
    id.get(..constants::SHORT_ID_LEN).unwrap_or(id)
}

/// Generate all CSV reports for a campaign. Returns the report folder.
pub fn generate_all_reports(output_dir: &Path, view: &CampaignView, config: &Config) -> Result<PathBuf> {
    let report_dir = output_dir.join(report_dir_name(&view.campaign));
    std::fs::create_dir_all(&report_dir)
        .with_context(|| format!("Failed to create {}", report_dir.display()))?;

    generate_seller_ledger(&report_dir, view)?;
    generate_expense_ledger(&report_dir, view)?;
    generate_summary(&report_dir, view, config)?;

    tracing::info!(dir = %report_dir.display(), "generated reports");
    Ok(report_dir)
}

/// Generate sellers.csv
fn generate_seller_ledger(report_dir: &Path, view: &CampaignView) -> Result<()> {
    let path = report_dir.join(constants::SELLERS_REPORT_FILENAME);
    let mut wtr = Writer::from_path(&path)?;

    wtr.write_record([
        "Seller",
        "Assigned_Stock",
        "Units_Sold",
        "Expected_Revenue",
        "Cash_Revenue",
        "Electronic_Revenue",
        "Reported_Revenue",
        "Reported_Surplus",
        "Calculated_Surplus",
        "Discrepancy",
        "Expenses",
        "Net_Profit",
    ])?;

    for detail in &view.seller_details {
        let seller = &detail.seller;
        let ind = &detail.indicators;
        wtr.write_record([
            seller.name.as_str(),
            &format!("{}", seller.assigned_stock),
            &format!("{:.2}", ind.units_sold),
            &format!("{:.2}", ind.expected_revenue),
            &format!("{:.2}", seller.cash_revenue),
            &format!("{:.2}", seller.electronic_revenue),
            &format!("{:.2}", ind.reported_revenue),
            &format!("{}", seller.reported_surplus),
            &format!("{:.2}", ind.calculated_surplus),
            &format!("{:.2}", normalize_zero(ind.discrepancy)),
            &format!("{:.2}", ind.total_expenses),
            &format!("{:.2}", normalize_zero(ind.net_profit)),
        ])?;
    }

    wtr.flush()?;
    println!("  Generated: {}", path.display());

    Ok(())
}

/// Generate expenses.csv
fn generate_expense_ledger(report_dir: &Path, view: &CampaignView) -> Result<()> {
    let path = report_dir.join(constants::EXPENSES_REPORT_FILENAME);
    let mut wtr = Writer::from_path(&path)?;

    wtr.write_record(["Seller", "Label", "Amount", "Recorded_At"])?;

    for detail in &view.seller_details {
        for expense in &detail.expenses {
            let recorded = DateTime::from_timestamp_millis(expense.created_at)
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            wtr.write_record([
                detail.seller.name.as_str(),
                expense.label.as_str(),
                &format!("{:.2}", expense.amount),
                &recorded,
            ])?;
        }
    }

    wtr.flush()?;
    println!("  Generated: {}", path.display());

    Ok(())
}

/// Generate summary.csv (one metric per row)
fn generate_summary(report_dir: &Path, view: &CampaignView, config: &Config) -> Result<()> {
    let path = report_dir.join(constants::SUMMARY_FILENAME);
    let mut wtr = Writer::from_path(&path)?;
    let campaign = &view.campaign;
    let report = &view.report;

    let mode = if campaign.uses_distribution {
        "distribution"
    } else {
        "single-point"
    };

    let rows = [
        ("Campaign_Date", config.display_date(&campaign.date)),
        ("Mode", mode.to_string()),
        ("Unit_Price", format!("{:.2}", campaign.unit_price)),
        ("Total_Stock", format!("{}", campaign.total_stock)),
        ("Sellers", view.seller_details.len().to_string()),
        ("Units_Sold", format!("{:.2}", report.units_sold)),
        ("Total_Revenue", format!("{:.2}", report.total_revenue)),
        ("Total_Expenses", format!("{:.2}", report.total_expenses)),
        ("Net_Revenue", format!("{:.2}", normalize_zero(report.net_revenue))),
        ("Total_Profit", format!("{:.2}", normalize_zero(report.total_profit))),
        (
            "Total_Discrepancy",
            format!("{:.2}", normalize_zero(report.total_discrepancy)),
        ),
        ("Reported_Surplus_Units", format!("{:.2}", report.reported_surplus_units)),
        ("Pending_Inventory", format!("{:.2}", view.pending_inventory)),
        ("General_Surplus", format!("{}", campaign.general_surplus)),
    ];

    wtr.write_record(["Metric", "Value"])?;
    for (metric, value) in &rows {
        wtr.write_record([*metric, value.as_str()])?;
    }

    wtr.flush()?;
    println!("  Generated: {}", path.display());

    Ok(())
}

/// Rounded revenue per payment method across all sellers
pub fn revenue_by_method(view: &CampaignView) -> Vec<(PaymentMethod, f64)> {
    PaymentMethod::ALL
        .iter()
        .map(|&method| {
            let total: f64 = view
                .seller_details
                .iter()
                .map(|d| d.seller.revenue_for(method))
                .sum();
            (method, round2(total))
        })
        .collect()
}

/// Print the campaign summary to stdout
pub fn print_summary(view: &CampaignView, config: &Config) {
    let campaign = &view.campaign;
    let report = &view.report;
    let money = |amount: f64| config.money(amount);

    println!("\n============================================================");
    println!(
        "          CAMPAIGN SUMMARY ({})",
        config.display_date(&campaign.date)
    );
    println!("============================================================\n");

    println!(
        "  Unit price: {}   Stock: {}   Mode: {}",
        money(campaign.unit_price),
        campaign.total_stock,
        if campaign.uses_distribution {
            "distribution"
        } else {
            "single point"
        }
    );
    if let Some(notes) = &campaign.notes {
        println!("  Notes: {}", notes);
    }

    println!("\nSELLERS:");
    if view.seller_details.is_empty() {
        println!("  (no sellers yet)");
    } else {
        println!(
            "  {:<18} {:>8} {:>8} {:>12} {:>12} {:>12} {:>12}",
            "Name", "Stock", "Sold", "Expected", "Reported", "Diff", "Profit"
        );
        println!("  {}", "─".repeat(88));
        for detail in &view.seller_details {
            let ind = &detail.indicators;
            println!(
                "  {:<18} {:>8} {:>8.2} {:>12.2} {:>12.2} {:>12.2} {:>12.2}",
                truncate(&detail.seller.name, 18),
                detail.seller.assigned_stock,
                ind.units_sold,
                ind.expected_revenue,
                ind.reported_revenue,
                normalize_zero(ind.discrepancy),
                normalize_zero(ind.net_profit),
            );
        }
    }

    println!("\nREVENUE:");
    for (method, total) in revenue_by_method(view) {
        println!("  {:<20} {:>14}", format!("{}:", method), money(total));
    }
    println!("  ─────────────────────────────────────");
    println!("  {:<20} {:>14}", "Total Revenue:", money(report.total_revenue));

    println!("\nEXPENSES:");
    let by_label = expenses_by_label(view.seller_details.iter().flat_map(|d| d.expenses.iter()));
    for (label, total) in by_label.iter().take(constants::TOP_EXPENSE_LABELS) {
        println!("  {:<20} {:>14}", truncate(label, 20), money(round2(*total)));
    }
    if by_label.len() > constants::TOP_EXPENSE_LABELS {
        let rest: f64 = by_label[constants::TOP_EXPENSE_LABELS..]
            .iter()
            .map(|(_, total)| total)
            .sum();
        println!("  {:<20} {:>14}", "Other", money(round2(rest)));
    }
    println!("  ─────────────────────────────────────");
    println!("  {:<20} {:>14}", "Total Expenses:", money(report.total_expenses));

    println!("\nPROFIT/LOSS:");
    println!("  {:<20} {:>14}", "Net Revenue:", money(report.net_revenue));
    println!("  {:<20} {:>14}", "Sellers' Profit:", money(report.total_profit));
    println!("  {:<20} {:>14}", "Discrepancy:", money(report.total_discrepancy));

    println!("\nINVENTORY:");
    println!("  Units sold:          {:>10.2}", report.units_sold);
    println!("  Unsold stock:        {:>10.2}", report.reported_surplus_units);
    println!("  Pending (unpaid):    {:>10.2}", view.pending_inventory);
    if !campaign.uses_distribution {
        println!("  General surplus:     {:>10}", campaign.general_surplus);
    }

    println!("============================================================");
}

/// Shorten text for fixed-width columns
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max - 1).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileConfig;
    use salidas_core::{Expense, Seller, build_campaign_view};

    fn campaign() -> Campaign {
        Campaign {
            id: "3f2a9c1e-0000-4000-8000-000000000000".to_string(),
            date: "2025-01-01".to_string(),
            unit_price: 10.0,
            total_stock: 300.0,
            uses_distribution: true,
            general_surplus: 0.0,
            notes: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn seller(id: &str, name: &str, cash: f64, electronic: f64) -> Seller {
        Seller {
            id: id.to_string(),
            campaign_id: campaign().id,
            name: name.to_string(),
            assigned_stock: 100.0,
            reported_surplus: 10.0,
            cash_revenue: cash,
            electronic_revenue: electronic,
            notes: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn expense(id: &str, seller_id: &str, label: &str, amount: f64) -> Expense {
        Expense {
            id: id.to_string(),
            seller_id: seller_id.to_string(),
            label: label.to_string(),
            amount,
            created_at: 1_735_732_800_000,
        }
    }

    fn view() -> CampaignView {
        let sellers = vec![
            seller("s1", "Ana", 700.0, 200.0),
            seller("s2", "Luz", 500.0, 250.5),
        ];
        let expenses = vec![
            expense("e1", "s1", "Almuerzo", 12.0),
            expense("e2", "s1", "Agua", 5.0),
            expense("e3", "s2", "Taxi", 20.0),
        ];
        build_campaign_view(&campaign(), &sellers, &expenses)
    }

    #[test]
    fn test_report_dir_name() {
        assert_eq!(report_dir_name(&campaign()), "2025-01-01_3f2a9c1e");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_revenue_by_method() {
        let totals = revenue_by_method(&view());
        assert_eq!(
            totals,
            vec![(PaymentMethod::Cash, 1200.0), (PaymentMethod::Electronic, 450.5)]
        );
    }

    #[test]
    fn test_generate_all_reports() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_file(
            FileConfig::default(),
            dir.path().join("data"),
            dir.path().join("output"),
        );

        let report_dir = generate_all_reports(&config.output_dir, &view(), &config).unwrap();
        assert!(report_dir.ends_with("2025-01-01_3f2a9c1e"));

        let sellers = std::fs::read_to_string(report_dir.join("sellers.csv")).unwrap();
        let lines: Vec<&str> = sellers.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("Ana,100,90.00,900.00,700.00,200.00,900.00"));

        let expenses = std::fs::read_to_string(report_dir.join("expenses.csv")).unwrap();
        assert_eq!(expenses.lines().count(), 4);
        assert!(expenses.contains("Luz,Taxi,20.00"));

        let summary = std::fs::read_to_string(report_dir.join("summary.csv")).unwrap();
        assert!(summary.contains("Total_Revenue,1650.50"));
        assert!(summary.contains("Total_Expenses,37.00"));
        assert!(summary.contains("Net_Revenue,1613.50"));
        assert!(summary.contains("Mode,distribution"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Ana", 5), "Ana");
        assert_eq!(truncate("Anastasia", 5), "Anas…");
    }
}
