//! Expense CSV import/export and label totals
//!
//! Expenses live in the SQLite database; CSV is for bulk entry and backup.

use anyhow::{Context, Result};
use salidas_core::Expense;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// One row of an expense import file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseImport {
    /// Seller id or a unique prefix of it
    pub seller_id: String,
    #[serde(default)]
    pub label: String,
    pub amount: f64,
}

/// Row written by `export_to_csv`
#[derive(Debug, Serialize)]
struct ExpenseExport<'a> {
    id: &'a str,
    seller_id: &'a str,
    label: &'a str,
    amount: f64,
    created_at: i64,
}

/// Load expense rows from a CSV file with a `seller_id,label,amount` header
pub fn load_from_csv(path: &Path) -> Result<Vec<ExpenseImport>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for (line, result) in rdr.deserialize().enumerate() {
        // +2: header row and 1-based numbering
        let row: ExpenseImport =
            result.with_context(|| format!("Invalid expense row at line {}", line + 2))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Export expenses to CSV (for backup)
pub fn export_to_csv(expenses: &[Expense], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for expense in expenses {
        wtr.serialize(ExpenseExport {
            id: &expense.id,
            seller_id: &expense.seller_id,
            label: &expense.label,
            amount: expense.amount,
            created_at: expense.created_at,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Total expense amount per label, largest first
pub fn expenses_by_label<'a, I>(expenses: I) -> Vec<(String, f64)>
where
    I: IntoIterator<Item = &'a Expense>,
{
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for expense in expenses {
        *totals.entry(expense.label.as_str()).or_insert(0.0) += expense.amount;
    }

    let mut result: Vec<_> = totals
        .into_iter()
        .map(|(label, total)| (label.to_string(), total))
        .collect();
    result.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expense(id: &str, label: &str, amount: f64) -> Expense {
        Expense {
            id: id.to_string(),
            seller_id: "s1".to_string(),
            label: label.to_string(),
            amount,
            created_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_load_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("import.csv");
        std::fs::write(
            &path,
            "seller_id,label,amount\nabc123, Taxi ,12.5\nabc123,,3\n",
        )
        .unwrap();

        let rows = load_from_csv(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].seller_id, "abc123");
        assert_eq!(rows[0].label, "Taxi");
        assert_eq!(rows[0].amount, 12.5);
        assert_eq!(rows[1].label, "");
    }

    #[test]
    fn test_load_reports_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("import.csv");
        std::fs::write(&path, "seller_id,label,amount\nabc,Taxi,12\nabc,Agua,dos\n").unwrap();

        let err = load_from_csv(&path).unwrap_err();
        assert!(format!("{err:#}").contains("line 3"));
    }

    #[test]
    fn test_export_then_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.csv");
        let expenses = vec![expense("e1", "Taxi", 20.0), expense("e2", "Agua, fría", 2.5)];

        export_to_csv(&expenses, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("id,seller_id,label,amount,created_at"));

        let rows = load_from_csv(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].label, "Agua, fría");
        assert_eq!(rows[1].amount, 2.5);
    }

    #[test]
    fn test_expenses_by_label() {
        let expenses = vec![
            expense("e1", "Taxi", 10.0),
            expense("e2", "Agua", 2.0),
            expense("e3", "Taxi", 5.0),
            expense("e4", "Almuerzo", 12.0),
        ];

        let totals = expenses_by_label(&expenses);
        assert_eq!(
            totals,
            vec![
                ("Taxi".to_string(), 15.0),
                ("Almuerzo".to_string(), 12.0),
                ("Agua".to_string(), 2.0),
            ]
        );
        assert!(expenses_by_label(&Vec::<Expense>::new()).is_empty());
    }
}
