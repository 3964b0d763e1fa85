//! Canned reports over a transactions table

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{quote_ident, Database, DatabaseError, QueryRows, Result};

/// Headline numbers for a transactions table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_transactions: i64,
    pub total_income: f64,
    pub total_expenses: f64,
    pub net_amount: f64,
    pub unique_categories: i64,
    pub date_range: String,
}

pub async fn summary(db: &dyn Database, table: &str) -> Result<Summary> {
    let sql = format!(
        "SELECT \
            COUNT(*) AS total_transactions, \
            SUM(CASE WHEN amount > 0 THEN amount ELSE 0 END) AS total_income, \
            SUM(CASE WHEN amount < 0 THEN ABS(amount) ELSE 0 END) AS total_expenses, \
            SUM(amount) AS net_amount, \
            COUNT(DISTINCT category) AS unique_categories, \
            MIN(date) AS earliest_date, \
            MAX(date) AS latest_date \
         FROM {}",
        quote_ident(table)
    );

    let rows = db.execute(&sql).await?;
    if rows.is_empty() {
        return Err(DatabaseError::Shape("summary query returned no rows".to_string()));
    }

    let int = |name: &str| rows.value(0, name).and_then(Value::as_i64).unwrap_or(0);
    let float = |name: &str| rows.value(0, name).and_then(Value::as_f64).unwrap_or(0.0);
    let text = |name: &str| match rows.value(0, name) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "None".to_string(),
        Some(other) => other.to_string(),
    };

    Ok(Summary {
        total_transactions: int("total_transactions"),
        total_income: float("total_income"),
        total_expenses: float("total_expenses"),
        net_amount: float("net_amount"),
        unique_categories: int("unique_categories"),
        date_range: format!("{} to {}", text("earliest_date"), text("latest_date")),
    })
}

/// Per-category totals, biggest spenders first
pub async fn categories(db: &dyn Database, table: &str) -> Result<QueryRows> {
    let sql = format!(
        "SELECT \
            category, \
            COUNT(*) AS transaction_count, \
            SUM(CASE WHEN amount < 0 THEN ABS(amount) ELSE 0 END) AS total_spent, \
            SUM(CASE WHEN amount > 0 THEN amount ELSE 0 END) AS total_earned, \
            AVG(amount) AS avg_amount \
         FROM {} \
         GROUP BY category \
         ORDER BY total_spent DESC",
        quote_ident(table)
    );
    db.execute(&sql).await
}
