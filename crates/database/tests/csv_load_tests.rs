use serde_json::json;
use std::io::Write;
use tabletalk_database::{categories, summary, Database, DatabaseError, SqliteDatabase};
use tempfile::NamedTempFile;

const SAMPLE: &str = "\
date,description,category,amount
2024-01-03,Coffee shop,food,-4.5
2024-01-05,Paycheck,salary,3000
2024-01-07,Groceries,food,-82.25
2024-01-10,Rent,housing,-1200
2024-01-12,Refund,,15
";

fn write_csv(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

async fn loaded() -> (SqliteDatabase, NamedTempFile) {
    let file = write_csv(SAMPLE);
    let db = SqliteDatabase::open_in_memory(true).unwrap();
    let count = db.load_csv(file.path(), "transactions").await.unwrap();
    assert_eq!(count, 5);
    (db, file)
}

#[tokio::test]
async fn test_load_infers_column_types() {
    let (db, _file) = loaded().await;
    let schema = db.describe_schema().await.unwrap();

    let columns: Vec<(&str, &str)> = schema["transactions"]
        .iter()
        .map(|c| (c.column_name.as_str(), c.column_type.as_str()))
        .collect();
    assert_eq!(
        columns,
        vec![
            ("date", "TEXT"),
            ("description", "TEXT"),
            ("category", "TEXT"),
            ("amount", "REAL"),
        ]
    );
}

#[tokio::test]
async fn test_import_table_is_not_listed() {
    let (db, _file) = loaded().await;
    let schema = db.describe_schema().await.unwrap();
    assert_eq!(schema.keys().collect::<Vec<_>>(), vec!["transactions"]);
}

#[tokio::test]
async fn test_empty_cells_are_null() {
    let (db, _file) = loaded().await;
    let rows = db
        .execute("SELECT category FROM transactions WHERE description = 'Refund'")
        .await
        .unwrap();
    assert_eq!(rows.rows, vec![vec![json!(null)]]);
}

#[tokio::test]
async fn test_numeric_queries() {
    let (db, _file) = loaded().await;
    let rows = db
        .execute("SELECT SUM(amount) AS total FROM transactions WHERE category = 'food'")
        .await
        .unwrap();
    assert_eq!(rows.value(0, "total"), Some(&json!(-86.75)));
}

#[tokio::test]
async fn test_reload_replaces_table() {
    let (db, _file) = loaded().await;
    let smaller = write_csv("date,category,amount\n2024-02-01,food,-1\n");
    let count = db.load_csv(smaller.path(), "transactions").await.unwrap();
    assert_eq!(count, 1);

    let rows = db.execute("SELECT COUNT(*) AS n FROM transactions").await.unwrap();
    assert_eq!(rows.value(0, "n"), Some(&json!(1)));
}

#[tokio::test]
async fn test_read_only_after_load() {
    let (db, _file) = loaded().await;
    let err = db.execute("DELETE FROM transactions").await.unwrap_err();
    assert!(matches!(err, DatabaseError::ReadOnly));
}

#[tokio::test]
async fn test_summary_report() {
    let (db, _file) = loaded().await;
    let report = summary(&db, "transactions").await.unwrap();

    assert_eq!(report.total_transactions, 5);
    assert_eq!(report.total_income, 3015.0);
    assert_eq!(report.total_expenses, 1286.75);
    assert_eq!(report.net_amount, 1728.25);
    assert_eq!(report.unique_categories, 3);
    assert_eq!(report.date_range, "2024-01-03 to 2024-01-12");
}

#[tokio::test]
async fn test_summary_on_empty_table() {
    let file = write_csv("date,category,amount\n");
    let db = SqliteDatabase::open_in_memory(true).unwrap();
    db.load_csv(file.path(), "transactions").await.unwrap();

    let report = summary(&db, "transactions").await.unwrap();
    assert_eq!(report.total_transactions, 0);
    assert_eq!(report.net_amount, 0.0);
    assert_eq!(report.date_range, "None to None");
}

#[tokio::test]
async fn test_categories_report() {
    let (db, _file) = loaded().await;
    let rows = categories(&db, "transactions").await.unwrap();

    assert_eq!(rows.len(), 4);
    assert_eq!(rows.value(0, "category"), Some(&json!("housing")));
    assert_eq!(rows.value(0, "total_spent"), Some(&json!(1200.0)));
    assert_eq!(rows.value(1, "category"), Some(&json!("food")));
    assert_eq!(rows.value(1, "transaction_count"), Some(&json!(2)));
}
