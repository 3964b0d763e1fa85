//! CSV loading
//!
//! Rows are read through the csvtab virtual table, column types are
//! inferred from the text values, then everything is copied into a
//! regular typed table inside one transaction.

use rusqlite::types::Value as SqlValue;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use tracing::{debug, info};

use crate::{quote_ident, DatabaseError, Result};

const IMPORT_TABLE: &str = "temp.tabletalk_csv_import";

/// Storage class inferred for a CSV column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Real,
    Text,
}

impl SqlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
        }
    }

    /// Narrowest type every non-empty value fits; all-empty columns are TEXT
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut seen = false;
        let mut kind = SqlType::Integer;

        for raw in values {
            let value = raw.trim();
            if value.is_empty() {
                continue;
            }
            seen = true;

            if kind == SqlType::Integer && value.parse::<i64>().is_err() {
                kind = SqlType::Real;
            }
            if kind == SqlType::Real && value.parse::<f64>().is_err() {
                return SqlType::Text;
            }
        }

        if seen {
            kind
        } else {
            SqlType::Text
        }
    }

    /// Convert one CSV cell; empty cells become NULL
    pub fn convert(&self, raw: &str) -> SqlValue {
        let value = raw.trim();
        if value.is_empty() {
            return SqlValue::Null;
        }

        match self {
            SqlType::Integer => value
                .parse::<i64>()
                .map(SqlValue::Integer)
                .unwrap_or_else(|_| SqlValue::Text(raw.to_string())),
            SqlType::Real => value
                .parse::<f64>()
                .map(SqlValue::Real)
                .unwrap_or_else(|_| SqlValue::Text(raw.to_string())),
            SqlType::Text => SqlValue::Text(raw.to_string()),
        }
    }
}

/// Load `path` into `table`, replacing any existing table of that name.
/// Returns the number of imported rows.
pub fn load_csv(conn: &mut Connection, path: &Path, table: &str) -> Result<usize> {
    if !path.is_file() {
        return Err(DatabaseError::Csv(format!(
            "file not found: {}",
            path.display()
        )));
    }

    rusqlite::vtab::csvtab::load_module(conn)?;

    let filename = path.to_string_lossy().replace('\'', "''");
    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS {IMPORT_TABLE};
         CREATE VIRTUAL TABLE {IMPORT_TABLE} USING csv(filename='{filename}', header=yes);"
    ))?;

    let result = copy_into(conn, table);
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {IMPORT_TABLE};"))?;
    result
}

fn copy_into(conn: &mut Connection, table: &str) -> Result<usize> {
    let (columns, raw_rows) = read_import_table(conn)?;
    if columns.is_empty() {
        return Err(DatabaseError::Csv("csv has no header row".to_string()));
    }

    let types: Vec<SqlType> = (0..columns.len())
        .map(|i| SqlType::infer(raw_rows.iter().map(|row| row[i].as_str())))
        .collect();

    let column_defs: Vec<String> = columns
        .iter()
        .zip(&types)
        .map(|(name, kind)| format!("{} {}", quote_ident(name), kind.as_str()))
        .collect();
    debug!("creating table {} ({})", table, column_defs.join(", "));

    let placeholders = vec!["?"; columns.len()].join(", ");
    let insert_sql = format!(
        "INSERT INTO {} VALUES ({})",
        quote_ident(table),
        placeholders
    );

    let tx = conn.transaction()?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table_q}; CREATE TABLE {table_q} ({defs});",
        table_q = quote_ident(table),
        defs = column_defs.join(", ")
    ))?;
    {
        let mut stmt = tx.prepare(&insert_sql)?;
        for row in &raw_rows {
            let values: Vec<SqlValue> = types
                .iter()
                .zip(row)
                .map(|(kind, raw)| kind.convert(raw))
                .collect();
            stmt.execute(params_from_iter(values.iter()))?;
        }
    }
    tx.commit()?;

    info!("loaded {} rows into {}", raw_rows.len(), table);
    Ok(raw_rows.len())
}

fn read_import_table(conn: &Connection) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut stmt = conn.prepare(&format!("SELECT * FROM {IMPORT_TABLE}"))?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut rows = stmt.query([])?;
    let mut raw_rows = Vec::new();
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            let cell = match row.get_ref(i)? {
                ValueRef::Null => String::new(),
                ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                    String::from_utf8_lossy(bytes).into_owned()
                }
                ValueRef::Integer(v) => v.to_string(),
                ValueRef::Real(v) => v.to_string(),
            };
            cells.push(cell);
        }
        raw_rows.push(cells);
    }

    Ok((columns, raw_rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_integer() {
        assert_eq!(SqlType::infer(["1", "42", "-7"]), SqlType::Integer);
    }

    #[test]
    fn test_infer_widens_to_real() {
        assert_eq!(SqlType::infer(["1", "2.5", "3"]), SqlType::Real);
    }

    #[test]
    fn test_infer_text() {
        assert_eq!(SqlType::infer(["1", "2.5", "food"]), SqlType::Text);
        assert_eq!(SqlType::infer(["2024-01-05"]), SqlType::Text);
    }

    #[test]
    fn test_infer_skips_empty_cells() {
        assert_eq!(SqlType::infer(["", "12", " "]), SqlType::Integer);
        assert_eq!(SqlType::infer(["", ""]), SqlType::Text);
        assert_eq!(SqlType::infer(Vec::<&str>::new()), SqlType::Text);
    }

    #[test]
    fn test_convert() {
        assert_eq!(SqlType::Integer.convert("12"), SqlValue::Integer(12));
        assert_eq!(SqlType::Real.convert("-3.5"), SqlValue::Real(-3.5));
        assert_eq!(SqlType::Real.convert("4"), SqlValue::Real(4.0));
        assert_eq!(
            SqlType::Text.convert("groceries"),
            SqlValue::Text("groceries".to_string())
        );
        assert_eq!(SqlType::Integer.convert(""), SqlValue::Null);
        assert_eq!(SqlType::Text.convert("  "), SqlValue::Null);
    }

    #[test]
    fn test_load_missing_file() {
        let mut conn = Connection::open_in_memory().unwrap();
        let err = load_csv(&mut conn, Path::new("/definitely/not/here.csv"), "t").unwrap_err();
        assert!(matches!(err, DatabaseError::Csv(_)));
    }
}
