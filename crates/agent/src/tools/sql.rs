//! SQL tools backed by the database collaborator

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use tabletalk_database::Database;
use tabletalk_provider::object_schema;

use super::{ToolError, ToolTrait};

/// Run one SQL statement and return its rows
pub struct RunQueryTool {
    db: Arc<dyn Database>,
    max_rows: usize,
}

impl RunQueryTool {
    pub fn new(db: Arc<dyn Database>, max_rows: usize) -> Self {
        Self { db, max_rows }
    }
}

#[async_trait]
impl ToolTrait for RunQueryTool {
    fn name(&self) -> &str {
        "run_query"
    }

    fn description(&self) -> &str {
        "Execute a read-only SQL query against the database and return the resulting rows. \
         Call get_schema first if you do not know the table and column names."
    }

    fn parameters(&self) -> Value {
        object_schema(&[("sql_text", "string", "The SQL query to execute", true)])
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let sql = args
            .get("sql_text")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("sql_text must be a string".into()))?
            .trim();

        if sql.is_empty() {
            return Err(ToolError::InvalidArguments("sql_text is empty".into()));
        }

        debug!("run_query: {}", sql);
        let capped = self.db.execute_capped(sql, self.max_rows).await?;

        Ok(json!({
            "columns": capped.rows.columns,
            "rows": capped.rows.records(),
            "row_count": capped.total_rows,
            "truncated": capped.truncated(),
        }))
    }
}

/// List tables and their columns
pub struct GetSchemaTool {
    db: Arc<dyn Database>,
}

impl GetSchemaTool {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ToolTrait for GetSchemaTool {
    fn name(&self) -> &str {
        "get_schema"
    }

    fn description(&self) -> &str {
        "Get the database schema: every table with its column names and types."
    }

    fn parameters(&self) -> Value {
        object_schema(&[])
    }

    async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
        let schema = self.db.describe_schema().await?;
        serde_json::to_value(schema).map_err(|e| ToolError::Execution(e.to_string()))
    }
}
