//! Prompt assembly

use chrono::Local;
use serde_json::Value;

/// Builds the prompts sent to the model for one data set
pub struct ContextBuilder {
    table_name: String,
}

impl ContextBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
        }
    }

    /// System prompt for the tool-calling loop
    pub fn system_prompt(&self) -> String {
        let today = Local::now().format("%Y-%m-%d (%A)");

        format!(
            r#"# tabletalk

You are a data analyst answering questions about financial transactions stored in a SQLite database.
The main table is '{table}'.

## Tools
- get_schema: list every table with its columns and types
- run_query: execute one read-only SQL query and get the rows back

Call get_schema before writing SQL if you are unsure of column names.
If a query fails, read the error, fix the SQL and try again.
When you have enough information, answer in plain language and be specific with numbers.

## Today
{today}"#,
            table = self.table_name,
            today = today
        )
    }

    /// Prompt asking for a single SQL query
    pub fn sql_prompt(&self, question: &str, schema_text: &str) -> String {
        format!(
            r#"You are a SQL expert. Given this database schema for financial transactions:

{schema_text}

Generate a SQLite SQL query to answer this question: "{question}"

Rules:
1. Only return the SQL query, no explanation
2. Use proper SQLite syntax
3. Be precise with column names and data types
4. Use appropriate aggregations and filters
5. Return only the SQL query between triple backticks"#
        )
    }

    /// Prompt asking to explain query results
    pub fn answer_prompt(&self, question: &str, sql: &str, rows: &Value) -> String {
        format!(
            r#"Based on this SQL query result for the question "{question}":

SQL Query: {sql}
Results: {rows}

Provide a clear, natural language answer to the original question. Be specific with numbers and insights."#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_system_prompt_names_table_and_tools() {
        let prompt = ContextBuilder::new("transactions").system_prompt();
        assert!(prompt.contains("'transactions'"));
        assert!(prompt.contains("get_schema"));
        assert!(prompt.contains("run_query"));
    }

    #[test]
    fn test_sql_prompt() {
        let prompt = ContextBuilder::new("transactions")
            .sql_prompt("How much did I spend on food?", "Table 'transactions':\n  amount REAL");
        assert!(prompt.contains("\"How much did I spend on food?\""));
        assert!(prompt.contains("  amount REAL"));
        assert!(prompt.contains("triple backticks"));
    }

    #[test]
    fn test_answer_prompt_includes_rows() {
        let prompt = ContextBuilder::new("transactions").answer_prompt(
            "Total?",
            "SELECT SUM(amount) FROM transactions",
            &json!([{"total": 12.5}]),
        );
        assert!(prompt.contains("SQL Query: SELECT SUM(amount) FROM transactions"));
        assert!(prompt.contains(r#"Results: [{"total":12.5}]"#));
    }
}
