//! Single-shot question answering
//!
//! Generate one SQL query from the schema, run it, then ask the model to
//! explain the rows. No tools are offered.

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{debug, info};

use tabletalk_database::{schema_to_text, Database, DatabaseError};

use crate::context::ContextBuilder;
use crate::llm::LlmClient;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    Llm(String),

    #[error("{0}")]
    Database(#[from] DatabaseError),
}

/// Answer produced by [`SqlPipeline::ask`]
#[derive(Debug, Clone, Serialize)]
pub struct AskOutcome {
    pub question: String,
    pub sql_query: String,
    pub columns: Vec<String>,
    pub data: Vec<Map<String, Value>>,
    pub row_count: usize,
    pub ai_response: String,
}

pub struct SqlPipeline {
    llm: LlmClient,
    db: Arc<dyn Database>,
    context: ContextBuilder,
}

impl SqlPipeline {
    pub fn new(llm: LlmClient, db: Arc<dyn Database>, context: ContextBuilder) -> Self {
        Self { llm, db, context }
    }

    pub async fn ask(&self, question: &str) -> Result<AskOutcome, PipelineError> {
        let schema = self.db.describe_schema().await?;
        let sql_prompt = self.context.sql_prompt(question, &schema_to_text(&schema));

        let reply = self.llm.prompt(&sql_prompt).await;
        let text = reply.content.unwrap_or_default();
        if reply.transport_failed {
            return Err(PipelineError::Llm(text));
        }

        let sql = extract_sql(&text);
        info!("generated sql: {}", sql);

        let rows = self.db.execute(&sql).await?;
        let data = rows.records();
        debug!("query returned {} rows", data.len());

        let answer_prompt = self
            .context
            .answer_prompt(question, &sql, &Value::Array(data.iter().cloned().map(Value::Object).collect()));
        let reply = self.llm.prompt(&answer_prompt).await;
        let ai_response = reply.content.unwrap_or_default();
        if reply.transport_failed {
            return Err(PipelineError::Llm(ai_response));
        }

        Ok(AskOutcome {
            question: question.to_string(),
            sql_query: sql,
            columns: rows.columns,
            row_count: data.len(),
            data,
            ai_response,
        })
    }
}

fn sql_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```sql(.*?)(?:```|$)").unwrap())
}

fn bare_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(.*?)(?:```|$)").unwrap())
}

/// Pull the SQL out of a model reply: a ```sql fence, else a bare
/// fence, else the whole reply.
pub fn extract_sql(reply: &str) -> String {
    sql_fence()
        .captures(reply)
        .or_else(|| bare_fence().captures(reply))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(reply)
        .trim()
        .to_string()
}
