//! Common test utilities for agent integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

use tabletalk_agent::{register_default_tools, ToolRegistry};
use tabletalk_database::{Database, SqliteDatabase};
use tabletalk_provider::{ChatParams, ChatResponse, Provider, ProviderError, ToolRequest};

pub const SAMPLE_CSV: &str = "\
date,description,category,amount
2024-01-03,Coffee shop,food,-4.5
2024-01-05,Paycheck,salary,3000
2024-01-07,Groceries,food,-82.25
2024-01-10,Rent,housing,-1200
";

/// One scripted provider answer
pub enum Step {
    Reply(ChatResponse),
    Fail(String),
}

/// Provider that plays back a script and records every request.
/// Once the script runs out it keeps returning `fallback`.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    fallback: Option<ChatResponse>,
    calls: Mutex<Vec<ChatParams>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Always answer with `response`
    pub fn always(response: ChatResponse) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(VecDeque::new()),
            fallback: Some(response),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<ChatParams> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse, ProviderError> {
        self.calls.lock().unwrap().push(params);

        match self.steps.lock().unwrap().pop_front() {
            Some(Step::Reply(response)) => Ok(response),
            Some(Step::Fail(message)) => Err(ProviderError::Api(message)),
            None => match &self.fallback {
                Some(response) => Ok(response.clone()),
                None => Err(ProviderError::Api("script exhausted".to_string())),
            },
        }
    }

    fn default_model(&self) -> String {
        "scripted".to_string()
    }

    fn is_configured(&self) -> bool {
        true
    }
}

pub fn text(content: &str) -> Step {
    Step::Reply(ChatResponse::text(content))
}

pub fn call(id: &str, name: &str, arguments: Value) -> ToolRequest {
    ToolRequest::new(id, name, arguments)
}

pub fn tools(requests: Vec<ToolRequest>) -> Step {
    Step::Reply(ChatResponse::with_tool_calls(None, requests))
}

pub fn query(id: &str, sql: &str) -> ToolRequest {
    call(id, "run_query", json!({ "sql_text": sql }))
}

/// Read-only database loaded with [`SAMPLE_CSV`] as `transactions`
pub async fn sample_database() -> (Arc<SqliteDatabase>, NamedTempFile) {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(SAMPLE_CSV.as_bytes()).unwrap();
    file.flush().unwrap();

    let db = SqliteDatabase::open_in_memory(true).unwrap();
    db.load_csv(file.path(), "transactions").await.unwrap();
    (Arc::new(db), file)
}

pub fn sql_registry(db: Arc<SqliteDatabase>, max_rows: usize) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    let db: Arc<dyn Database> = db;
    register_default_tools(&mut registry, db, max_rows);
    Arc::new(registry)
}
