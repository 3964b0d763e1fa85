//! Tools the model may call

pub mod sql;

pub use sql::{GetSchemaTool, RunQueryTool};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use tabletalk_database::{Database, DatabaseError};
use tabletalk_provider::Tool;

/// Failure raised by a tool handler
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    Execution(String),
}

/// A locally executable tool
#[async_trait]
pub trait ToolTrait: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema of the arguments object
    fn parameters(&self) -> Value;
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;
}

pub fn to_provider_tool(tool: &dyn ToolTrait) -> Tool {
    Tool::new(tool.name(), tool.description(), tool.parameters())
}

/// Name to tool mapping, built once and shared read-only
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn ToolTrait>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: ToolTrait + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolTrait>> {
        self.tools.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool declarations in name order
    pub fn definitions(&self) -> Vec<Tool> {
        self.tools
            .values()
            .map(|t| to_provider_tool(t.as_ref()))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Register the SQL tools over `db`
pub fn register_default_tools(
    registry: &mut ToolRegistry,
    db: Arc<dyn Database>,
    max_result_rows: usize,
) {
    registry.register(GetSchemaTool::new(Arc::clone(&db)));
    registry.register(RunQueryTool::new(db, max_result_rows));
}
