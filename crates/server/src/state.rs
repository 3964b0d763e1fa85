use std::sync::Arc;

use tabletalk_agent::{
    register_default_tools, AgentConfig, AgentLoop, ContextBuilder, LlmClient, SqlPipeline,
    ToolRegistry,
};
use tabletalk_config::Config;
use tabletalk_database::Database;
use tabletalk_provider::Provider;

/// Shared handler state; one per process
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<AgentLoop>,
    pub pipeline: Arc<SqlPipeline>,
    pub llm: Arc<LlmClient>,
    pub db: Arc<dyn Database>,
    pub table_name: String,
}

impl AppState {
    /// Wire the agent loop, pipeline and tools over one provider and database
    pub fn new(provider: Arc<dyn Provider>, db: Arc<dyn Database>, config: &Config) -> Self {
        let mut registry = ToolRegistry::new();
        register_default_tools(
            &mut registry,
            Arc::clone(&db),
            config.orchestration.max_result_rows,
        );

        let agent = AgentLoop::new(
            Arc::clone(&provider),
            Arc::new(registry),
            AgentConfig::from_config(config),
        );

        let plain_llm = || {
            LlmClient::new(Arc::clone(&provider), config.provider.model.clone())
                .with_sampling(config.provider.max_tokens, config.provider.temperature)
        };

        let pipeline = SqlPipeline::new(
            plain_llm(),
            Arc::clone(&db),
            ContextBuilder::new(&config.database.table_name),
        );

        Self {
            agent: Arc::new(agent),
            pipeline: Arc::new(pipeline),
            llm: Arc::new(plain_llm()),
            db,
            table_name: config.database.table_name.clone(),
        }
    }
}
