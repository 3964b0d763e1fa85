//! tabletalk command implementations

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use tabletalk_agent::{
    register_default_tools, AgentConfig, AgentLoop, ContextBuilder, LlmClient, SqlPipeline,
    StopReason, ToolRegistry,
};
use tabletalk_config::{self, Config};
use tabletalk_database::{Database, SqliteDatabase};
use tabletalk_provider::{ChatCompletionsProvider, Provider};
use tabletalk_server::AppState;

fn build_provider(config: &Config) -> Arc<dyn Provider> {
    Arc::new(ChatCompletionsProvider::with_timeout(
        config.provider.api_key.clone(),
        config.provider.api_base.clone(),
        Some(config.provider.model.clone()),
        Duration::from_secs(config.provider.timeout_secs),
    ))
}

fn require_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    let provider = build_provider(config);
    if !provider.is_configured() {
        anyhow::bail!(
            "No API key configured. Set one in {} or TABLETALK_API_KEY",
            tabletalk_config::config_path().display()
        );
    }
    Ok(provider)
}

/// In-memory database with the configured CSV loaded
async fn open_database(config: &Config) -> Result<SqliteDatabase> {
    let db = SqliteDatabase::open_in_memory(config.database.read_only)?;
    let path = config.csv_path();
    db.load_csv(&path, &config.database.table_name)
        .await
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok(db)
}

/// Start the HTTP server
pub async fn serve_command() -> Result<()> {
    let config = Config::load().await?;

    let provider = build_provider(&config);
    if !provider.is_configured() {
        warn!("no API key configured, model calls will fail");
    }

    let db = match open_database(&config).await {
        Ok(db) => db,
        Err(e) => {
            warn!("{:#}; starting with an empty database", e);
            SqliteDatabase::open_in_memory(config.database.read_only)?
        }
    };

    let state = AppState::new(provider, Arc::new(db), &config);
    let addr = config.bind_address();
    info!("starting server on {}", addr);

    tabletalk_server::serve(state, &addr)
        .await
        .with_context(|| format!("server on {} failed", addr))
}

/// Answer one question on stdout
pub async fn ask_command(question: String, single_shot: bool) -> Result<()> {
    let config = Config::load().await?;
    let provider = require_provider(&config)?;
    let db: Arc<dyn Database> = Arc::new(open_database(&config).await?);

    if single_shot {
        let llm = LlmClient::new(provider, config.provider.model.clone())
            .with_sampling(config.provider.max_tokens, config.provider.temperature);
        let pipeline = SqlPipeline::new(llm, db, ContextBuilder::new(&config.database.table_name));

        let outcome = pipeline.ask(&question).await?;
        println!("SQL: {}", outcome.sql_query);
        println!("Rows: {}", outcome.row_count);
        println!("\n{}", outcome.ai_response);
        return Ok(());
    }

    let mut registry = ToolRegistry::new();
    register_default_tools(&mut registry, db, config.orchestration.max_result_rows);
    let agent = AgentLoop::new(
        provider,
        Arc::new(registry),
        AgentConfig::from_config(&config),
    );

    let outcome = agent.answer_question(&question).await;
    match outcome.stop_reason {
        StopReason::Completed => {}
        StopReason::BudgetExhausted => warn!(
            "no final answer after {} rounds, showing the last partial answer",
            outcome.rounds_used
        ),
        StopReason::TransportFailed => {
            anyhow::bail!(outcome.final_text.unwrap_or_default())
        }
        StopReason::Cancelled => anyhow::bail!("cancelled"),
    }

    println!(
        "{}",
        outcome.answer_text().unwrap_or("No answer was produced.")
    );
    info!("answered in {} rounds", outcome.rounds_used);
    Ok(())
}

/// Run SQL and print the rows as JSON
pub async fn query_command(sql: String) -> Result<()> {
    let config = Config::load().await?;
    let db = open_database(&config).await?;

    let rows = db.execute(&sql).await?;
    let output = serde_json::json!({
        "columns": rows.columns,
        "data": rows.records(),
        "row_count": rows.len(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Write the default config file
pub async fn init_command() -> Result<()> {
    println!("Initializing tabletalk...");

    let config = tabletalk_config::init().await?;

    println!("\nConfig: {}", tabletalk_config::config_path().display());
    println!("\nNext steps:");
    println!("  1. Add your API key to the config file or set TABLETALK_API_KEY");
    println!(
        "  2. Point database.csv_path at your data (now {})",
        config.database.csv_path
    );
    println!("  3. Ask a question: tabletalk ask \"What tables are available?\"");

    Ok(())
}

/// Show configuration status
pub async fn status_command() -> Result<()> {
    let config_path = tabletalk_config::config_path();

    println!("tabletalk status");
    println!(
        "Config:   {} {}",
        config_path.display(),
        if config_path.exists() {
            "[OK]"
        } else {
            "[Missing]"
        }
    );

    let config = Config::load().await?;
    let csv_path = config.csv_path();

    println!(
        "API Key:  {}",
        if config.has_api_key() {
            "[Set]"
        } else {
            "[Missing]"
        }
    );
    println!("Model:    {}", config.provider.model);
    if let Some(base) = &config.provider.api_base {
        println!("API Base: {}", base);
    }
    println!(
        "CSV:      {} {}",
        csv_path.display(),
        if csv_path.exists() { "[OK]" } else { "[Missing]" }
    );
    println!("Table:    {}", config.database.table_name);
    println!("Rounds:   {}", config.orchestration.max_rounds);
    println!("Listen:   {}", config.bind_address());

    Ok(())
}
