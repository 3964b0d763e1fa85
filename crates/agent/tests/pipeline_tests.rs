//! Single-shot pipeline and LLM client tests with a mocked provider

mod common;

use async_trait::async_trait;
use mockall::{mock, Sequence};
use serde_json::json;
use std::sync::Arc;

use common::sample_database;
use tabletalk_agent::{ContextBuilder, LlmClient, PipelineError, SqlPipeline, ToolChoicePolicy};
use tabletalk_provider::{
    ChatParams, ChatResponse, Provider, ProviderError, Tool, ToolChoice, ToolRequest, Turn,
};

mock! {
    pub Provider {}

    #[async_trait]
    impl Provider for Provider {
        async fn chat(&self, params: ChatParams) -> Result<ChatResponse, ProviderError>;
        fn default_model(&self) -> String;
        fn is_configured(&self) -> bool;
    }
}

fn user_prompt(params: &ChatParams) -> String {
    params.turns[0].content().unwrap_or_default().to_string()
}

#[tokio::test]
async fn test_pipeline_generates_runs_and_explains() {
    let (db, _file) = sample_database().await;
    let mut mock = MockProvider::new();
    let mut seq = Sequence::new();

    mock.expect_chat()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|params| {
            let prompt = user_prompt(params);
            params.tools.is_empty()
                && params.tool_choice == ToolChoice::None
                && prompt.contains("Table 'transactions':")
                && prompt.contains("  amount REAL")
                && prompt.contains("\"How much did I spend on food?\"")
        })
        .returning(|_| {
            Ok(ChatResponse::text(
                "```sql\nSELECT SUM(amount) AS total FROM transactions WHERE category = 'food'\n```",
            ))
        });

    mock.expect_chat()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|params| user_prompt(params).contains(r#"Results: [{"total":-86.75}]"#))
        .returning(|_| Ok(ChatResponse::text("You spent $86.75 on food.")));

    let pipeline = SqlPipeline::new(
        LlmClient::new(Arc::new(mock), "test-model"),
        db,
        ContextBuilder::new("transactions"),
    );

    let outcome = pipeline.ask("How much did I spend on food?").await.unwrap();

    assert_eq!(
        outcome.sql_query,
        "SELECT SUM(amount) AS total FROM transactions WHERE category = 'food'"
    );
    assert_eq!(outcome.columns, vec!["total"]);
    assert_eq!(outcome.row_count, 1);
    assert_eq!(outcome.data[0]["total"], json!(-86.75));
    assert_eq!(outcome.ai_response, "You spent $86.75 on food.");
}

#[tokio::test]
async fn test_pipeline_reports_bad_sql() {
    let (db, _file) = sample_database().await;
    let mut mock = MockProvider::new();
    mock.expect_chat()
        .times(1)
        .returning(|_| Ok(ChatResponse::text("SELECT * FROM nowhere")));

    let pipeline = SqlPipeline::new(
        LlmClient::new(Arc::new(mock), "test-model"),
        db,
        ContextBuilder::new("transactions"),
    );

    let err = pipeline.ask("q").await.unwrap_err();
    assert!(matches!(err, PipelineError::Database(_)));
    assert!(err.to_string().contains("no such table: nowhere"));
}

#[tokio::test]
async fn test_pipeline_reports_connection_error() {
    let (db, _file) = sample_database().await;
    let mut mock = MockProvider::new();
    mock.expect_chat()
        .times(1)
        .returning(|_| Err(ProviderError::Timeout(60)));

    let pipeline = SqlPipeline::new(
        LlmClient::new(Arc::new(mock), "test-model"),
        db,
        ContextBuilder::new("transactions"),
    );

    match pipeline.ask("q").await {
        Err(PipelineError::Llm(message)) => {
            assert_eq!(message, "Connection Error: request timed out after 60s")
        }
        other => panic!("expected Llm error, got {:?}", other.map(|o| o.sql_query)),
    }
}

#[tokio::test]
async fn test_llm_client_strips_tools_when_disabled() {
    let mut mock = MockProvider::new();
    mock.expect_chat()
        .times(1)
        .withf(|params| params.tools.is_empty() && params.tool_choice == ToolChoice::None)
        .returning(|_| {
            Ok(ChatResponse::with_tool_calls(
                Some("text".to_string()),
                vec![ToolRequest::new("call_1", "get_schema", json!({}))],
            ))
        });

    let client = LlmClient::new(Arc::new(mock), "test-model");
    let tools = vec![Tool::new("get_schema", "schema", json!({"type": "object"}))];
    let reply = client
        .complete(&[Turn::user("q")], &tools, ToolChoicePolicy::None)
        .await;

    assert!(!reply.has_tool_requests());
    assert!(!reply.transport_failed);
    assert_eq!(reply.content.as_deref(), Some("text"));
}

#[tokio::test]
async fn test_llm_client_passes_sampling_and_prompt() {
    let mut mock = MockProvider::new();
    mock.expect_chat()
        .times(1)
        .withf(|params| {
            params.model == "m"
                && params.max_tokens == 256
                && (params.temperature - 0.7).abs() < f32::EPSILON
                && params.system_prompt.as_deref() == Some("sys")
                && params.tools.len() == 1
                && params.tool_choice == ToolChoice::Auto
        })
        .returning(|_| Ok(ChatResponse::text("hi")));

    let client = LlmClient::new(Arc::new(mock), "m")
        .with_system_prompt(Some("sys".to_string()))
        .with_sampling(256, 0.7);
    let tools = vec![Tool::new("get_schema", "schema", json!({"type": "object"}))];
    let reply = client
        .complete(&[Turn::user("q")], &tools, ToolChoicePolicy::Auto)
        .await;

    assert_eq!(reply.content.as_deref(), Some("hi"));
    assert_eq!(client.model(), "m");
}

#[tokio::test]
async fn test_llm_client_error_reply_is_transport_failure() {
    let mut mock = MockProvider::new();
    mock.expect_chat()
        .times(1)
        .returning(|_| Ok(ChatResponse::error("Connection Error: reset")));

    let client = LlmClient::new(Arc::new(mock), "m");
    let reply = client.prompt("Say hello!").await;

    assert!(reply.transport_failed);
    assert_eq!(reply.content.as_deref(), Some("Connection Error: reset"));
}
