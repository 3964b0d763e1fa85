use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use tabletalk_agent::StopReason;
use tabletalk_database::analytics;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub sql: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: String,
}

fn require_question(payload: Result<Json<AskRequest>, JsonRejection>) -> ApiResult<String> {
    let Json(request) = payload?;
    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("No question provided".to_string()));
    }
    Ok(question.to_string())
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "tabletalk" }))
}

pub async fn query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = payload?;
    let sql = request.sql.trim();
    if sql.is_empty() {
        return Err(ApiError::BadRequest("No SQL query provided".to_string()));
    }

    let rows = state.db.execute(sql).await?;
    let data = rows.records();

    Ok(Json(json!({
        "success": true,
        "data": data,
        "columns": rows.columns,
        "row_count": data.len(),
    })))
}

pub async fn ask(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let question = require_question(payload)?;
    let outcome = state.pipeline.ask(&question).await?;

    Ok(Json(json!({
        "success": true,
        "question": outcome.question,
        "sql_query": outcome.sql_query,
        "columns": outcome.columns,
        "data": outcome.data,
        "ai_response": outcome.ai_response,
        "row_count": outcome.row_count,
    })))
}

pub async fn ask_with_tools(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let question = require_question(payload)?;
    let outcome = state.agent.answer_question(&question).await;
    info!(
        "run {} finished: {} in {} rounds",
        outcome.run_id,
        outcome.stop_reason.as_str(),
        outcome.rounds_used
    );

    Ok(Json(json!({
        "success": outcome.stop_reason != StopReason::TransportFailed,
        "question": question,
        "llm_response": outcome.answer_text().unwrap_or_default(),
        "rounds_used": outcome.rounds_used,
        "stop_reason": outcome.stop_reason,
        "conversation": outcome.conversation,
    })))
}

pub async fn test_llm(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let reply = state.llm.prompt("Say hello!").await;
    let text = reply.content.unwrap_or_default();
    if reply.transport_failed {
        return Err(ApiError::Llm(text));
    }

    Ok(Json(json!({ "success": true, "llm_response": text })))
}

pub async fn summary(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let summary = analytics::summary(state.db.as_ref(), &state.table_name).await?;
    Ok(Json(json!({ "success": true, "summary": summary })))
}

pub async fn categories(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let rows = analytics::categories(state.db.as_ref(), &state.table_name).await?;
    Ok(Json(json!({ "success": true, "categories": rows.records() })))
}
