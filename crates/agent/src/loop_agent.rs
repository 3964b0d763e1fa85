//! Agent loop - tool-calling orchestration
//!
//! Drives one question through bounded rounds of model call followed by
//! tool execution until the model answers without requesting tools.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tabletalk_config::{Config, ToolChoicePolicy};
use tabletalk_provider::{Provider, ToolRequest, Turn};

use crate::context::ContextBuilder;
use crate::conversation::{self, Conversation};
use crate::executor::ToolExecutor;
use crate::llm::LlmClient;
use crate::tools::ToolRegistry;

/// Loop parameters
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model: String,
    pub max_rounds: u32,
    pub tool_choice: ToolChoicePolicy,
    pub tool_timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Fixed system prompt; when unset one is built for `table_name` on every run
    pub system_prompt: Option<String>,
    pub table_name: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4.1".to_string(),
            max_rounds: 5,
            tool_choice: ToolChoicePolicy::Auto,
            tool_timeout: Duration::from_secs(30),
            max_tokens: 4096,
            temperature: 0.2,
            system_prompt: None,
            table_name: "transactions".to_string(),
        }
    }
}

impl AgentConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.provider.model.clone(),
            max_rounds: config.orchestration.max_rounds,
            tool_choice: config.orchestration.tool_choice,
            tool_timeout: Duration::from_secs(config.orchestration.tool_timeout_secs),
            max_tokens: config.provider.max_tokens,
            temperature: config.provider.temperature,
            system_prompt: config.orchestration.system_prompt.clone(),
            table_name: config.database.table_name.clone(),
        }
    }
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model answered without requesting tools
    Completed,
    BudgetExhausted,
    /// The model call failed; the final text describes the failure
    TransportFailed,
    Cancelled,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Completed => "completed",
            StopReason::BudgetExhausted => "budget_exhausted",
            StopReason::TransportFailed => "transport_failed",
            StopReason::Cancelled => "cancelled",
        }
    }
}

/// Result of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: String,
    /// None when the run stopped before the model gave a final answer
    pub final_text: Option<String>,
    pub conversation: Vec<Turn>,
    pub rounds_used: u32,
    pub stop_reason: StopReason,
}

impl RunOutcome {
    /// Last non-empty assistant text in the trace
    pub fn partial_answer(&self) -> Option<&str> {
        conversation::last_assistant_text(&self.conversation)
    }

    /// Final text, falling back to the partial answer
    pub fn answer_text(&self) -> Option<&str> {
        self.final_text.as_deref().or_else(|| self.partial_answer())
    }
}

/// Loop states
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    AwaitingModel,
    AwaitingToolExecution(Vec<ToolRequest>),
    Done(StopReason, Option<String>),
}

/// The agent loop answers questions with tool calling
pub struct AgentLoop {
    llm: LlmClient,
    context: ContextBuilder,
    system_prompt: Option<String>,
    registry: Arc<ToolRegistry>,
    executor: ToolExecutor,
    max_rounds: u32,
    tool_choice: ToolChoicePolicy,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn Provider>, registry: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        let llm = LlmClient::new(provider, config.model)
            .with_sampling(config.max_tokens, config.temperature);
        let executor = ToolExecutor::new(Arc::clone(&registry), config.tool_timeout);

        Self {
            llm,
            context: ContextBuilder::new(config.table_name),
            system_prompt: config.system_prompt,
            registry,
            executor,
            max_rounds: config.max_rounds,
            tool_choice: config.tool_choice,
        }
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn answer_question(&self, question: &str) -> RunOutcome {
        self.answer_question_with_cancel(question, &CancellationToken::new())
            .await
    }

    /// Run the loop; `cancel` is checked before every model call
    pub async fn answer_question_with_cancel(
        &self,
        question: &str,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let run_id = Uuid::new_v4().to_string();
        info!("run {}: answering question", run_id);
        debug!("run {}: question: {}", run_id, question);

        // the default prompt carries today's date, so build it per run
        let system_prompt = self
            .system_prompt
            .clone()
            .unwrap_or_else(|| self.context.system_prompt());
        let tools = self.registry.definitions();
        let mut conversation = Conversation::new(question);
        let mut rounds_used = 0u32;
        let mut state = LoopState::AwaitingModel;

        let (stop_reason, final_text) = loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if cancel.is_cancelled() {
                        info!("run {}: cancelled after {} rounds", run_id, rounds_used);
                        LoopState::Done(StopReason::Cancelled, None)
                    } else if rounds_used >= self.max_rounds {
                        warn!("run {}: round budget of {} exhausted", run_id, self.max_rounds);
                        LoopState::Done(StopReason::BudgetExhausted, None)
                    } else {
                        rounds_used += 1;
                        debug!("run {}: round {}/{}", run_id, rounds_used, self.max_rounds);

                        let reply = self
                            .llm
                            .complete_with_system(
                                Some(&system_prompt),
                                conversation.turns(),
                                &tools,
                                self.tool_choice,
                            )
                            .await;
                        conversation.push_assistant(reply.content.clone(), reply.tool_requests.clone());

                        if reply.transport_failed {
                            LoopState::Done(StopReason::TransportFailed, reply.content)
                        } else if reply.tool_requests.is_empty() {
                            LoopState::Done(StopReason::Completed, Some(reply.content.unwrap_or_default()))
                        } else {
                            LoopState::AwaitingToolExecution(reply.tool_requests)
                        }
                    }
                }
                LoopState::AwaitingToolExecution(requests) => {
                    for request in &requests {
                        debug!("run {}: executing {} ({})", run_id, request.name, request.id);
                        let turn = self.executor.execute(request).await;
                        if let Err(e) = conversation.push_tool_result(turn) {
                            warn!("run {}: dropping tool result: {}", run_id, e);
                        }
                    }

                    if rounds_used >= self.max_rounds {
                        warn!("run {}: round budget of {} exhausted", run_id, self.max_rounds);
                        LoopState::Done(StopReason::BudgetExhausted, None)
                    } else {
                        LoopState::AwaitingModel
                    }
                }
                LoopState::Done(reason, text) => break (reason, text),
            };
        };

        info!(
            "run {}: finished ({}) after {} rounds",
            run_id,
            stop_reason.as_str(),
            rounds_used
        );

        RunOutcome {
            run_id,
            final_text,
            conversation: conversation.into_turns(),
            rounds_used,
            stop_reason,
        }
    }
}
