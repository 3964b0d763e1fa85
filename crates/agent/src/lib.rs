//! Tool-calling orchestration over tabular data
//!
//! The [`AgentLoop`] drives a conversation between the model and the
//! SQL tools in [`tools`]; [`SqlPipeline`] is the single-shot variant.

pub mod context;
pub mod conversation;
pub mod executor;
pub mod llm;
pub mod loop_agent;
pub mod pipeline;
pub mod tools;

pub use context::ContextBuilder;
pub use conversation::{Conversation, ConversationError};
pub use executor::{validate_arguments, ToolExecutor};
pub use llm::{AssistantReply, LlmClient};
pub use loop_agent::{AgentConfig, AgentLoop, LoopState, RunOutcome, StopReason};
pub use pipeline::{extract_sql, AskOutcome, PipelineError, SqlPipeline};
pub use tools::{register_default_tools, ToolError, ToolRegistry, ToolTrait};

pub use tabletalk_config::ToolChoicePolicy;
