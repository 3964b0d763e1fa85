//! Append-only conversation state for one orchestration run

use serde::Serialize;
use thiserror::Error;

use tabletalk_provider::{ToolRequest, Turn};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConversationError {
    #[error("tool result {0} does not answer a pending request")]
    UnmatchedResult(String),

    #[error("expected a tool result turn")]
    NotAToolResult,
}

/// Ordered turns, seeded with the user's question.
///
/// Tool results are only accepted for requests of the most recent
/// assistant turn that have not been answered yet.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    turns: Vec<Turn>,
    #[serde(skip)]
    pending: Vec<String>,
}

impl Conversation {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::user(question)],
            pending: Vec::new(),
        }
    }

    /// Append an assistant turn; its requests become the pending set
    pub fn push_assistant(&mut self, content: Option<String>, tool_requests: Vec<ToolRequest>) {
        self.pending = tool_requests.iter().map(|r| r.id.clone()).collect();
        self.turns.push(Turn::assistant(content, tool_requests));
    }

    /// Append a tool result turn answering a pending request
    pub fn push_tool_result(&mut self, turn: Turn) -> Result<(), ConversationError> {
        let id = turn
            .tool_call_id()
            .ok_or(ConversationError::NotAToolResult)?;

        let pos = self
            .pending
            .iter()
            .position(|p| p == id)
            .ok_or_else(|| ConversationError::UnmatchedResult(id.to_string()))?;

        self.pending.remove(pos);
        self.turns.push(turn);
        Ok(())
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Always false; a conversation starts with the user turn
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Requests of the last assistant turn still awaiting a result
    pub fn pending_requests(&self) -> &[String] {
        &self.pending
    }

    /// Last non-empty assistant text
    pub fn last_assistant_text(&self) -> Option<&str> {
        last_assistant_text(&self.turns)
    }
}

pub(crate) fn last_assistant_text(turns: &[Turn]) -> Option<&str> {
    turns
        .iter()
        .rev()
        .filter(|t| matches!(t, Turn::Assistant { .. }))
        .filter_map(|t| t.content())
        .find(|c| !c.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tabletalk_provider::{Role, ToolResult};

    fn request(id: &str) -> ToolRequest {
        ToolRequest::new(id, "get_schema", json!({}))
    }

    #[test]
    fn test_new_seeds_user_turn() {
        let conversation = Conversation::new("What tables are available?");
        assert_eq!(conversation.len(), 1);
        assert!(!conversation.is_empty());
        assert_eq!(conversation.turns()[0].role(), Role::User);
    }

    #[test]
    fn test_results_must_match_pending_requests() {
        let mut conversation = Conversation::new("q");
        conversation.push_assistant(None, vec![request("a"), request("b")]);
        assert_eq!(conversation.pending_requests(), ["a", "b"]);

        conversation
            .push_tool_result(Turn::tool_result("b", "get_schema", ToolResult::success(json!({}))))
            .unwrap();
        assert_eq!(conversation.pending_requests(), ["a"]);

        let err = conversation
            .push_tool_result(Turn::tool_result("b", "get_schema", ToolResult::success(json!({}))))
            .unwrap_err();
        assert_eq!(err, ConversationError::UnmatchedResult("b".to_string()));
        assert_eq!(conversation.len(), 3);
    }

    #[test]
    fn test_result_without_request_is_rejected() {
        let mut conversation = Conversation::new("q");
        let err = conversation
            .push_tool_result(Turn::tool_result("x", "run_query", ToolResult::failure("nope")))
            .unwrap_err();
        assert!(matches!(err, ConversationError::UnmatchedResult(_)));
        assert_eq!(conversation.len(), 1);
    }

    #[test]
    fn test_new_assistant_turn_replaces_pending() {
        let mut conversation = Conversation::new("q");
        conversation.push_assistant(None, vec![request("old")]);
        conversation.push_assistant(Some("moving on".into()), vec![]);

        assert!(conversation.pending_requests().is_empty());
        assert!(conversation
            .push_tool_result(Turn::tool_result("old", "get_schema", ToolResult::success(json!(1))))
            .is_err());
    }

    #[test]
    fn test_only_tool_results_accepted() {
        let mut conversation = Conversation::new("q");
        assert_eq!(
            conversation.push_tool_result(Turn::user("again")),
            Err(ConversationError::NotAToolResult)
        );
    }

    #[test]
    fn test_last_assistant_text_skips_empty() {
        let mut conversation = Conversation::new("q");
        assert_eq!(conversation.last_assistant_text(), None);

        conversation.push_assistant(Some("Let me check the schema.".into()), vec![request("a")]);
        conversation
            .push_tool_result(Turn::tool_result("a", "get_schema", ToolResult::success(json!({}))))
            .unwrap();
        conversation.push_assistant(Some("  ".into()), vec![request("b")]);

        assert_eq!(
            conversation.last_assistant_text(),
            Some("Let me check the schema.")
        );
    }
}
