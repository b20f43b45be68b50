// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Message types for LLM interactions
//!
//! Defines the conversation messages a turn accumulates: assistant text and
//! tool-use blocks, and tool-role result messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Unique identifier for the message
    pub id: Uuid,

    /// Role of the message sender
    pub role: Role,

    /// Content of the message
    pub content: MessageContent,

    /// When the message was created
    pub timestamp: DateTime<Utc>,

    /// Dropped from the conversation when the current turn ends
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ephemeral: bool,
}

/// Role of the message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message
    User,
    /// Assistant response
    Assistant,
    /// System prompt
    System,
    /// Tool result
    Tool,
}

/// Content of a message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    /// Simple text content
    Text(String),
    /// Multiple content blocks (text, tool use, tool result)
    Blocks(Vec<ContentBlock>),
}

/// A block of content within a message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Text content
    Text { text: String },

    /// Tool use request from assistant
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Tool result
    ToolResult {
        tool_use_id: String,
        tool_name: String,
        output: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

impl Message {
    fn new(role: Role, content: MessageContent) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            timestamp: Utc::now(),
            ephemeral: false,
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, MessageContent::Text(content.into()))
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, MessageContent::Text(content.into()))
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, MessageContent::Text(content.into()))
    }

    /// Create a new assistant message with content blocks
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self::new(Role::Assistant, MessageContent::Blocks(blocks))
    }

    /// Create a tool-role result message
    pub fn tool_result(
        tool_use_id: impl Into<String>,
        tool_name: impl Into<String>,
        output: serde_json::Value,
        is_error: bool,
    ) -> Self {
        Self::new(
            Role::Tool,
            MessageContent::Blocks(vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.into(),
                tool_name: tool_name.into(),
                output,
                is_error: if is_error { Some(true) } else { None },
            }]),
        )
    }

    /// Mark the message as ephemeral (expired at the end of the turn)
    pub fn into_ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }

    /// Get the text content of the message (first text block for block content)
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(text) => Some(text),
            MessageContent::Blocks(blocks) => blocks.iter().find_map(|block| {
                if let ContentBlock::Text { text } = block {
                    Some(text.as_str())
                } else {
                    None
                }
            }),
        }
    }

    /// Get all tool use blocks from the message
    pub fn tool_uses(&self) -> Vec<&ContentBlock> {
        match &self.content {
            MessageContent::Text(_) => vec![],
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter(|block| matches!(block, ContentBlock::ToolUse { .. }))
                .collect(),
        }
    }

    /// The tool_use_id this message answers, if it is a tool result
    pub fn answered_tool_use_id(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Blocks(blocks) => blocks.iter().find_map(|block| {
                if let ContentBlock::ToolResult { tool_use_id, .. } = block {
                    Some(tool_use_id.as_str())
                } else {
                    None
                }
            }),
            MessageContent::Text(_) => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::user("hi").role, Role::User);
        assert_eq!(Message::assistant("hi").role, Role::Assistant);
        assert_eq!(Message::system("hi").role, Role::System);
        assert_eq!(Message::user("hi").text(), Some("hi"));
        assert!(!Message::user("hi").ephemeral);
    }

    #[test]
    fn test_tool_result_message() {
        let msg = Message::tool_result(
            "call_1",
            "add_subgoal",
            serde_json::json!({"ok": true}),
            false,
        );
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.answered_tool_use_id(), Some("call_1"));
        match &msg.content {
            MessageContent::Blocks(blocks) => match &blocks[0] {
                ContentBlock::ToolResult { is_error, .. } => assert_eq!(*is_error, None),
                other => panic!("unexpected block: {:?}", other),
            },
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn test_tool_result_error_flag() {
        let msg = Message::tool_result("call_1", "x", serde_json::json!("boom"), true);
        match &msg.content {
            MessageContent::Blocks(blocks) => match &blocks[0] {
                ContentBlock::ToolResult { is_error, .. } => assert_eq!(*is_error, Some(true)),
                other => panic!("unexpected block: {:?}", other),
            },
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn test_assistant_blocks_tool_uses() {
        let msg = Message::assistant_blocks(vec![
            ContentBlock::Text {
                text: "Reading".to_string(),
            },
            ContentBlock::ToolUse {
                id: "call_1".to_string(),
                name: "read_files".to_string(),
                input: serde_json::json!({"paths": ["a.rs"]}),
            },
        ]);
        assert_eq!(msg.text(), Some("Reading"));
        assert_eq!(msg.tool_uses().len(), 1);
        assert_eq!(msg.answered_tool_use_id(), None);
    }

    #[test]
    fn test_ephemeral_flag_serialization() {
        let msg = Message::system("reminder").into_ephemeral();
        assert!(msg.ephemeral);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["ephemeral"], true);

        let durable = serde_json::to_value(Message::system("keep")).unwrap();
        assert!(durable.get("ephemeral").is_none());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Tool.to_string(), "tool");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }
}
