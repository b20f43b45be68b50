// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool processors
//!
//! A processor executes one kind of tool call against the turn state. The
//! [`registry`] maps tool names to processors; [`builtin`] holds the state
//! tools every agent can use.

pub mod builtin;
pub mod registry;

pub use registry::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::abort::AbortSignal;
use crate::chat::state::TurnState;
use crate::error::Result;

/// A tool invocation extracted from the model stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier tool results refer back to
    pub id: String,
    /// Tool name
    pub name: String,
    /// Tool input, without the reserved name key
    pub input: Value,
    /// Payload text the call was parsed from (empty for native calls)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw: String,
    /// The payload was closed by end-of-stream salvage
    #[serde(default)]
    pub autocompleted: bool,
    /// The call arrived as a structured provider chunk
    #[serde(default)]
    pub native: bool,
}

impl ToolCall {
    /// Create a call with a fresh id
    pub fn new(name: impl Into<String>, input: Value) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            input,
            raw: String::new(),
            autocompleted: false,
            native: false,
        }
    }

    /// Create a call from a structured provider chunk
    pub fn native(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            native: true,
            ..Self::new(name, input)
        }
    }
}

/// Successful processor return value
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub output: Value,
    /// Credits consumed by the execution
    pub credits: u64,
}

impl ToolOutcome {
    pub fn new(output: Value) -> Self {
        Self { output, credits: 0 }
    }

    pub fn with_credits(mut self, credits: u64) -> Self {
        self.credits = credits;
        self
    }
}

/// Output of a finished tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum ToolOutput {
    Success(Value),
    Error(String),
}

/// Result of tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The tool call this result answers
    pub tool_use_id: String,
    pub tool_name: String,
    pub output: ToolOutput,
    #[serde(default)]
    pub credits: u64,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(call: &ToolCall, outcome: ToolOutcome) -> Self {
        Self {
            tool_use_id: call.id.clone(),
            tool_name: call.name.clone(),
            output: ToolOutput::Success(outcome.output),
            credits: outcome.credits,
        }
    }

    /// Create an error result
    pub fn error(call: &ToolCall, error: impl Into<String>) -> Self {
        Self {
            tool_use_id: call.id.clone(),
            tool_name: call.name.clone(),
            output: ToolOutput::Error(error.into()),
            credits: 0,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.output, ToolOutput::Error(_))
    }

    /// Output as a JSON value (errors become strings)
    pub fn output_value(&self) -> Value {
        match &self.output {
            ToolOutput::Success(value) => value.clone(),
            ToolOutput::Error(message) => Value::String(message.clone()),
        }
    }
}

/// What a processor is, as seen by the registry
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessorKind {
    /// Shipped with the crate
    BuiltIn(String),
    /// Declared by the session, executed by a [`CustomToolHandler`]
    Custom { name: String, schema: Value },
    /// Nothing is registered under this name
    Unknown(String),
}

impl ProcessorKind {
    pub fn name(&self) -> &str {
        match self {
            ProcessorKind::BuiltIn(name)
            | ProcessorKind::Custom { name, .. }
            | ProcessorKind::Unknown(name) => name,
        }
    }
}

/// What a processor may touch while it runs
pub struct ExecutionContext<'a> {
    pub state: &'a mut TurnState,
    pub abort: AbortSignal,
}

/// Executes one kind of tool call
#[async_trait]
pub trait Processor: Send + Sync {
    fn kind(&self) -> ProcessorKind;

    /// Called when the call is dispatched, before it is queued
    fn on_start(&self, _call: &ToolCall) {}

    /// Execute the call. Runs on the turn's execution lane.
    async fn on_end(&self, call: &ToolCall, ctx: &mut ExecutionContext<'_>)
        -> Result<ToolOutcome>;
}

/// A session-declared tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
}

impl CustomToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: serde_json::json!({"type": "object"}),
        }
    }
}

/// Executes session-declared tools
#[async_trait]
pub trait CustomToolHandler: Send + Sync {
    async fn handle(
        &self,
        definition: &CustomToolDefinition,
        call: &ToolCall,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ToolOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_call_ids() {
        let a = ToolCall::new("x", json!({}));
        let b = ToolCall::new("x", json!({}));
        assert!(a.id.starts_with("call_"));
        assert_ne!(a.id, b.id);
        assert!(!a.native);

        let native = ToolCall::native("toolu_1", "y", json!({"k": 1}));
        assert_eq!(native.id, "toolu_1");
        assert!(native.native);
    }

    #[test]
    fn test_tool_result_success_and_error() {
        let call = ToolCall::new("x", json!({}));
        let ok = ToolResult::success(&call, ToolOutcome::new(json!({"n": 1})).with_credits(2));
        assert!(!ok.is_error());
        assert_eq!(ok.tool_use_id, call.id);
        assert_eq!(ok.credits, 2);
        assert_eq!(ok.output_value(), json!({"n": 1}));

        let err = ToolResult::error(&call, "boom");
        assert!(err.is_error());
        assert_eq!(err.output_value(), json!("boom"));
    }

    #[test]
    fn test_tool_output_serialization() {
        let json = serde_json::to_value(ToolOutput::Error("bad".to_string())).unwrap();
        assert_eq!(json, json!({"status": "error", "value": "bad"}));
    }

    #[test]
    fn test_tool_call_skips_empty_raw() {
        let json = serde_json::to_value(ToolCall::native("id", "x", json!({}))).unwrap();
        assert!(json.get("raw").is_none());
        assert_eq!(json["native"], true);
    }

    #[test]
    fn test_processor_kind_name() {
        assert_eq!(ProcessorKind::BuiltIn("end_turn".into()).name(), "end_turn");
        assert_eq!(
            ProcessorKind::Custom {
                name: "deploy".into(),
                schema: json!({})
            }
            .name(),
            "deploy"
        );
        assert_eq!(ProcessorKind::Unknown("nope".into()).name(), "nope");
    }
}
