// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Replay command: run a transcript as a full turn

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;

use super::{compact, read_transcript};
use crate::chat::cost::MemoryCostReporter;
use crate::chat::engine::{TurnEvent, TurnOutcome, TurnPipeline};
use crate::chat::state::TurnState;
use crate::cli::args::{OutputFormat, ReplayArgs};
use crate::config::Settings;
use crate::error::Result;
use crate::llm::mock_provider::{MockProvider, MockResponse};
use crate::llm::provider::{ChunkProvider, GenerationRequest};
use crate::telemetry::{MemoryTelemetry, TelemetryEvent};
use crate::tools::{
    ExecutionContext, Processor, ProcessorKind, ProcessorRegistry, ToolCall, ToolOutcome,
    ToolOutput,
};

/// Turn summary printed after the events
#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    pub outcome: TurnOutcome,
    pub tool_calls: usize,
    pub tool_errors: usize,
    pub parse_errors: usize,
    pub unknown_tools: usize,
    pub autocompleted: usize,
    pub credits: u64,
    pub subgoals: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    pub end_turn_requested: bool,
}

/// Answers any tool by echoing its input
struct EchoProcessor {
    name: String,
}

#[async_trait]
impl Processor for EchoProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Custom {
            name: self.name.clone(),
            schema: json!({"type": "object"}),
        }
    }

    async fn on_end(
        &self,
        call: &ToolCall,
        _ctx: &mut ExecutionContext<'_>,
    ) -> Result<ToolOutcome> {
        Ok(ToolOutcome::new(json!({ "echo": call.input })))
    }
}

fn registry(echo_unknown: bool) -> ProcessorRegistry {
    let registry = ProcessorRegistry::with_builtins();
    if echo_unknown {
        registry.with_fallback(Arc::new(|name: &str| -> Arc<dyn Processor> {
            Arc::new(EchoProcessor {
                name: name.to_string(),
            })
        }))
    } else {
        registry
    }
}

/// Execute the replay command
pub async fn execute<W: Write>(
    args: &ReplayArgs,
    settings: &Settings,
    format: OutputFormat,
    out: &mut W,
) -> Result<ReplaySummary> {
    let transcript = read_transcript(&args.file)?;
    let provider = MockProvider::with_name("replay")
        .with_mock_responses(vec![MockResponse::text(transcript).with_chunk_size(args.chunk_size)]);

    let state = TurnState::new("replay");
    let chunks = provider
        .stream(GenerationRequest::new(
            "replay",
            state.messages.clone(),
            state.run_id.clone(),
        ))
        .await?;

    let telemetry = Arc::new(MemoryTelemetry::new());
    let cost = Arc::new(MemoryCostReporter::new());
    let pipeline = TurnPipeline::new(registry(args.echo_unknown))
        .with_settings(settings)
        .with_telemetry(telemetry.clone())
        .with_cost_reporter(cost.clone());

    let mut handle = pipeline.spawn(chunks, state);
    while let Some(event) = handle.events.next().await {
        match format {
            OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(&event)?)?,
            OutputFormat::Text => writeln!(out, "{}", event_line(&event))?,
        }
    }
    let result = handle.wait().await?;

    let summary = ReplaySummary {
        outcome: result.outcome,
        tool_calls: result.invocations.len(),
        tool_errors: result.results.iter().filter(|r| r.is_error()).count(),
        parse_errors: telemetry.count(TelemetryEvent::ToolCallMalformed),
        unknown_tools: telemetry.count(TelemetryEvent::ToolCallUnknown),
        autocompleted: result.stats.autocompleted,
        credits: cost.total(),
        subgoals: result.state.subgoals.len(),
        output: result.state.agent_state.output.clone(),
        end_turn_requested: result.state.agent_state.end_turn_requested,
    };

    match format {
        OutputFormat::Json => {
            let mut line = serde_json::to_value(&summary)?;
            line["type"] = json!("summary");
            writeln!(out, "{}", line)?;
        }
        OutputFormat::Text => {
            writeln!(out, "\n=== Replay Summary ===")?;
            writeln!(out, "Outcome: {:?}", summary.outcome)?;
            writeln!(
                out,
                "Tool calls: {} ({} failed)",
                summary.tool_calls, summary.tool_errors
            )?;
            writeln!(
                out,
                "Rejected: {} malformed, {} unknown",
                summary.parse_errors, summary.unknown_tools
            )?;
            if summary.autocompleted > 0 {
                writeln!(out, "Autocompleted: {}", summary.autocompleted)?;
            }
            writeln!(out, "Subgoals: {}", summary.subgoals)?;
            if let Some(output) = &summary.output {
                writeln!(out, "Output: {}", compact(output))?;
            }
        }
    }

    Ok(summary)
}

fn event_line(event: &TurnEvent) -> String {
    match event {
        TurnEvent::Text { text } => format!("[text] {:?}", text),
        TurnEvent::ReasoningDelta { text } => format!("[reasoning] {:?}", text),
        TurnEvent::ToolCall { call } => {
            format!("[tool_call] {} {}", call.name, compact(&call.input))
        }
        TurnEvent::ToolResult { result } => match &result.output {
            ToolOutput::Success(value) => {
                format!("[tool_result] {} ok {}", result.tool_name, compact(value))
            }
            ToolOutput::Error(message) => {
                format!("[tool_result] {} error {}", result.tool_name, message)
            }
        },
        TurnEvent::Error { error } => format!("[{}] {}", error.kind(), error),
    }
}
