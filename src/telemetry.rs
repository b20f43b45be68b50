// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Telemetry sink for tool-call parsing outcomes
//!
//! Malformed tool calls are the most common way a model misbehaves, so every
//! parse outcome is reported here with enough context (raw payload, parsed
//! input, autocompletion flag) to query it later.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;

/// Kinds of telemetry events emitted by the demultiplexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryEvent {
    /// A tool call was extracted and parsed
    ToolCallParsed,
    /// A tool call payload was not valid JSON
    ToolCallMalformed,
    /// A tool call payload did not name a tool
    ToolCallUnknown,
}

impl TelemetryEvent {
    /// Stable event name
    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetryEvent::ToolCallParsed => "tool_call_parsed",
            TelemetryEvent::ToolCallMalformed => "tool_call_malformed",
            TelemetryEvent::ToolCallUnknown => "tool_call_unknown",
        }
    }

    /// Whether the event describes a model failure
    pub fn is_failure(&self) -> bool {
        !matches!(self, TelemetryEvent::ToolCallParsed)
    }
}

impl std::fmt::Display for TelemetryEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination for telemetry events
pub trait TelemetrySink: Send + Sync {
    /// Report an event with its properties
    fn report(&self, event: TelemetryEvent, properties: Value);
}

/// Sink that writes events to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn report(&self, event: TelemetryEvent, properties: Value) {
        let tool_name = properties
            .get("tool_name")
            .and_then(Value::as_str)
            .unwrap_or("");
        let autocompleted = properties
            .get("autocompleted")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if event.is_failure() {
            tracing::warn!(
                target: "toolstream.telemetry",
                event = %event,
                tool_name,
                autocompleted,
                properties = %properties,
                "tool call rejected"
            );
        } else {
            tracing::debug!(
                target: "toolstream.telemetry",
                event = %event,
                tool_name,
                autocompleted,
                "tool call parsed"
            );
        }
    }
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct MemoryTelemetry {
    events: Mutex<Vec<(TelemetryEvent, Value)>>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, in report order
    pub fn events(&self) -> Vec<(TelemetryEvent, Value)> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of recorded events of a given kind
    pub fn count(&self, event: TelemetryEvent) -> usize {
        self.events().iter().filter(|(e, _)| *e == event).count()
    }
}

impl TelemetrySink for MemoryTelemetry {
    fn report(&self, event: TelemetryEvent, properties: Value) {
        match self.events.lock() {
            Ok(mut guard) => guard.push((event, properties)),
            Err(poisoned) => poisoned.into_inner().push((event, properties)),
        }
    }
}
