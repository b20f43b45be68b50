// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tag-delimited demultiplexer
//!
//! Turns provider chunks into a normalized event sequence: prose, reasoning,
//! parsed tool calls, typed invocation errors and the finish marker. Every
//! parse outcome is reported to telemetry before its event is handed out.

use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;

use super::parser::{self, InvocationError, ParsedInvocation};
use super::scanner::{DelimiterScanner, Segment};
use crate::config::ProtocolConfig;
use crate::error::Result;
use crate::llm::provider::{Chunk, ChunkStream};
use crate::telemetry::{TelemetryEvent, TelemetrySink};
use crate::tools::ToolCall;

/// Normalized stream event
#[derive(Debug, Clone, PartialEq)]
pub enum DemuxEvent {
    /// Prose outside any tool call
    Text(String),
    /// Reasoning text, passed through untouched
    Reasoning(String),
    /// A parsed tool call, ready for dispatch
    ToolCall(ToolCall),
    /// A tool call that could not be parsed
    Error(InvocationError),
    /// The provider finished the message
    Finish { message_id: String },
}

/// Counters for one demultiplexed stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemuxStats {
    pub text_events: usize,
    pub text_chars: usize,
    pub reasoning_chars: usize,
    pub tool_calls: usize,
    pub parse_errors: usize,
    pub unknown_tools: usize,
    pub autocompleted: usize,
}

/// Per-stream demultiplexer; owns the stream's only buffer
pub struct Demultiplexer {
    scanner: DelimiterScanner,
    protocol: ProtocolConfig,
    telemetry: Arc<dyn TelemetrySink>,
    stats: DemuxStats,
    finished: bool,
}

impl Demultiplexer {
    pub fn new(protocol: ProtocolConfig, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            scanner: DelimiterScanner::new(protocol.start_tag.clone(), protocol.end_tag.clone()),
            protocol,
            telemetry,
            stats: DemuxStats::default(),
            finished: false,
        }
    }

    pub fn stats(&self) -> &DemuxStats {
        &self.stats
    }

    /// Whether end of stream has been processed
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one provider chunk
    pub fn push_chunk(&mut self, chunk: Chunk) -> Vec<DemuxEvent> {
        if self.finished {
            tracing::debug!(
                target: "toolstream.stream.demux",
                "ignoring chunk after finish"
            );
            return Vec::new();
        }

        match chunk {
            Chunk::Text { text } => {
                let segments = self.scanner.push(&text);
                self.segments_to_events(segments)
            }
            Chunk::Reasoning { text } => {
                self.stats.reasoning_chars += text.chars().count();
                vec![DemuxEvent::Reasoning(text)]
            }
            Chunk::ToolCall { id, name, input } => {
                let mut events: Vec<DemuxEvent> = Vec::new();
                if let Some(prose) = self.scanner.flush_prose() {
                    events.extend(self.segments_to_events(vec![prose]));
                }
                events.push(self.native_call(id, name, input));
                events
            }
            Chunk::Finish { message_id } => {
                let mut events = self.finish();
                events.push(DemuxEvent::Finish { message_id });
                events
            }
        }
    }

    /// End of stream: release held-back prose and salvage an open tool call.
    ///
    /// Only the first call does anything.
    pub fn finish(&mut self) -> Vec<DemuxEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let events = match self.scanner.finish() {
            Some(segment) => self.segments_to_events(vec![segment]),
            None => Vec::new(),
        };

        tracing::debug!(
            target: "toolstream.stream.demux",
            tool_calls = self.stats.tool_calls,
            parse_errors = self.stats.parse_errors,
            unknown_tools = self.stats.unknown_tools,
            autocompleted = self.stats.autocompleted,
            "stream finished"
        );
        events
    }

    fn segments_to_events(&mut self, segments: Vec<Segment>) -> Vec<DemuxEvent> {
        segments
            .into_iter()
            .map(|segment| match segment {
                Segment::Prose(text) => {
                    self.stats.text_events += 1;
                    self.stats.text_chars += text.chars().count();
                    DemuxEvent::Text(text)
                }
                Segment::Span(raw) => {
                    let parsed = parser::parse_invocation(
                        &raw,
                        &self.protocol.tool_name_key,
                        false,
                        self.protocol.preview_chars,
                    );
                    self.invocation_event(parsed, &raw, false)
                }
                Segment::Unterminated(raw) => self.unterminated(raw),
            })
            .collect()
    }

    fn unterminated(&mut self, raw: String) -> DemuxEvent {
        tracing::debug!(
            target: "toolstream.stream.demux",
            bytes = raw.len(),
            salvage = self.protocol.salvage_truncated,
            "stream ended inside a tool call"
        );

        let parsed = if self.protocol.salvage_truncated {
            parser::parse_truncated(
                &raw,
                &self.protocol.tool_name_key,
                self.protocol.preview_chars,
            )
        } else {
            Err(InvocationError::ParseError {
                preview: parser::preview(&raw, self.protocol.preview_chars),
                message: "stream ended inside a tool call".to_string(),
                autocompleted: false,
            })
        };
        self.invocation_event(parsed, &raw, false)
    }

    fn native_call(&mut self, id: String, name: String, input: Value) -> DemuxEvent {
        let raw = json!({ "id": id, "name": name, "input": input }).to_string();
        let parsed = if name.trim().is_empty() {
            Err(InvocationError::UnknownTool {
                reason: "native tool call has no name".to_string(),
                raw: raw.clone(),
                autocompleted: false,
            })
        } else {
            Ok(ParsedInvocation {
                name,
                input,
                raw: String::new(),
                autocompleted: false,
            })
        };

        match self.invocation_event(parsed, &raw, true) {
            DemuxEvent::ToolCall(mut call) => {
                call.id = id;
                DemuxEvent::ToolCall(call)
            }
            other => other,
        }
    }

    fn invocation_event(
        &mut self,
        parsed: std::result::Result<ParsedInvocation, InvocationError>,
        raw: &str,
        native: bool,
    ) -> DemuxEvent {
        match parsed {
            Ok(invocation) => {
                self.stats.tool_calls += 1;
                if invocation.autocompleted {
                    self.stats.autocompleted += 1;
                }
                self.telemetry.report(
                    TelemetryEvent::ToolCallParsed,
                    json!({
                        "tool_name": invocation.name,
                        "raw": raw,
                        "input": invocation.input,
                        "autocompleted": invocation.autocompleted,
                        "native": native,
                    }),
                );

                let mut call = ToolCall::new(invocation.name, invocation.input);
                call.raw = invocation.raw;
                call.autocompleted = invocation.autocompleted;
                call.native = native;
                DemuxEvent::ToolCall(call)
            }
            Err(error) => {
                let event = match error {
                    InvocationError::ParseError { .. } => {
                        self.stats.parse_errors += 1;
                        TelemetryEvent::ToolCallMalformed
                    }
                    InvocationError::UnknownTool { .. } => {
                        self.stats.unknown_tools += 1;
                        TelemetryEvent::ToolCallUnknown
                    }
                };
                self.telemetry.report(
                    event,
                    json!({
                        "tool_name": Value::Null,
                        "raw": raw,
                        "autocompleted": error.autocompleted(),
                        "native": native,
                        "kind": error.kind(),
                        "error": error.to_string(),
                    }),
                );
                DemuxEvent::Error(error)
            }
        }
    }
}

/// Demultiplex a chunk stream.
///
/// A provider error is yielded and ends the stream. Exhaustion without a
/// finish chunk still runs end-of-stream processing.
pub fn demultiplex(
    mut chunks: ChunkStream,
    mut demux: Demultiplexer,
) -> impl Stream<Item = Result<DemuxEvent>> + Send {
    async_stream::stream! {
        while let Some(item) = chunks.next().await {
            match item {
                Ok(chunk) => {
                    for event in demux.push_chunk(chunk) {
                        yield Ok(event);
                    }
                    if demux.is_finished() {
                        return;
                    }
                }
                Err(err) => {
                    yield Err(err);
                    return;
                }
            }
        }
        for event in demux.finish() {
            yield Ok(event);
        }
    }
}
