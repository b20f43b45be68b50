// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Scan command: demultiplex a transcript and print the events

use futures::StreamExt;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;

use super::{compact, read_transcript, transcript_chunks};
use crate::cli::args::{OutputFormat, ScanArgs};
use crate::config::Settings;
use crate::error::Result;
use crate::llm::mock_provider::chunk_stream;
use crate::stream::{demultiplex, DemuxEvent, Demultiplexer};
use crate::telemetry::TracingTelemetry;

/// Execute the scan command
pub async fn execute<W: Write>(
    args: &ScanArgs,
    settings: &Settings,
    format: OutputFormat,
    out: &mut W,
) -> Result<()> {
    let transcript = read_transcript(&args.file)?;
    let demux = Demultiplexer::new(settings.protocol.clone(), Arc::new(TracingTelemetry));
    let mut events = Box::pin(demultiplex(
        chunk_stream(transcript_chunks(&transcript, args.chunk_size)),
        demux,
    ));

    let mut text = String::new();
    while let Some(event) = events.next().await {
        let event = event?;
        match format {
            OutputFormat::Json => writeln!(out, "{}", event_json(&event))?,
            OutputFormat::Text => {
                // Prose arrives in fragments; print it as one line per run.
                if let DemuxEvent::Text(fragment) = &event {
                    text.push_str(fragment);
                    continue;
                }
                flush_text(out, &mut text)?;
                writeln!(out, "{}", event_line(&event))?;
            }
        }
    }
    if format == OutputFormat::Text {
        flush_text(out, &mut text)?;
    }
    Ok(())
}

fn flush_text<W: Write>(out: &mut W, text: &mut String) -> Result<()> {
    if !text.is_empty() {
        writeln!(out, "[text] {:?}", text)?;
        text.clear();
    }
    Ok(())
}

fn event_line(event: &DemuxEvent) -> String {
    match event {
        DemuxEvent::Text(text) => format!("[text] {:?}", text),
        DemuxEvent::Reasoning(text) => format!("[reasoning] {:?}", text),
        DemuxEvent::ToolCall(call) => format!(
            "[tool_call] {} {}{}",
            call.name,
            compact(&call.input),
            if call.autocompleted { " (autocompleted)" } else { "" }
        ),
        DemuxEvent::Error(error) => format!("[{}] {}", error.kind(), error),
        DemuxEvent::Finish { message_id } => format!("[finish] {}", message_id),
    }
}

/// JSON rendering of a demultiplexer event
pub fn event_json(event: &DemuxEvent) -> Value {
    match event {
        DemuxEvent::Text(text) => json!({"type": "text", "text": text}),
        DemuxEvent::Reasoning(text) => json!({"type": "reasoning", "text": text}),
        DemuxEvent::ToolCall(call) => json!({"type": "tool_call", "call": call}),
        DemuxEvent::Error(error) => json!({"type": "error", "error": error}),
        DemuxEvent::Finish { message_id } => {
            json!({"type": "finish", "message_id": message_id})
        }
    }
}
