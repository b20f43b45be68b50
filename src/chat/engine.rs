// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Turn pipeline
//!
//! Drives one model turn: demultiplexes the provider stream, dispatches tool
//! calls to the turn's execution lane in emission order, forwards events to
//! the caller, and returns the updated state once the lane has drained.

use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::chat::abort::AbortSignal;
use crate::chat::cost::{CostReporter, NoopCostReporter};
use crate::chat::lane::{ExecutionLane, LaneConfig, LaneJob};
use crate::chat::state::TurnState;
use crate::config::{PipelineConfig, ProtocolConfig, Settings};
use crate::error::Result;
use crate::llm::provider::{Chunk, ChunkStream};
use crate::stream::{DemuxEvent, DemuxStats, Demultiplexer, InvocationError};
use crate::telemetry::{TelemetrySink, TracingTelemetry};
use crate::tools::{ProcessorRegistry, ToolCall, ToolResult};

/// Events a turn emits to its consumer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    Text { text: String },
    ReasoningDelta { text: String },
    /// A tool call was dispatched
    ToolCall { call: ToolCall },
    /// A dispatched tool call finished
    ToolResult { result: ToolResult },
    /// A tool call could not be parsed
    Error { error: InvocationError },
}

/// Where a turn is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Streaming,
    StreamDone,
    Aborted,
    Terminal,
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Completed,
    Aborted,
}

/// Everything a finished turn produced
#[derive(Debug)]
pub struct TurnResult {
    /// Provider message id; `None` if the stream ended without a finish chunk
    pub message_id: Option<String>,
    /// Tool calls dispatched, in emission order
    pub invocations: Vec<ToolCall>,
    /// Tool results, in execution order
    pub results: Vec<ToolResult>,
    pub state: TurnState,
    /// All prose of the turn
    pub response_text: String,
    pub outcome: TurnOutcome,
    pub cost_errors: Vec<String>,
    pub stats: DemuxStats,
}

/// A turn running on its own task
pub struct TurnHandle {
    /// Events in emission order; ends when the turn finishes
    pub events: UnboundedReceiverStream<TurnEvent>,
    pub join: JoinHandle<Result<TurnResult>>,
    abort: AbortSignal,
}

impl TurnHandle {
    /// Trip the turn's abort signal
    pub fn abort(&self) {
        self.abort.trip();
    }

    /// Wait for the turn to finish
    pub async fn wait(self) -> Result<TurnResult> {
        self.join.await?
    }
}

/// Per-turn bookkeeping owned by the dispatch loop
#[derive(Default)]
struct Dispatch {
    message_id: Option<String>,
    invocations: Vec<ToolCall>,
    response_text: String,
}

/// Runs model turns against a processor registry
#[derive(Clone)]
pub struct TurnPipeline {
    registry: Arc<ProcessorRegistry>,
    protocol: ProtocolConfig,
    pipeline: PipelineConfig,
    telemetry: Arc<dyn TelemetrySink>,
    cost: Arc<dyn CostReporter>,
    abort: AbortSignal,
}

impl TurnPipeline {
    pub fn new(registry: ProcessorRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            protocol: ProtocolConfig::default(),
            pipeline: PipelineConfig::default(),
            telemetry: Arc::new(TracingTelemetry),
            cost: Arc::new(NoopCostReporter),
            abort: AbortSignal::new(),
        }
    }

    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.protocol = settings.protocol.clone();
        self.pipeline = settings.pipeline.clone();
        self
    }

    pub fn with_protocol(mut self, protocol: ProtocolConfig) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_cost_reporter(mut self, cost: Arc<dyn CostReporter>) -> Self {
        self.cost = cost;
        self
    }

    /// Follow a caller's signal; tripping it aborts every turn of this pipeline
    pub fn with_abort_signal(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    /// Pipeline-wide signal. Each turn runs on its own child of it.
    pub fn abort_signal(&self) -> AbortSignal {
        self.abort.clone()
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    /// Run a turn on a background task
    pub fn spawn(&self, chunks: ChunkStream, state: TurnState) -> TurnHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let abort = self.abort.child();
        let pipeline = self.clone();
        let turn_abort = abort.clone();
        let join = tokio::spawn(async move {
            pipeline
                .run_turn(chunks, state, events_tx, turn_abort)
                .await
        });
        TurnHandle {
            events: UnboundedReceiverStream::new(events_rx),
            join,
            abort,
        }
    }

    /// Run a turn to completion.
    ///
    /// Returns once the stream has ended (or the turn was aborted) and every
    /// queued tool call has finished. A provider error stops consumption;
    /// queued work still drains before the error is returned.
    pub async fn run(
        &self,
        chunks: ChunkStream,
        state: TurnState,
        events: mpsc::UnboundedSender<TurnEvent>,
    ) -> Result<TurnResult> {
        self.run_turn(chunks, state, events, self.abort.child()).await
    }

    async fn run_turn(
        &self,
        mut chunks: ChunkStream,
        state: TurnState,
        events: mpsc::UnboundedSender<TurnEvent>,
        abort: AbortSignal,
    ) -> Result<TurnResult> {
        let run_id = state.run_id.clone();
        let mut demux = Demultiplexer::new(self.protocol.clone(), self.telemetry.clone());
        let lane = ExecutionLane::spawn(
            state,
            LaneConfig {
                capacity: self.pipeline.lane_capacity,
                expire_ephemeral: self.pipeline.expire_ephemeral,
                abort: abort.clone(),
                cost: self.cost.clone(),
            },
            events.clone(),
        );

        tracing::debug!(target: "toolstream.chat.engine", run_id = %run_id, "turn started");

        let mut phase = TurnPhase::Streaming;
        let mut dispatch = Dispatch::default();
        let mut provider_error = None;

        while phase == TurnPhase::Streaming {
            if abort.is_tripped() {
                phase = TurnPhase::Aborted;
                break;
            }

            let next: Option<Option<Result<Chunk>>> = tokio::select! {
                biased;
                _ = abort.tripped() => None,
                item = chunks.next() => Some(item),
            };
            let Some(item) = next else {
                phase = TurnPhase::Aborted;
                break;
            };

            let batch = match item {
                Some(Ok(chunk)) => demux.push_chunk(chunk),
                Some(Err(error)) => {
                    tracing::warn!(
                        target: "toolstream.chat.engine",
                        run_id = %run_id,
                        error = %error,
                        "provider stream failed"
                    );
                    provider_error = Some(error);
                    phase = TurnPhase::StreamDone;
                    break;
                }
                None => {
                    if abort.is_tripped() {
                        phase = TurnPhase::Aborted;
                        break;
                    }
                    demux.finish()
                }
            };

            for event in batch {
                if let Err(error) = self
                    .handle(event, &lane, &mut dispatch, &events, &abort)
                    .await
                {
                    // The worker is gone; collect what it left and report.
                    if let Err(worker_error) = lane.finish().await {
                        tracing::warn!(
                            target: "toolstream.chat.engine",
                            run_id = %run_id,
                            error = %worker_error,
                            "execution lane worker failed"
                        );
                    }
                    return Err(error);
                }
            }

            if demux.is_finished() {
                phase = TurnPhase::StreamDone;
            }
        }

        if phase == TurnPhase::Aborted {
            tracing::info!(
                target: "toolstream.chat.engine",
                run_id = %run_id,
                dispatched = dispatch.invocations.len(),
                "turn aborted"
            );
        }
        let outcome = match phase {
            TurnPhase::Aborted => TurnOutcome::Aborted,
            _ => TurnOutcome::Completed,
        };

        let output = lane.finish().await?;
        phase = TurnPhase::Terminal;
        tracing::debug!(
            target: "toolstream.chat.engine",
            run_id = %run_id,
            phase = ?phase,
            outcome = ?outcome,
            results = output.results.len(),
            "turn finished"
        );

        if let Some(error) = provider_error {
            return Err(error);
        }

        Ok(TurnResult {
            message_id: dispatch.message_id,
            invocations: dispatch.invocations,
            results: output.results,
            state: output.state,
            response_text: dispatch.response_text,
            outcome,
            cost_errors: output.cost_errors,
            stats: demux.stats().clone(),
        })
    }

    async fn handle(
        &self,
        event: DemuxEvent,
        lane: &ExecutionLane,
        dispatch: &mut Dispatch,
        events: &mpsc::UnboundedSender<TurnEvent>,
        abort: &AbortSignal,
    ) -> Result<()> {
        match event {
            DemuxEvent::Text(text) => {
                dispatch.response_text.push_str(&text);
                lane.submit(LaneJob::Text(text.clone())).await?;
                emit(events, TurnEvent::Text { text });
            }
            DemuxEvent::Reasoning(text) => {
                emit(events, TurnEvent::ReasoningDelta { text });
            }
            DemuxEvent::ToolCall(call) => {
                if abort.is_tripped() {
                    tracing::debug!(
                        target: "toolstream.chat.engine",
                        tool = %call.name,
                        "turn aborted; tool call not dispatched"
                    );
                    return Ok(());
                }

                let processor = self.registry.resolve(&call.name);
                processor.on_start(&call);
                tracing::debug!(
                    target: "toolstream.chat.engine",
                    tool = %call.name,
                    tool_use_id = %call.id,
                    autocompleted = call.autocompleted,
                    "dispatching tool call"
                );

                emit(events, TurnEvent::ToolCall { call: call.clone() });
                dispatch.invocations.push(call.clone());
                lane.submit(LaneJob::Invoke { call, processor }).await?;
            }
            DemuxEvent::Error(error) => {
                emit(events, TurnEvent::Error { error });
            }
            DemuxEvent::Finish { message_id } => {
                dispatch.message_id = Some(message_id);
            }
        }
        Ok(())
    }
}

fn emit(events: &mpsc::UnboundedSender<TurnEvent>, event: TurnEvent) {
    if events.send(event).is_err() {
        tracing::trace!(target: "toolstream.chat.engine", "event receiver dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolstreamError;
    use crate::llm::mock_provider::{chunk_stream, delayed_stream};
    use crate::tools::{ExecutionContext, Processor, ProcessorKind, ToolOutcome};
    use async_trait::async_trait;
    use std::time::Duration;

    fn pipeline() -> TurnPipeline {
        TurnPipeline::new(ProcessorRegistry::with_builtins())
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<TurnEvent>) -> Vec<TurnEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn test_plain_text_turn() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = pipeline()
            .run(
                chunk_stream(vec![
                    Chunk::text("Hello "),
                    Chunk::text("world"),
                    Chunk::finish("msg_1"),
                ]),
                TurnState::new("base"),
                tx,
            )
            .await
            .unwrap();

        assert_eq!(result.response_text, "Hello world");
        assert_eq!(result.message_id.as_deref(), Some("msg_1"));
        assert_eq!(result.outcome, TurnOutcome::Completed);
        assert!(result.invocations.is_empty());
        assert_eq!(result.state.messages.len(), 1);
        assert_eq!(
            drain(&mut rx),
            vec![
                TurnEvent::Text {
                    text: "Hello ".to_string()
                },
                TurnEvent::Text {
                    text: "world".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_tool_call_updates_state() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = pipeline()
            .run(
                chunk_stream(vec![
                    Chunk::text("Done.<tool_call>{\"tool\":\"end_turn\"}</tool_call>"),
                    Chunk::finish("msg_1"),
                ]),
                TurnState::new("base"),
                tx,
            )
            .await
            .unwrap();

        assert!(result.state.agent_state.end_turn_requested);
        assert_eq!(result.results.len(), 1);
        assert!(!result.results[0].is_error());

        let events = drain(&mut rx);
        assert!(matches!(events[0], TurnEvent::Text { .. }));
        assert!(matches!(events[1], TurnEvent::ToolCall { .. }));
        assert!(matches!(events[2], TurnEvent::ToolResult { .. }));
    }

    #[tokio::test]
    async fn test_stream_exhaustion_without_finish() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = pipeline()
            .run(
                chunk_stream(vec![Chunk::text("cut <tool_call>{\"tool\":\"end_turn\"")]),
                TurnState::new("base"),
                tx,
            )
            .await
            .unwrap();

        assert_eq!(result.message_id, None);
        assert_eq!(result.invocations.len(), 1);
        assert!(result.invocations[0].autocompleted);
        assert!(result.state.agent_state.end_turn_requested);
    }

    #[tokio::test]
    async fn test_provider_error_drains_lane_then_fails() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let stream: ChunkStream = Box::pin(futures::stream::iter(vec![
            Ok(Chunk::text("<tool_call>{\"tool\":\"end_turn\"}</tool_call>")),
            Err(crate::error::ToolstreamError::Provider("reset".to_string())),
        ]));

        let err = pipeline()
            .run(stream, TurnState::new("base"), tx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("reset"));
        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, TurnEvent::ToolResult { .. })));
    }

    #[tokio::test]
    async fn test_abort_while_waiting_for_chunks() {
        let pipeline = pipeline();
        let handle = pipeline.spawn(
            delayed_stream(
                vec![Chunk::text("slow"), Chunk::finish("msg_1")],
                Duration::from_secs(5),
            ),
            TurnState::new("base"),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.abort();
        let result = tokio::time::timeout(Duration::from_secs(1), handle.wait())
            .await
            .expect("abort should end the turn promptly")
            .unwrap();
        assert_eq!(result.outcome, TurnOutcome::Aborted);
        assert_eq!(result.message_id, None);
    }

    #[test]
    fn test_turn_event_serialization() {
        let json = serde_json::to_value(TurnEvent::ReasoningDelta {
            text: "hm".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "reasoning_delta", "text": "hm"}));
    }

    struct Panicky;

    #[async_trait]
    impl Processor for Panicky {
        fn kind(&self) -> ProcessorKind {
            ProcessorKind::BuiltIn("panicky".to_string())
        }

        async fn on_end(
            &self,
            _call: &ToolCall,
            _ctx: &mut ExecutionContext<'_>,
        ) -> Result<ToolOutcome> {
            panic!("processor bug")
        }
    }

    #[tokio::test]
    async fn test_dead_lane_worker_fails_the_turn() {
        let mut registry = ProcessorRegistry::with_builtins();
        registry.register(Arc::new(Panicky));
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = TurnPipeline::new(registry)
            .run(
                delayed_stream(
                    vec![
                        Chunk::text("<tool_call>{\"tool\":\"panicky\"}</tool_call>"),
                        Chunk::text("after the crash"),
                        Chunk::finish("msg_1"),
                    ],
                    Duration::from_millis(30),
                ),
                TurnState::new("base"),
                tx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolstreamError::LaneClosed));
    }
}
