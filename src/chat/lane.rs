// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Single-worker execution lane
//!
//! Every turn owns one lane: a bounded queue drained by exactly one worker
//! task. The worker owns the [`TurnState`], so jobs run strictly in queue
//! order and each job's state changes and messages are committed before the
//! next job starts, however long any single job takes.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::chat::abort::AbortSignal;
use crate::chat::cost::CostReporter;
use crate::chat::engine::TurnEvent;
use crate::chat::state::TurnState;
use crate::error::{Result, ToolstreamError};
use crate::llm::message::{ContentBlock, Message};
use crate::tools::{ExecutionContext, Processor, ToolCall, ToolResult};

/// Work queued on a lane
pub enum LaneJob {
    /// Assistant prose, kept in order with tool results
    Text(String),
    /// A tool call and the processor that executes it
    Invoke {
        call: ToolCall,
        processor: Arc<dyn Processor>,
    },
}

/// What the worker hands back when the lane shuts down
#[derive(Debug)]
pub struct LaneOutput {
    pub state: TurnState,
    /// Tool results in execution order
    pub results: Vec<ToolResult>,
    /// Cost reports that failed
    pub cost_errors: Vec<String>,
}

/// Lane settings
#[derive(Clone)]
pub struct LaneConfig {
    pub capacity: usize,
    pub expire_ephemeral: bool,
    pub abort: AbortSignal,
    pub cost: Arc<dyn CostReporter>,
}

/// Handle to a running lane
pub struct ExecutionLane {
    sender: mpsc::Sender<LaneJob>,
    worker: JoinHandle<LaneOutput>,
}

impl ExecutionLane {
    /// Start the worker for a turn
    pub fn spawn(
        state: TurnState,
        config: LaneConfig,
        events: mpsc::UnboundedSender<TurnEvent>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let worker = tokio::spawn(run_worker(receiver, state, config, events));
        Self { sender, worker }
    }

    /// Queue a job, waiting only if the queue is full
    pub async fn submit(&self, job: LaneJob) -> Result<()> {
        self.sender
            .send(job)
            .await
            .map_err(|_| ToolstreamError::LaneClosed)
    }

    /// Close the queue and wait for every queued job to finish
    pub async fn finish(self) -> Result<LaneOutput> {
        drop(self.sender);
        Ok(self.worker.await?)
    }
}

/// Assistant blocks not yet committed to the state
#[derive(Default)]
struct PendingAssistant {
    blocks: Vec<ContentBlock>,
}

impl PendingAssistant {
    fn text(&mut self, fragment: &str) {
        if let Some(ContentBlock::Text { text }) = self.blocks.last_mut() {
            text.push_str(fragment);
        } else {
            self.blocks.push(ContentBlock::Text {
                text: fragment.to_string(),
            });
        }
    }

    /// Commit pending prose and the call's tool-use block before it runs
    fn tool_use(&mut self, call: &ToolCall, messages: &mut Vec<Message>) {
        self.blocks.push(ContentBlock::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: call.input.clone(),
        });
        self.flush(messages);
    }

    fn flush(&mut self, messages: &mut Vec<Message>) {
        if !self.blocks.is_empty() {
            let blocks = std::mem::take(&mut self.blocks);
            messages.push(Message::assistant_blocks(blocks));
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<LaneJob>,
    mut state: TurnState,
    config: LaneConfig,
    events: mpsc::UnboundedSender<TurnEvent>,
) -> LaneOutput {
    let mut pending = PendingAssistant::default();
    let mut results = Vec::new();
    let mut cost_errors = Vec::new();

    while let Some(job) = receiver.recv().await {
        let (call, processor) = match job {
            LaneJob::Text(fragment) => {
                pending.text(&fragment);
                continue;
            }
            LaneJob::Invoke { call, processor } => (call, processor),
        };

        tracing::debug!(
            target: "toolstream.chat.lane",
            run_id = %state.run_id,
            tool = %call.name,
            tool_use_id = %call.id,
            "executing tool call"
        );

        pending.tool_use(&call, &mut state.messages);
        let outcome = {
            let mut ctx = ExecutionContext {
                state: &mut state,
                abort: config.abort.clone(),
            };
            processor.on_end(&call, &mut ctx).await
        };
        let result = match outcome {
            Ok(outcome) => ToolResult::success(&call, outcome),
            Err(error) => {
                tracing::warn!(
                    target: "toolstream.chat.lane",
                    tool = %call.name,
                    tool_use_id = %call.id,
                    error = %error,
                    "tool execution failed"
                );
                ToolResult::error(&call, error.to_string())
            }
        };

        state.agent_state.credits_used += result.credits;
        if let Err(error) = config.cost.report_cost(&state.run_id, result.credits).await {
            tracing::warn!(
                target: "toolstream.chat.lane",
                run_id = %state.run_id,
                credits = result.credits,
                error = %error,
                "cost report failed"
            );
            cost_errors.push(error.to_string());
        }

        state.messages.push(Message::tool_result(
            result.tool_use_id.clone(),
            result.tool_name.clone(),
            result.output_value(),
            result.is_error(),
        ));

        if config.abort.is_tripped() {
            tracing::debug!(
                target: "toolstream.chat.lane",
                tool_use_id = %call.id,
                "turn aborted; tool result not emitted"
            );
        } else if events
            .send(TurnEvent::ToolResult {
                result: result.clone(),
            })
            .is_err()
        {
            tracing::trace!(target: "toolstream.chat.lane", "event receiver dropped");
        }

        results.push(result);
    }

    pending.flush(&mut state.messages);
    if config.expire_ephemeral {
        let expired = state.expire_ephemeral();
        if expired > 0 {
            tracing::debug!(
                target: "toolstream.chat.lane",
                expired,
                "expired ephemeral messages"
            );
        }
    }

    LaneOutput {
        state,
        results,
        cost_errors,
    }
}
