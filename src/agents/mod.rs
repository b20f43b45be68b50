// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Sub-agent spawning
//!
//! A sub-agent runs its own turn on a child [`TurnState`]: a fresh run id,
//! the parent's ancestry plus the parent run, and nothing else shared.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::chat::abort::AbortSignal;
use crate::chat::cost::{CostReporter, NoopCostReporter};
use crate::chat::engine::{TurnOutcome, TurnPipeline};
use crate::chat::state::TurnState;
use crate::config::Settings;
use crate::error::Result;
use crate::llm::message::Message;
use crate::llm::provider::{ChunkProvider, GenerationRequest};
use crate::telemetry::{TelemetrySink, TracingTelemetry};
use crate::tools::ProcessorRegistry;

/// A sub-agent to run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub agent_type: String,
    pub prompt: String,
}

/// What a finished sub-agent hands back to its parent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnOutcome {
    pub agent_type: String,
    pub run_id: String,
    pub response_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    pub credits: u64,
}

/// Runs sub-agents
#[async_trait]
pub trait AgentSpawner: Send + Sync {
    /// Run one sub-agent to completion on `state`
    async fn spawn(
        &self,
        request: SpawnRequest,
        state: TurnState,
        abort: AbortSignal,
    ) -> Result<SpawnOutcome>;
}

/// Spawner that runs each sub-agent as a nested pipeline turn
pub struct PipelineSpawner {
    provider: Arc<dyn ChunkProvider>,
    registry: ProcessorRegistry,
    settings: Settings,
    telemetry: Arc<dyn TelemetrySink>,
    cost: Arc<dyn CostReporter>,
}

impl PipelineSpawner {
    /// Children get the built-in state tools only; spawn_agents is not
    /// registered for them.
    pub fn new(provider: Arc<dyn ChunkProvider>) -> Self {
        Self {
            provider,
            registry: ProcessorRegistry::with_builtins(),
            settings: Settings::default(),
            telemetry: Arc::new(TracingTelemetry),
            cost: Arc::new(NoopCostReporter),
        }
    }

    pub fn with_registry(mut self, registry: ProcessorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
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
}

#[async_trait]
impl AgentSpawner for PipelineSpawner {
    async fn spawn(
        &self,
        request: SpawnRequest,
        mut state: TurnState,
        abort: AbortSignal,
    ) -> Result<SpawnOutcome> {
        tracing::debug!(
            target: "toolstream.agents",
            agent_type = %request.agent_type,
            run_id = %state.run_id,
            depth = state.depth(),
            "starting sub-agent"
        );

        state.messages.push(Message::user(request.prompt.clone()));
        let generation = GenerationRequest::new(
            request.agent_type.clone(),
            state.messages.clone(),
            state.run_id.clone(),
        );
        let chunks = self.provider.stream(generation).await?;

        let pipeline = TurnPipeline::new(self.registry.clone())
            .with_settings(&self.settings)
            .with_telemetry(self.telemetry.clone())
            .with_cost_reporter(self.cost.clone())
            .with_abort_signal(abort);

        // Child events are not forwarded; the parent sees the outcome only.
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let result = pipeline.run(chunks, state, events_tx).await?;

        if result.outcome == TurnOutcome::Aborted {
            tracing::debug!(
                target: "toolstream.agents",
                run_id = %result.state.run_id,
                "sub-agent aborted"
            );
        }

        Ok(SpawnOutcome {
            agent_type: request.agent_type,
            run_id: result.state.run_id.clone(),
            response_text: result.response_text,
            output: result.state.agent_state.output.clone(),
            credits: result.state.agent_state.credits_used,
        })
    }
}
