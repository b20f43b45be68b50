// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Built-in state tools
//!
//! These processors only touch the turn state, so every agent can use them
//! regardless of which custom tools the session declares.

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::agents::{AgentSpawner, SpawnRequest};
use crate::chat::state::{Subgoal, SubgoalStatus};
use crate::error::{Result, ToolstreamError};
use crate::tools::{ExecutionContext, Processor, ProcessorKind, ToolCall, ToolOutcome};

fn required_str<'a>(input: &'a Value, key: &str) -> Result<&'a str> {
    input[key]
        .as_str()
        .ok_or_else(|| ToolstreamError::InvalidInput(format!("{} is required", key)))
}

fn parse_status(input: &Value) -> Result<Option<SubgoalStatus>> {
    match input.get("status") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|_| {
                ToolstreamError::InvalidInput(format!(
                    "Invalid status {}. Options: not_started, in_progress, complete, aborted",
                    value
                ))
            }),
    }
}

/// Adds a subgoal to the agent's state
pub struct AddSubgoalProcessor;

#[async_trait]
impl Processor for AddSubgoalProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::BuiltIn("add_subgoal".to_string())
    }

    async fn on_end(
        &self,
        call: &ToolCall,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ToolOutcome> {
        let id = required_str(&call.input, "id")?;
        let objective = required_str(&call.input, "objective")?;

        let mut subgoal = Subgoal::new(id, objective);
        if let Some(status) = parse_status(&call.input)? {
            subgoal.status = status;
        }
        subgoal.plan = call.input["plan"].as_str().map(String::from);

        let replaced = ctx.state.subgoals.insert(id.to_string(), subgoal).is_some();
        Ok(ToolOutcome::new(json!({
            "id": id,
            "replaced": replaced,
        })))
    }
}

/// Updates an existing subgoal
pub struct UpdateSubgoalProcessor;

#[async_trait]
impl Processor for UpdateSubgoalProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::BuiltIn("update_subgoal".to_string())
    }

    async fn on_end(
        &self,
        call: &ToolCall,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ToolOutcome> {
        let id = required_str(&call.input, "id")?;
        let status = parse_status(&call.input)?;

        let subgoal = ctx
            .state
            .subgoals
            .get_mut(id)
            .ok_or_else(|| ToolstreamError::InvalidInput(format!("Unknown subgoal '{}'", id)))?;

        if let Some(status) = status {
            subgoal.status = status;
        }
        if let Some(plan) = call.input["plan"].as_str() {
            subgoal.plan = Some(plan.to_string());
        }
        if let Some(log) = call.input["log"].as_str() {
            subgoal.logs.push(log.to_string());
        }

        Ok(ToolOutcome::new(serde_json::to_value(&*subgoal)?))
    }
}

/// Replaces the agent's structured output
pub struct SetOutputProcessor;

#[async_trait]
impl Processor for SetOutputProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::BuiltIn("set_output".to_string())
    }

    async fn on_end(
        &self,
        call: &ToolCall,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ToolOutcome> {
        ctx.state.agent_state.output = Some(call.input.clone());
        Ok(ToolOutcome::new(json!({"message": "Output set"})))
    }
}

/// Asks the agent loop to stop after this turn
pub struct EndTurnProcessor;

#[async_trait]
impl Processor for EndTurnProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::BuiltIn("end_turn".to_string())
    }

    async fn on_end(
        &self,
        _call: &ToolCall,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ToolOutcome> {
        ctx.state.agent_state.end_turn_requested = true;
        Ok(ToolOutcome::new(json!({"message": "Turn ended"})))
    }
}

/// Runs sub-agents concurrently and returns their results.
///
/// Child turns bill their own tool costs under their own run ids, so the
/// summed child credits are reported in the output only.
pub struct SpawnAgentsProcessor {
    spawner: Arc<dyn AgentSpawner>,
}

impl SpawnAgentsProcessor {
    pub fn new(spawner: Arc<dyn AgentSpawner>) -> Self {
        Self { spawner }
    }
}

#[async_trait]
impl Processor for SpawnAgentsProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::BuiltIn("spawn_agents".to_string())
    }

    async fn on_end(
        &self,
        call: &ToolCall,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<ToolOutcome> {
        let agents = call.input["agents"]
            .as_array()
            .ok_or_else(|| ToolstreamError::InvalidInput("agents is required".to_string()))?;
        if agents.is_empty() {
            return Err(ToolstreamError::InvalidInput(
                "agents must not be empty".to_string(),
            ));
        }

        let mut spawns = Vec::with_capacity(agents.len());
        for agent in agents {
            let request = SpawnRequest {
                agent_type: required_str(agent, "agent_type")?.to_string(),
                prompt: agent["prompt"].as_str().unwrap_or_default().to_string(),
            };
            let child = ctx.state.child(request.agent_type.as_str());
            spawns.push(self.spawner.spawn(request, child, ctx.abort.clone()));
        }

        tracing::debug!(
            target: "toolstream.tools",
            run_id = %ctx.state.run_id,
            count = spawns.len(),
            "spawning sub-agents"
        );

        let mut credits = 0;
        let mut results = Vec::with_capacity(spawns.len());
        for (agent, outcome) in agents.iter().zip(join_all(spawns).await) {
            match outcome {
                Ok(outcome) => {
                    credits += outcome.credits;
                    results.push(serde_json::to_value(&outcome)?);
                }
                Err(e) => results.push(json!({
                    "agent_type": agent["agent_type"],
                    "error": e.to_string(),
                })),
            }
        }

        Ok(ToolOutcome::new(json!({
            "agents": results,
            "child_credits": credits,
        })))
    }
}
