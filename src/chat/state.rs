// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Per-turn agent state
//!
//! A `TurnState` is owned by exactly one execution lane while a turn runs.
//! Sub-agents never share it; they get a fresh child state instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::llm::message::Message;

/// Progress of a subgoal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubgoalStatus {
    #[default]
    NotStarted,
    InProgress,
    Complete,
    Aborted,
}

/// A unit of work the agent tracks for itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subgoal {
    pub id: String,
    pub objective: String,
    #[serde(default)]
    pub status: SubgoalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<String>,
}

impl Subgoal {
    pub fn new(id: impl Into<String>, objective: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            objective: objective.into(),
            status: SubgoalStatus::default(),
            plan: None,
            logs: Vec::new(),
        }
    }
}

/// Agent-level state carried across the turns of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Agent type this run executes as
    pub agent_type: String,
    /// Structured output set by the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// The agent asked to stop after this turn
    #[serde(default)]
    pub end_turn_requested: bool,
    /// Credits consumed by tool executions in this run
    #[serde(default)]
    pub credits_used: u64,
}

/// State a turn reads and mutates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnState {
    /// Identifier of this run
    pub run_id: String,
    /// Run ids of every ancestor agent, root first
    #[serde(default)]
    pub ancestor_run_ids: Vec<String>,
    /// Conversation so far
    #[serde(default)]
    pub messages: Vec<Message>,
    pub agent_state: AgentState,
    #[serde(default)]
    pub subgoals: BTreeMap<String, Subgoal>,
}

impl TurnState {
    /// Fresh state for a root agent run
    pub fn new(agent_type: impl Into<String>) -> Self {
        Self {
            run_id: new_run_id(),
            ancestor_run_ids: Vec::new(),
            messages: Vec::new(),
            agent_state: AgentState {
                agent_type: agent_type.into(),
                ..Default::default()
            },
            subgoals: BTreeMap::new(),
        }
    }

    /// Seed the conversation
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    /// Fresh state for a sub-agent of this run.
    ///
    /// Nothing is shared with the parent except the ancestry chain.
    pub fn child(&self, agent_type: impl Into<String>) -> Self {
        let mut ancestors = self.ancestor_run_ids.clone();
        ancestors.push(self.run_id.clone());

        let mut child = Self::new(agent_type);
        child.ancestor_run_ids = ancestors;
        child
    }

    /// Nesting depth (0 for a root run)
    pub fn depth(&self) -> usize {
        self.ancestor_run_ids.len()
    }

    /// Drop ephemeral messages, returning how many were removed
    pub fn expire_ephemeral(&mut self) -> usize {
        let before = self.messages.len();
        self.messages.retain(|m| !m.ephemeral);
        before - self.messages.len()
    }
}

fn new_run_id() -> String {
    format!("run_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state() {
        let state = TurnState::new("base");
        assert!(state.run_id.starts_with("run_"));
        assert_eq!(state.agent_state.agent_type, "base");
        assert_eq!(state.depth(), 0);
        assert!(state.subgoals.is_empty());
    }

    #[test]
    fn test_child_state_ancestry() {
        let mut root = TurnState::new("base");
        root.messages.push(Message::user("parent only"));
        root.agent_state.output = Some(serde_json::json!({"done": true}));

        let child = root.child("researcher");
        assert_ne!(child.run_id, root.run_id);
        assert_eq!(child.ancestor_run_ids, vec![root.run_id.clone()]);
        assert!(child.messages.is_empty());
        assert_eq!(child.agent_state.output, None);
        assert_eq!(child.agent_state.agent_type, "researcher");

        let grandchild = child.child("reviewer");
        assert_eq!(
            grandchild.ancestor_run_ids,
            vec![root.run_id.clone(), child.run_id.clone()]
        );
        assert_eq!(grandchild.depth(), 2);
    }

    #[test]
    fn test_expire_ephemeral() {
        let mut state = TurnState::new("base").with_messages(vec![
            Message::user("keep"),
            Message::system("reminder").into_ephemeral(),
            Message::assistant("keep too"),
        ]);
        assert_eq!(state.expire_ephemeral(), 1);
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.expire_ephemeral(), 0);
    }

    #[test]
    fn test_subgoal_status_serialization() {
        let goal = Subgoal::new("g1", "write tests");
        let json = serde_json::to_value(&goal).unwrap();
        assert_eq!(json["status"], "not_started");
        assert!(json.get("plan").is_none());
    }
}
