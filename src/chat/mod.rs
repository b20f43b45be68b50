// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Turn execution
//!
//! This module runs model turns: the pipeline that consumes a chunk stream,
//! the per-turn execution lane, and the state, cancellation and billing
//! pieces they share.

pub mod abort;
pub mod cost;
pub mod engine;
pub mod lane;
pub mod state;

pub use abort::AbortSignal;
pub use cost::{CostReporter, MemoryCostReporter, NoopCostReporter};
pub use engine::{TurnEvent, TurnHandle, TurnOutcome, TurnPhase, TurnPipeline, TurnResult};
pub use state::{AgentState, Subgoal, SubgoalStatus, TurnState};
