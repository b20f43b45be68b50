// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! toolstream - streaming tool-call protocol layer.
//!
//! Consumes a model's token stream, extracts tool calls embedded in the text
//! between start/end markers, and executes them against the turn's state in
//! the order they were emitted.
//!
//! Architecture highlights:
//! - `stream`: delimiter scanner, payload parser, chunk demultiplexer
//! - `tools`: processor trait, registry and built-in state tools
//! - `chat`: turn pipeline, single-worker execution lane, turn state
//! - `agents`: sub-agent spawning on child states
//! - `llm`: chunk provider abstraction and mock provider
//! - `telemetry`: parse-outcome reporting
//! - `cli`, `commands`: the `toolstream` binary

pub mod agents;
pub mod chat;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod llm;
pub mod stream;
pub mod telemetry;
pub mod tools;

pub use error::{Result, ToolstreamError};
