// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for toolstream
//!
//! Protocol-level problems inside a model stream (malformed or unnamed tool
//! calls) are not errors at this level: they travel as typed events, see
//! [`crate::stream::InvocationError`]. This module covers failures of the
//! collaborators around the pipeline.

use thiserror::Error;

/// Main error type for toolstream operations
#[derive(Error, Debug)]
pub enum ToolstreamError {
    /// The model-provider chunk source failed
    #[error("Provider error: {0}")]
    Provider(String),

    /// A processor failed while executing a tool call
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// A sub-agent could not be spawned or failed to run
    #[error("Spawn error: {0}")]
    Spawn(String),

    /// The billing collaborator rejected a cost report
    #[error("Billing error: {0}")]
    Billing(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The execution lane worker is gone
    #[error("Execution lane closed")]
    LaneClosed,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for toolstream operations
pub type Result<T> = std::result::Result<T, ToolstreamError>;

impl From<tokio::task::JoinError> for ToolstreamError {
    fn from(err: tokio::task::JoinError) -> Self {
        ToolstreamError::ToolExecution(format!("worker task failed: {}", err))
    }
}
