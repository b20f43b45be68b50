// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chunk provider trait and related types
//!
//! The provider collaborator turns a generation request into a stream of
//! [`Chunk`]s. Real HTTP clients live outside this crate.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::Result;
use crate::llm::message::Message;

/// One unit of model output, as produced by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Chunk {
    /// Visible text, possibly containing embedded tool calls
    Text { text: String },

    /// Reasoning/thinking text
    Reasoning { text: String },

    /// A structured tool call emitted natively by the provider
    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// End of the generation, carrying the provider's message identifier
    Finish { message_id: String },
}

impl Chunk {
    /// Create a text chunk
    pub fn text(text: impl Into<String>) -> Self {
        Chunk::Text { text: text.into() }
    }

    /// Create a reasoning chunk
    pub fn reasoning(text: impl Into<String>) -> Self {
        Chunk::Reasoning { text: text.into() }
    }

    /// Create a finish sentinel
    pub fn finish(message_id: impl Into<String>) -> Self {
        Chunk::Finish {
            message_id: message_id.into(),
        }
    }

    /// Whether this is the terminal sentinel
    pub fn is_finish(&self) -> bool {
        matches!(self, Chunk::Finish { .. })
    }
}

/// Stream of chunks from a provider
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Chunk>> + Send>>;

/// Request for a streamed generation
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Agent type or model profile to generate with
    pub agent_type: String,

    /// Conversation so far
    pub messages: Vec<Message>,

    /// Run this generation belongs to
    pub run_id: String,
}

impl GenerationRequest {
    /// Create a new generation request
    pub fn new(
        agent_type: impl Into<String>,
        messages: Vec<Message>,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            agent_type: agent_type.into(),
            messages,
            run_id: run_id.into(),
        }
    }
}

/// Main trait for model providers
#[async_trait]
pub trait ChunkProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Start a streamed generation
    async fn stream(&self, request: GenerationRequest) -> Result<ChunkStream>;
}
