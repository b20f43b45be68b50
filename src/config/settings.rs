// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for toolstream
//!
//! Handles loading and saving settings from ~/.toolstream/settings.json

use serde::{Deserialize, Serialize};

mod io;
mod validation;

/// Main settings structure, stored in ~/.toolstream/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Wire protocol used to embed tool calls in model text
    #[serde(default)]
    pub protocol: ProtocolConfig,

    /// Execution pipeline settings
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Delimiter protocol configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolConfig {
    /// Marker that opens an embedded tool call
    #[serde(default = "default_start_tag")]
    pub start_tag: String,

    /// Marker that closes an embedded tool call
    #[serde(default = "default_end_tag")]
    pub end_tag: String,

    /// Reserved key inside the JSON payload naming the tool
    #[serde(default = "default_tool_name_key")]
    pub tool_name_key: String,

    /// Characters kept from each end of a payload in parse-error previews
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,

    /// Recover tool calls cut off by the end of the stream
    #[serde(default = "default_true")]
    pub salvage_truncated: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            start_tag: default_start_tag(),
            end_tag: default_end_tag(),
            tool_name_key: default_tool_name_key(),
            preview_chars: default_preview_chars(),
            salvage_truncated: true,
        }
    }
}

impl ProtocolConfig {
    /// Create a protocol config with custom markers and tool-name key
    pub fn with_tags(
        start_tag: impl Into<String>,
        end_tag: impl Into<String>,
        tool_name_key: impl Into<String>,
    ) -> Self {
        Self {
            start_tag: start_tag.into(),
            end_tag: end_tag.into(),
            tool_name_key: tool_name_key.into(),
            ..Default::default()
        }
    }
}

/// Execution pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Maximum queued jobs on a turn's execution lane before dispatch waits
    #[serde(default = "default_lane_capacity")]
    pub lane_capacity: usize,

    /// Drop ephemeral messages from the conversation at turn end
    #[serde(default = "default_true")]
    pub expire_ephemeral: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lane_capacity: default_lane_capacity(),
            expire_ephemeral: true,
        }
    }
}

fn default_start_tag() -> String {
    "<tool_call>".to_string()
}

fn default_end_tag() -> String {
    "</tool_call>".to_string()
}

fn default_tool_name_key() -> String {
    "tool".to_string()
}

fn default_preview_chars() -> usize {
    100
}

fn default_lane_capacity() -> usize {
    64
}

fn default_true() -> bool {
    true
}
