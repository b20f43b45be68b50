// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{Result, ToolstreamError};

use super::Settings;

impl Settings {
    /// Check that the settings describe a usable protocol and pipeline.
    pub fn validate(&self) -> Result<()> {
        let protocol = &self.protocol;
        if protocol.start_tag.is_empty() || protocol.end_tag.is_empty() {
            return Err(ToolstreamError::Config(
                "start_tag and end_tag must not be empty".to_string(),
            ));
        }
        if protocol.start_tag == protocol.end_tag {
            return Err(ToolstreamError::Config(format!(
                "start_tag and end_tag must differ (both are '{}')",
                protocol.start_tag
            )));
        }
        if protocol.tool_name_key.is_empty() {
            return Err(ToolstreamError::Config(
                "tool_name_key must not be empty".to_string(),
            ));
        }
        if self.pipeline.lane_capacity == 0 {
            return Err(ToolstreamError::Config(
                "lane_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
