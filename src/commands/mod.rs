// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI subcommands
//!
//! Both commands read a transcript of raw model output and feed it through
//! the protocol layer in fixed-size chunks, the way a provider would stream
//! it.

pub mod replay;
pub mod scan;

use std::path::Path;

use crate::error::{Result, ToolstreamError};
use crate::llm::mock_provider::split_text;
use crate::llm::provider::Chunk;

/// Read a transcript file
pub fn read_transcript(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(ToolstreamError::InvalidInput(format!(
            "Transcript not found: {}",
            path.display()
        )));
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Split a transcript into text chunks
pub fn transcript_chunks(transcript: &str, chunk_size: usize) -> Vec<Chunk> {
    split_text(transcript, chunk_size)
        .into_iter()
        .map(Chunk::text)
        .collect()
}

/// Single-line rendering of a value for text output
pub(crate) fn compact(value: &serde_json::Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_missing_transcript() {
        let err = read_transcript(Path::new("/nonexistent/transcript.txt")).unwrap_err();
        assert!(err.to_string().contains("Transcript not found"));
    }

    #[test]
    fn test_transcript_chunks() {
        let chunks = transcript_chunks("abcdef", 4);
        assert_eq!(chunks, vec![Chunk::text("abcd"), Chunk::text("ef")]);
    }
}
