// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock chunk provider for testing and transcript replay
//!
//! Provides a configurable implementation of the ChunkProvider trait that
//! replays scripted model output without making real API calls.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::Result;
use crate::llm::provider::{Chunk, ChunkProvider, ChunkStream, GenerationRequest};

/// A mock chunk provider
#[derive(Clone)]
pub struct MockProvider {
    /// Provider name
    name: String,
    /// Configured responses, returned in order (the last one repeats)
    responses: Arc<Mutex<Vec<MockResponse>>>,
    /// Call counter
    call_count: Arc<AtomicUsize>,
    /// Recorded requests
    recorded_requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

/// A pre-configured response for the mock provider
#[derive(Clone, Debug)]
pub struct MockResponse {
    /// Reasoning text emitted before the visible text
    pub reasoning: Option<String>,
    /// Visible text, split into chunks
    pub text: String,
    /// Characters per text chunk
    pub chunk_size: usize,
    /// Delay between chunks
    pub delay: Option<Duration>,
    /// Emit the finish sentinel at the end
    pub finish: bool,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            reasoning: None,
            text: "Mock response".to_string(),
            chunk_size: 10,
            delay: None,
            finish: true,
        }
    }
}

impl MockResponse {
    /// Create a response from text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Set the chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set a delay between chunks
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Set reasoning text
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// End the stream without a finish sentinel (simulates a cut-off stream)
    pub fn without_finish(mut self) -> Self {
        self.finish = false;
        self
    }

    /// Render this response as chunks
    pub fn to_chunks(&self, message_id: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        if let Some(reasoning) = &self.reasoning {
            chunks.push(Chunk::reasoning(reasoning.clone()));
        }
        chunks.extend(
            split_text(&self.text, self.chunk_size)
                .into_iter()
                .map(Chunk::text),
        );
        if self.finish {
            chunks.push(Chunk::finish(message_id));
        }
        chunks
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a new mock provider
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            responses: Arc::new(Mutex::new(vec![MockResponse::default()])),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded_requests: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Create a mock provider with a custom name
    pub fn with_name(name: impl Into<String>) -> Self {
        let mut provider = Self::new();
        provider.name = name.into();
        provider
    }

    /// Set a single text response
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.with_mock_responses(vec![MockResponse::text(text)])
    }

    /// Queue multiple responses (returned in order)
    pub fn with_mock_responses(self, queued: Vec<MockResponse>) -> Self {
        let mut responses = match self.responses.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Mock provider responses lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        *responses = queued;
        drop(responses);
        self
    }

    /// Get the number of times stream() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get all recorded requests
    pub fn recorded_requests(&self) -> Vec<GenerationRequest> {
        match self.recorded_requests.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn next_response(&self) -> MockResponse {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        let responses = match self.responses.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if responses.is_empty() {
            MockResponse::default()
        } else {
            responses[count.min(responses.len() - 1)].clone()
        }
    }
}

#[async_trait]
impl ChunkProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, request: GenerationRequest) -> Result<ChunkStream> {
        match self.recorded_requests.lock() {
            Ok(mut guard) => guard.push(request),
            Err(poisoned) => poisoned.into_inner().push(request),
        }

        let response = self.next_response();
        let message_id = format!("msg_{}", uuid::Uuid::new_v4().simple());
        let chunks = response.to_chunks(&message_id);

        Ok(match response.delay {
            Some(delay) => delayed_stream(chunks, delay),
            None => chunk_stream(chunks),
        })
    }
}

/// Build a chunk stream from a fixed list of chunks
pub fn chunk_stream(chunks: Vec<Chunk>) -> ChunkStream {
    let items: Vec<Result<Chunk>> = chunks.into_iter().map(Ok).collect();
    Box::pin(stream::iter(items))
}

/// Build a chunk stream that sleeps before yielding each chunk
pub fn delayed_stream(chunks: Vec<Chunk>, delay: Duration) -> ChunkStream {
    Box::pin(stream::iter(chunks).then(move |chunk| async move {
        tokio::time::sleep(delay).await;
        let item: Result<Chunk> = Ok(chunk);
        item
    }))
}

/// Split text into chunks of at most `chunk_size` characters
pub fn split_text(text: &str, chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    text.chars()
        .collect::<Vec<_>>()
        .chunks(chunk_size)
        .map(|c| c.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest::new("base", vec![], "run_1")
    }

    async fn collect(stream: ChunkStream) -> Vec<Chunk> {
        stream
            .map(|c| c.unwrap())
            .collect::<Vec<_>>()
            .await
    }

    #[test]
    fn test_split_text_respects_chars() {
        assert_eq!(split_text("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(split_text("世界世界", 3), vec!["世界世", "界"]);
        assert!(split_text("", 4).is_empty());
        assert_eq!(split_text("ab", 0), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_stream_emits_text_then_finish() {
        let provider = MockProvider::new().with_response("Hello world");
        let chunks = collect(provider.stream(request()).await.unwrap()).await;

        let text: String = chunks
            .iter()
            .filter_map(|c| match c {
                Chunk::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "Hello world");
        assert!(chunks.last().unwrap().is_finish());
    }

    #[tokio::test]
    async fn test_responses_returned_in_order() {
        let provider = MockProvider::new().with_mock_responses(vec![
            MockResponse::text("first"),
            MockResponse::text("second").without_finish(),
        ]);

        let first = collect(provider.stream(request()).await.unwrap()).await;
        let second = collect(provider.stream(request()).await.unwrap()).await;
        let third = collect(provider.stream(request()).await.unwrap()).await;

        assert_eq!(first[0], Chunk::text("first"));
        assert!(first.last().unwrap().is_finish());
        assert!(!second.last().unwrap().is_finish());
        assert_eq!(third[0], Chunk::text("second"));
        assert_eq!(provider.call_count(), 3);
        assert_eq!(provider.recorded_requests().len(), 3);
    }

    #[tokio::test]
    async fn test_reasoning_comes_first() {
        let provider = MockProvider::new()
            .with_mock_responses(vec![MockResponse::text("x").with_reasoning("think")]);
        let chunks = collect(provider.stream(request()).await.unwrap()).await;
        assert_eq!(chunks[0], Chunk::reasoning("think"));
    }
}
