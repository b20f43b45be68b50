// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM module for toolstream
//!
//! Provides the chunk-level abstraction over model providers and the
//! conversation message types the pipeline accumulates.

pub mod message;
pub mod mock_provider;
pub mod provider;

pub use message::*;
pub use provider::*;
