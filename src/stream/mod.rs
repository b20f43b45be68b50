// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool-call extraction from model output streams
//!
//! - [`scanner`]: incremental start/end marker scanner
//! - [`parser`]: payload parsing and end-of-stream salvage
//! - [`demux`]: provider chunks to normalized events

pub mod demux;
pub mod parser;
pub mod scanner;

pub use demux::{demultiplex, DemuxEvent, DemuxStats, Demultiplexer};
pub use parser::{parse_invocation, salvage_truncated, InvocationError, ParsedInvocation};
pub use scanner::{DelimiterScanner, ScanState, Segment};
