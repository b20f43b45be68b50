// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Cost reporting hook
//!
//! The execution lane awaits a report after every tool execution before it
//! starts the next one.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::Result;

/// Billing collaborator
#[async_trait]
pub trait CostReporter: Send + Sync {
    /// Record credits consumed by one tool execution of `run_id`
    async fn report_cost(&self, run_id: &str, credits: u64) -> Result<()>;
}

/// Reporter that discards every report
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCostReporter;

#[async_trait]
impl CostReporter for NoopCostReporter {
    async fn report_cost(&self, _run_id: &str, _credits: u64) -> Result<()> {
        Ok(())
    }
}

/// Reporter that keeps a ledger in memory
#[derive(Debug, Default)]
pub struct MemoryCostReporter {
    entries: Mutex<Vec<(String, u64)>>,
}

impl MemoryCostReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every report received, in order
    pub fn entries(&self) -> Vec<(String, u64)> {
        match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Total credits reported
    pub fn total(&self) -> u64 {
        self.entries().iter().map(|(_, credits)| credits).sum()
    }
}

#[async_trait]
impl CostReporter for MemoryCostReporter {
    async fn report_cost(&self, run_id: &str, credits: u64) -> Result<()> {
        match self.entries.lock() {
            Ok(mut guard) => guard.push((run_id.to_string(), credits)),
            Err(poisoned) => poisoned.into_inner().push((run_id.to_string(), credits)),
        }
        Ok(())
    }
}
