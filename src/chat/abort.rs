// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Cooperative cancellation for a turn

use futures::future::select_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct AbortInner {
    tripped: AtomicBool,
    notify: Notify,
}

/// Shared abort flag.
///
/// Clones observe the same flag. Once tripped it stays tripped. A signal
/// made with [`AbortSignal::child`] also counts as tripped when any of its
/// ancestors is, but tripping the child leaves the ancestors alone.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    inner: Arc<AbortInner>,
    parent: Option<Box<AbortSignal>>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh signal that follows this one
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::default(),
            parent: Some(Box::new(self.clone())),
        }
    }

    /// Trip the signal and wake everything waiting on it
    pub fn trip(&self) {
        self.inner.tripped.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_tripped(&self) -> bool {
        self.chain()
            .any(|inner| inner.tripped.load(Ordering::SeqCst))
    }

    /// Resolve once the signal or one of its ancestors has been tripped
    pub async fn tripped(&self) {
        loop {
            let mut waits: Vec<_> = self
                .chain()
                .map(|inner| Box::pin(inner.notify.notified()))
                .collect();
            for wait in waits.iter_mut() {
                wait.as_mut().enable();
            }
            if self.is_tripped() {
                return;
            }
            select_all(waits).await;
        }
    }

    fn chain(&self) -> impl Iterator<Item = &AbortInner> {
        std::iter::successors(Some(self), |signal| signal.parent.as_deref())
            .map(|signal| &*signal.inner)
    }
}
