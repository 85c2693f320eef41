// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Per-request cancellation context.
//!
//! Every operation on the [`Backend`](crate::backend::Backend) receives a
//! [`RequestContext`]. It is handed down to storage calls, appliance calls and
//! role lock acquisition, so a cancelled request (or one whose deadline has
//! passed) stops at the next suspension point instead of running to
//! completion.
//!
//! Storage writes that already committed are not undone on cancellation.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation token plus an optional deadline, cloned freely.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context cancelled by `token`.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Returns a copy of this context that also expires after `timeout`.
    ///
    /// The earlier of the existing deadline and the new one wins.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            token: self.token.clone(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once the token fired or the deadline passed.
    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Drives `fut` unless the context finishes first.
    ///
    /// Returns `None` when the context won the race; `fut` is dropped at its
    /// current suspension point.
    pub async fn run<F>(&self, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        if self.is_done() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.done() => None,
            output = fut => Some(output),
        }
    }
}
