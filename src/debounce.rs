// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Specforge Contributors

//! Coalescing timer abstraction
//!
//! A `Debouncer` runs a task once the configured window has elapsed since
//! the most recent `schedule` call. Rescheduling coalesces: the pending task
//! is cancelled and replaced, never stacked, so only the last task in a
//! burst fires.

use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Coalescing one-shot scheduler
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// The configured window
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `task` to run after the window elapses, superseding any
    /// pending task.
    pub fn schedule<F, Fut>(&self, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task().await;
        });

        let mut pending = self.pending.lock().unwrap();
        if let Some(previous) = pending.replace(handle) {
            previous.abort();
        }
    }

    /// Drop the pending task, if any, without running it.
    pub fn cancel(&self) {
        let mut pending = self.pending.lock().unwrap();
        if let Some(handle) = pending.take() {
            handle.abort();
        }
    }

    /// Whether a task is currently pending (best effort; a finished task
    /// still counts until the next schedule or cancel).
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
