// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Transactional rollback for a single task (§4.4).
//!
//! Every mutation an install/update/uninstall performs registers a
//! rollback step here. Unless [`Transaction::commit`] is called,
//! [`Transaction::rollback`] must be run on the error path; it executes
//! the steps in LIFO order so an early return from any sub-step undoes
//! exactly what already happened before it.

use std::future::Future;
use std::pin::Pin;

type RollbackStep = Pin<Box<dyn Future<Output = ()> + Send>>;

#[must_use = "a transaction must be committed or rolled back"]
pub struct Transaction {
    steps: Vec<RollbackStep>,
    resolved: bool,
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            resolved: false,
        }
    }

    pub fn on_rollback(&mut self, step: impl Future<Output = ()> + Send + 'static) {
        self.steps.push(Box::pin(step));
    }

    /// The operation succeeded; discard the registered rollback steps.
    pub fn commit(mut self) {
        self.resolved = true;
        self.steps.clear();
    }

    /// The operation failed or was canceled; undo every registered step
    /// in LIFO order.
    pub async fn rollback(mut self) {
        self.resolved = true;
        while let Some(step) = self.steps.pop() {
            step.await;
        }
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.resolved && !self.steps.is_empty() {
            tracing::error!(
                steps = self.steps.len(),
                "transaction dropped without commit() or rollback(): store mutations were left unwound"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_rollback_runs_steps_in_lifo_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut tx = Transaction::new();
        let o1 = order.clone();
        tx.on_rollback(async move { o1.lock().unwrap().push(1) });
        let o2 = order.clone();
        tx.on_rollback(async move { o2.lock().unwrap().push(2) });
        tx.rollback().await;
        assert_eq!(*order.lock().unwrap(), vec![2, 1]);
    }

    #[test]
    fn test_commit_discards_steps() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut tx = Transaction::new();
        let c = counter.clone();
        tx.on_rollback(async move {
            c.fetch_add(1, Ordering::SeqCst);
        });
        tx.commit();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
