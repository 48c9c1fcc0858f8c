// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between a long-running
/// operation and whoever requested it be canceled.
///
/// Each atomic sub-step of an operation re-reads [`CancelToken::is_canceled`]
/// before starting (§5); there is no preemption.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Observer handed to [`crate::LayerStore::pull`] so that byte-level
/// progress can be proxied out to the package manager's task signal
/// without the store depending on any particular UI.
pub trait ProgressSink: Send + Sync {
    /// Called as bytes of a pull arrive; `total` is `None` when the
    /// remote did not report a content length up front.
    fn update_progress(&self, fetched: u64, total: Option<u64>);
}

/// A [`ProgressSink`] that discards all progress, used where a caller
/// doesn't care to observe it (tests, scripted builds).
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn update_progress(&self, _fetched: u64, _total: Option<u64>) {}
}

/// The context threaded through a store operation: where to report
/// progress, and whether the caller has asked to stop.
#[derive(Clone)]
pub struct Task {
    pub cancel: CancelToken,
    progress: Arc<dyn ProgressSink>,
}

impl Task {
    pub fn new(progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            cancel: CancelToken::new(),
            progress,
        }
    }

    pub fn update_progress(&self, fetched: u64, total: Option<u64>) {
        self.progress.update_progress(fetched, total);
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_canceled()
    }
}

impl Default for Task {
    fn default() -> Self {
        Self::new(Arc::new(NullProgress))
    }
}
