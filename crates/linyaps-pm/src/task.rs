// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! The task state machine driving every long-running package manager
//! operation (§4.4).

use std::fmt;
use std::sync::Arc;

use linyaps_store::{CancelToken, Task as StoreTask};
use uuid::Uuid;

/// One step of `preInstall -> installRuntime -> installBase -> installApp
/// -> Success`, or a terminal `Failed`/`Canceled`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    PreInstall,
    InstallRuntime,
    InstallBase,
    InstallApp,
    Success,
    Failed(String),
    Canceled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Success | TaskState::Failed(_) | TaskState::Canceled)
    }

    /// The percentage a UI should show for this step, assuming the
    /// four-step happy path.
    pub fn percentage(&self) -> u8 {
        match self {
            TaskState::PreInstall => 5,
            TaskState::InstallRuntime => 35,
            TaskState::InstallBase => 65,
            TaskState::InstallApp => 90,
            TaskState::Success => 100,
            TaskState::Failed(_) | TaskState::Canceled => 0,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::PreInstall => write!(f, "preInstall"),
            TaskState::InstallRuntime => write!(f, "installRuntime"),
            TaskState::InstallBase => write!(f, "installBase"),
            TaskState::InstallApp => write!(f, "installApp"),
            TaskState::Success => write!(f, "success"),
            TaskState::Failed(reason) => write!(f, "failed: {reason}"),
            TaskState::Canceled => write!(f, "canceled"),
        }
    }
}

/// One `TaskChanged(taskId, percentage, message, state)` signal (§4.4, §6).
#[derive(Debug, Clone)]
pub struct TaskEvent {
    pub task_id: Uuid,
    pub percentage: u8,
    pub message: String,
    pub state: TaskState,
}

/// Receives `TaskChanged` signals as a task progresses. The package
/// manager's D-Bus surface implements this to forward them to clients;
/// tests and scripted callers can use [`NullObserver`].
pub trait TaskObserver: Send + Sync {
    fn on_task_changed(&self, event: TaskEvent);
}

pub struct NullObserver;

impl TaskObserver for NullObserver {
    fn on_task_changed(&self, _event: TaskEvent) {}
}

/// The handle threaded through one install/update/uninstall operation:
/// its id, its cancellation token, and where to emit `TaskChanged`.
pub struct TaskHandle {
    pub id: Uuid,
    pub cancel: CancelToken,
    observer: Arc<dyn TaskObserver>,
}

impl TaskHandle {
    pub fn new(observer: Arc<dyn TaskObserver>) -> Self {
        Self {
            id: Uuid::new_v4(),
            cancel: CancelToken::new(),
            observer,
        }
    }

    pub fn store_task(&self) -> StoreTask {
        // The store's own progress sink is separate from TaskChanged;
        // callers that want byte-level progress wire update_progress
        // through their own ProgressSink and pass it here instead.
        StoreTask::default()
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_canceled()
    }

    pub fn emit(&self, state: TaskState, message: impl Into<String>) {
        let event = TaskEvent {
            task_id: self.id,
            percentage: state.percentage(),
            message: message.into(),
            state,
        };
        self.observer.on_task_changed(event);
    }

    /// Checked before each atomic sub-step; returns `Err` once canceled
    /// so the caller can tear down via its [`crate::Transaction`].
    pub fn check_canceled(&self) -> crate::error::Result<()> {
        if self.is_canceled() {
            Err(crate::error::Error::Canceled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_percentages_increase_along_the_happy_path() {
        let states = [
            TaskState::PreInstall,
            TaskState::InstallRuntime,
            TaskState::InstallBase,
            TaskState::InstallApp,
            TaskState::Success,
        ];
        let percentages: Vec<u8> = states.iter().map(TaskState::percentage).collect();
        assert!(percentages.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Success.is_terminal());
        assert!(TaskState::Canceled.is_terminal());
        assert!(TaskState::Failed("x".into()).is_terminal());
        assert!(!TaskState::InstallBase.is_terminal());
    }
}
