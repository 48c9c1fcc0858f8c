// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Install/uninstall/update orchestration from a layer file, a UAB
//! file, or a remote repository (C5, §4.4).

mod concurrency;
mod error;
mod install_file;
mod manager;
mod task;
mod transaction;

pub use error::{Error, Result};
pub use install_file::FileType;
pub use manager::PackageManager;
pub use task::{NullObserver, TaskEvent, TaskHandle, TaskObserver, TaskState};
pub use transaction::Transaction;
