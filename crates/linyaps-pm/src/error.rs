// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Diagnostic, Debug, Error)]
#[diagnostic(
    url(
        "https://linyaps.org.cn/error_codes#{}",
        self.code().unwrap_or_else(|| Box::new("linyaps::pm::generic"))
    )
)]
pub enum Error {
    #[error("{reference} is already installed")]
    #[diagnostic(code(linyaps::pm::already_installed))]
    AlreadyInstalled { reference: String },

    #[error("{reference} is not installed")]
    #[diagnostic(code(linyaps::pm::not_installed))]
    NotInstalled { reference: String },

    #[error("{reference}/{module} is being operated on by another task")]
    #[diagnostic(code(linyaps::pm::target_busy))]
    TargetBusy { reference: String, module: String },

    #[error("no newer version of {reference} is available")]
    #[diagnostic(code(linyaps::pm::already_up_to_date))]
    AlreadyUpToDate { reference: String },

    #[error("task {0} not found")]
    #[diagnostic(code(linyaps::pm::task_not_found))]
    TaskNotFound(String),

    #[error("operation canceled")]
    #[diagnostic(code(linyaps::pm::canceled))]
    Canceled,

    #[error("unsupported install file type '{0}'")]
    #[diagnostic(code(linyaps::pm::unsupported_file_type))]
    UnsupportedFileType(String),

    #[error("external command {command} failed with status {code:?}: {stderr_tail}")]
    #[diagnostic(code(linyaps::pm::command_failed))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr_tail: String,
    },

    #[error(transparent)]
    #[diagnostic(code(linyaps::pm::io))]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(linyaps::pm::json))]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    #[diagnostic(forward(0))]
    Digest(#[from] linyaps_digest::Error),

    #[error(transparent)]
    #[diagnostic(forward(0))]
    Ident(#[from] linyaps_ident::Error),

    #[error(transparent)]
    #[diagnostic(forward(0))]
    Store(#[from] linyaps_store::Error),

    #[error(transparent)]
    #[diagnostic(forward(0))]
    Uab(#[from] linyaps_uab::Error),
}
