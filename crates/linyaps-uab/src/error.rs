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
        self.code().unwrap_or_else(|| Box::new("linyaps::uab::generic"))
    )
)]
pub enum Error {
    #[error("no application layer (kind=app, module=binary) found among the given layers")]
    #[diagnostic(code(linyaps::uab::app_layer_missing))]
    AppLayerMissing,

    #[error("layer {0} is missing required metadata file info.json")]
    #[diagnostic(code(linyaps::uab::info_missing))]
    InfoMissing(String),

    #[error("digest mismatch verifying UAB bundle section: expected {expected}, got {actual}")]
    #[diagnostic(code(linyaps::uab::digest_mismatch))]
    DigestMismatch { expected: String, actual: String },

    #[error("UAB metadata section linglong.meta is missing or unreadable")]
    #[diagnostic(code(linyaps::uab::meta_missing))]
    MetaMissing,

    #[error("unsupported UAB metadata version '{0}'")]
    #[diagnostic(code(linyaps::uab::unsupported_version))]
    UnsupportedVersion(String),

    #[error("external command {command} failed with status {code:?}: {stderr_tail}")]
    #[diagnostic(code(linyaps::uab::command_failed))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr_tail: String,
    },

    #[error("external command {0} timed out")]
    #[diagnostic(code(linyaps::uab::command_timeout))]
    CommandTimeout(String),

    #[error("failed to create directory {path}")]
    #[diagnostic(code(linyaps::uab::directory_create))]
    DirectoryCreate {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(linyaps::uab::io))]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(linyaps::uab::json))]
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
    Container(#[from] linyaps_container::Error),
}
