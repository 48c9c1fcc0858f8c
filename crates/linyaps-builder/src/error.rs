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
        self.code().unwrap_or_else(|| Box::new("linyaps::builder::generic"))
    )
)]
pub enum Error {
    #[error("source {name} is missing a digest to verify against")]
    #[diagnostic(code(linyaps::builder::source_missing_digest))]
    SourceMissingDigest { name: String },

    #[error("digest mismatch for {name}: expected {expected}, got {actual}")]
    #[diagnostic(code(linyaps::builder::digest_mismatch))]
    DigestMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("unsupported archive extension for {0}")]
    #[diagnostic(code(linyaps::builder::unsupported_archive))]
    UnsupportedArchive(String),

    #[error("dependency {0} is not available and offline mode is set")]
    #[diagnostic(code(linyaps::builder::dependency_missing))]
    DependencyMissing(String),

    #[error("invalid install rule regex: {0}")]
    #[diagnostic(code(linyaps::builder::invalid_rule))]
    InvalidRule(String),

    #[error("command {command} failed with code {code:?}: {stderr_tail}")]
    #[diagnostic(code(linyaps::builder::command_failed))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr_tail: String,
    },

    #[error("command {0} timed out")]
    #[diagnostic(code(linyaps::builder::command_timeout))]
    CommandTimeout(String),

    #[error("runtime check failed for the committed build output")]
    #[diagnostic(code(linyaps::builder::runtime_check_failed))]
    RuntimeCheckFailed,

    #[error("build was canceled")]
    #[diagnostic(code(linyaps::builder::canceled))]
    Canceled,

    #[error("failed to create directory {path}")]
    #[diagnostic(code(linyaps::builder::directory_create))]
    DirectoryCreate {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Walkdir(#[from] walkdir::Error),

    #[error(transparent)]
    Nix(#[from] nix::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

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

    #[error(transparent)]
    #[diagnostic(forward(0))]
    Container(#[from] linyaps_container::Error),
}
