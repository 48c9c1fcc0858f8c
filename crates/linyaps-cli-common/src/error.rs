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
        self.code().unwrap_or_else(|| Box::new("linyaps::cli::generic"))
    )
)]
pub enum Error {
    #[error("{0}")]
    #[diagnostic(code(linyaps::cli::usage))]
    Usage(String),

    #[error(transparent)]
    #[diagnostic(forward(0))]
    Builder(#[from] linyaps_builder::Error),

    #[error(transparent)]
    #[diagnostic(forward(0))]
    Pm(#[from] linyaps_pm::Error),

    #[error(transparent)]
    #[diagnostic(forward(0))]
    Store(#[from] linyaps_store::Error),

    #[error(transparent)]
    #[diagnostic(forward(0))]
    Ident(#[from] linyaps_ident::Error),

    #[error(transparent)]
    #[diagnostic(forward(0))]
    Uab(#[from] linyaps_uab::Error),

    #[error(transparent)]
    #[diagnostic(forward(0))]
    Config(#[from] linyaps_config::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The process exit code for this error (§7): the exit status of the
    /// innermost failed subprocess when one is known, otherwise a generic
    /// failure code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Builder(linyaps_builder::Error::CommandFailed { code, .. }) => code.unwrap_or(1),
            Error::Pm(linyaps_pm::Error::CommandFailed { code, .. }) => code.unwrap_or(1),
            Error::Uab(linyaps_uab::Error::CommandFailed { code, .. }) => code.unwrap_or(1),
            _ => 1,
        }
    }
}
