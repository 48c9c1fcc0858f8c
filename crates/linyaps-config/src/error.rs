// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

use miette::Diagnostic;
use thiserror::Error;

#[derive(Diagnostic, Debug, Error)]
#[diagnostic(
    url(
        "https://linyaps.org.cn/error_codes#{}",
        self.code().unwrap_or_else(|| Box::new("linyaps::config::generic"))
    )
)]
pub enum Error {
    #[error("Invalid path {0}")]
    #[diagnostic(code(linyaps::config::invalid_path))]
    InvalidPath(std::path::PathBuf, #[source] std::io::Error),

    #[error("Cannot load config, lock has been poisoned: {0}")]
    #[diagnostic(code(linyaps::config::lock_poisoned_read))]
    LockPoisonedRead(String),
    #[error("Cannot update config, lock has been poisoned: {0}")]
    #[diagnostic(code(linyaps::config::lock_poisoned_write))]
    LockPoisonedWrite(String),

    #[error("config.yaml is missing required field `repo`")]
    #[diagnostic(code(linyaps::config::missing_repo))]
    MissingRepo,

    #[error(transparent)]
    #[diagnostic(code(linyaps::config::yaml))]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    #[diagnostic(code(linyaps::config::source))]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
