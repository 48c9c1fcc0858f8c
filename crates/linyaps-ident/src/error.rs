// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid reference '{given}': {reason}")]
    InvalidReference { given: String, reason: String },

    #[error("Invalid version '{given}': version must have exactly four numeric components (MAJOR.MINOR.PATCH.TWEAK)")]
    InvalidVersion { given: String },

    #[error("Unsupported architecture '{0}'")]
    UnsupportedArch(String),

    #[error("Invalid module name '{0}': module names may not contain '/'")]
    InvalidModuleName(String),

    #[error("module name 'binary' may not be redeclared by a user-defined module")]
    BinaryModuleReserved,

    #[error("package of kind 'app' must declare a non-empty 'command'")]
    AppMissingCommand,

    #[error("package of kind 'app' must declare a 'base'")]
    AppMissingBase,

    #[error("source of kind '{kind}' requires a 'digest'")]
    SourceMissingDigest { kind: &'static str },

    #[error("source of kind 'git' requires a 'commit' or a 'version'")]
    GitSourceMissingRevision,

    #[error("invalid install rule '{0}': {1}")]
    InvalidInstallRule(String, String),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Regex(#[from] regex::Error),
}
