// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

use miette::Diagnostic;
use thiserror::Error;

/// A specialized result for container configuration assembly
pub type Result<T> = std::result::Result<T, Error>;

/// The error type returned while assembling an OCI configuration
#[derive(Diagnostic, Debug, Error)]
#[diagnostic(
    url(
        "https://linyaps.org.cn/error_codes#{}",
        self.code().unwrap_or_else(|| Box::new("linyaps::container::generic"))
    )
)]
pub enum Error {
    /// An input parameter failed validation
    #[error("invalid container parameter: {0}")]
    #[diagnostic(code(linyaps::container::param_invalid))]
    ParamInvalid(String),

    /// The runtime layer was required but not provided
    #[error("runtime layer is required but was not provided")]
    #[diagnostic(code(linyaps::container::runtime_missing))]
    RuntimeMissing,

    /// The application layer was required but not provided
    #[error("application layer is required but was not provided")]
    #[diagnostic(code(linyaps::container::app_missing))]
    AppMissing,

    /// The host's home directory could not be determined
    #[error("could not determine the host home directory")]
    #[diagnostic(code(linyaps::container::home_missing))]
    HomeMissing,

    /// The application's private directory could not be created
    #[error("failed to create private directory {path}")]
    #[diagnostic(code(linyaps::container::private_dir_create))]
    PrivateDirCreate {
        /// The path that could not be created
        path: String,
        /// The underlying error
        #[source]
        source: std::io::Error,
    },

    /// A private mapping entry was malformed
    #[error("invalid private mapping '{0}'")]
    #[diagnostic(code(linyaps::container::private_map_invalid))]
    PrivateMapInvalid(String),

    /// An IPC related bind could not be prepared
    #[error("failed to prepare IPC bind for {what}: {reason}")]
    #[diagnostic(code(linyaps::container::ipc_bind_failure))]
    IPCBindFailure {
        /// The IPC resource that could not be bound
        what: String,
        /// Why it failed
        reason: String,
    },

    /// The requested app-cache directory does not exist
    #[error("app cache directory {0} does not exist")]
    #[diagnostic(code(linyaps::container::cache_missing))]
    CacheMissing(String),

    /// Two mounts were requested at the same destination in a way that cannot be reconciled
    #[error("conflicting mounts requested at destination {0}")]
    #[diagnostic(code(linyaps::container::mount_conflict))]
    MountConflict(String),

    /// The generated environment file could not be written
    #[error("failed to write environment file {path}")]
    #[diagnostic(code(linyaps::container::env_write))]
    EnvWrite {
        /// The file that could not be written
        path: String,
        /// The underlying error
        #[source]
        source: std::io::Error,
    },

    /// Building the underlying OCI spec type failed
    #[error("failed to build OCI spec component: {0}")]
    #[diagnostic(code(linyaps::container::oci_builder))]
    OciBuilder(String),
}
