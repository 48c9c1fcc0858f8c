// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{reference} is not present locally")]
    NotFound { reference: String },

    #[error("no remote repository could resolve {reference}")]
    NotFoundRemote { reference: String },

    #[error("a dependency could not be resolved: {0}")]
    DependencyMissing(String),

    #[error("{reference} is already installed")]
    AlreadyInstalled { reference: String },

    #[error(transparent)]
    Digest(#[from] linyaps_digest::Error),

    #[error(transparent)]
    Ident(#[from] linyaps_ident::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("operation canceled")]
    Canceled,
}
