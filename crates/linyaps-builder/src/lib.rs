// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Fetches a project's sources, pulls its base/runtime dependencies,
//! runs the build inside a container, splits the output into modules
//! and commits them to the layer store (C4, §4.3).

pub mod commit;
pub mod container;
pub mod depends;
pub mod entries;
mod error;
pub mod export;
pub mod install_module;
mod namespace;
pub mod overlay;
pub mod pipeline;
pub mod project;
pub mod source;

pub use error::{Error, Result};
pub use pipeline::{BuildConfig, Workspace};
