// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Builds an OCI runtime configuration for a linyaps container (§4.1).
//!
//! [`ContainerConfigBuilder`] is a pure, single-use compiler: app id, layer
//! paths and a set of feature toggles go in, a complete
//! [`oci_spec::runtime::Spec`] comes out. The interesting part is
//! [`mount_tree`], which keeps every requested mount destination reachable
//! even when the read-only base/runtime rootfs doesn't already contain it.

mod builder;
mod env_file;
mod error;
mod ipc;
mod mount_tree;
mod options;

pub use builder::ContainerConfigBuilder;
pub use error::{Error, Result};
pub use mount_tree::{MountKind, MountTree, PendingMount};
pub use options::{
    ContainerOptions, ExtraMount, IdMapping, MountFeatures, PrivateMapping, StartContainerHook,
};
