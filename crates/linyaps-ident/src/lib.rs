// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! References, package metadata and project manifest types.
//!
//! These are the value types shared by every other component: the
//! layer store keys its content by [`Reference`], the container
//! config builder reads [`PackageInfo`], and the builder pipeline
//! parses a project's `linglong.yaml` into [`manifest::Project`].

mod arch;
mod error;
mod manifest;
mod package_info;
mod reference;
mod version;

pub use arch::Arch;
pub use error::{Error, Result};
pub use manifest::{
    default_develop_rules, AptExtensions, BuildExtensions, BuildScript, Module, PackageMeta,
    Project, Source,
};
pub use package_info::{validate_user_module_name, Kind, PackageInfo, BINARY_MODULE, SCHEMA_VERSION};
pub use reference::{FuzzyReference, Reference, DEFAULT_CHANNEL};
pub use version::Version;
