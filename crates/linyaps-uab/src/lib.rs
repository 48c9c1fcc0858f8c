// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Packs layer directories into a single-file UAB executable (§4.2,
//! §6) and drives the loader runtime once one is executed.

mod error;
pub mod filter;
pub mod loader;
pub mod meta;
pub mod pack;
mod section;
pub mod verify;

pub use error::{Error, Result};
pub use meta::{UabLayerMeta, UabMetaInfo, UabSections, META_VERSION};
pub use pack::{pack, LayerInput, PackOptions};
pub use verify::verify;
