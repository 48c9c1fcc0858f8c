// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! SHA-256 content digests, shared by the layer store, the builder and
//! the UAB packager as the one address space for content-addressed data.

mod error;
mod hash;

pub use error::{Error, Result};
pub use hash::{parse_digest, Digest, Hasher, PartialDigest, DIGEST_SIZE, EMPTY_DIGEST};
