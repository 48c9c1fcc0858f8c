// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

mod config;
mod error;

pub use error::{Error, Result};

pub use self::config::*;
