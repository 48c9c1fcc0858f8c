// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Persistent configuration for one store instance, readable and
/// writable through [`crate::LayerStore::get_config`] /
/// [`crate::LayerStore::set_config`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `LINGLONG_ROOT`, defaulting to `/var/lib/linglong`
    pub root: PathBuf,
    pub default_repo_url: Option<String>,
    pub default_repo_name: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/var/lib/linglong"),
            default_repo_url: None,
            default_repo_name: None,
        }
    }
}

impl StoreConfig {
    pub fn repo_dir(&self) -> PathBuf {
        self.root.join("repo")
    }

    pub fn layers_dir(&self) -> PathBuf {
        self.root.join("layers")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }
}
