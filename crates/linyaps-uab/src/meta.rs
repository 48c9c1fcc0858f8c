// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! The `linglong.meta` ELF section schema (§6).

use serde::{Deserialize, Serialize};

use linyaps_ident::PackageInfo;

pub const META_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UabSections {
    pub bundle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Default for UabSections {
    fn default() -> Self {
        UabSections {
            bundle: "linglong.bundle".to_string(),
            icon: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UabLayerMeta {
    pub info: PackageInfo,
    pub minified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UabMetaInfo {
    pub version: String,
    pub uuid: String,
    pub digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_app: Option<bool>,
    pub sections: UabSections,
    pub layers: Vec<UabLayerMeta>,
}

impl UabMetaInfo {
    pub fn app_layer(&self) -> Option<&UabLayerMeta> {
        self.layers
            .iter()
            .find(|layer| layer.info.kind == linyaps_ident::Kind::App && layer.info.module == "binary")
    }

    pub fn runtime_layer(&self) -> Option<&UabLayerMeta> {
        self.layers
            .iter()
            .find(|layer| layer.info.kind == linyaps_ident::Kind::Runtime && layer.info.module == "binary")
    }

    pub fn base_layer(&self) -> Option<&UabLayerMeta> {
        self.layers
            .iter()
            .find(|layer| layer.info.kind == linyaps_ident::Kind::Base && layer.info.module == "binary")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_default_names_bundle_and_omits_icon() {
        let sections = UabSections::default();
        let json = serde_json::to_string(&sections).unwrap();
        assert!(json.contains("linglong.bundle"));
        assert!(!json.contains("icon"));
    }
}
