// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

use serde::{Deserialize, Serialize};

use crate::{Arch, Error, Reference, Result};

/// The schema version written to every `info.json`
pub const SCHEMA_VERSION: &str = "1.0";

/// The module name that every application must provide and that no
/// user-defined module may redeclare
pub const BINARY_MODULE: &str = "binary";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    App,
    Runtime,
    Base,
}

/// The metadata file, `info.json`, written at the root of every layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageInfo {
    pub id: String,
    pub name: String,
    pub kind: Kind,
    pub version: crate::Version,
    pub arch: Vec<Arch>,
    pub channel: String,
    pub module: String,
    pub base: Option<Reference>,
    pub runtime: Option<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default)]
    pub description: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<serde_json::Value>,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

impl PackageInfo {
    /// Check the invariants required of `info.json` by §3 of the design:
    /// an app must declare a command and a base, and no module may be
    /// named `binary` except the synthesized one.
    pub fn validate(&self) -> Result<()> {
        if self.kind == Kind::App {
            if self.command.is_empty() {
                return Err(Error::AppMissingCommand);
            }
            if self.base.is_none() {
                return Err(Error::AppMissingBase);
            }
        }
        Ok(())
    }

    /// A compatibility shim for v1 `info.json` files, which used `appid`
    /// instead of `id` and had no explicit default channel.
    pub fn from_v1_compat(mut value: serde_json::Value) -> Result<Self> {
        if let Some(obj) = value.as_object_mut() {
            if let Some(appid) = obj.remove("appid") {
                obj.entry("id").or_insert(appid);
            }
            obj.entry("channel")
                .or_insert_with(|| serde_json::Value::String(crate::DEFAULT_CHANNEL.to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// Returns an error if `name` collides with the reserved [`BINARY_MODULE`]
/// name when declaring a user-defined module.
pub fn validate_user_module_name(name: &str) -> Result<()> {
    if name == BINARY_MODULE {
        return Err(Error::BinaryModuleReserved);
    }
    if name.contains('/') {
        return Err(Error::InvalidModuleName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod package_info_test {
    use rstest::rstest;

    use super::*;
    use crate::{Arch, Version};

    fn base_info(kind: Kind) -> PackageInfo {
        PackageInfo {
            id: "org.test.hello".into(),
            name: "hello".into(),
            kind,
            version: Version::new(1, 0, 0, 1),
            arch: vec![Arch::X86_64],
            channel: "main".into(),
            module: "binary".into(),
            base: None,
            runtime: None,
            command: vec![],
            description: String::new(),
            size: 0,
            permissions: None,
            schema_version: SCHEMA_VERSION.to_string(),
            uuid: None,
        }
    }

    #[rstest]
    fn test_app_requires_command_and_base() {
        let info = base_info(Kind::App);
        assert!(matches!(info.validate(), Err(Error::AppMissingCommand)));
    }

    #[rstest]
    fn test_app_requires_base_even_with_command() {
        let mut info = base_info(Kind::App);
        info.command = vec!["hello".into()];
        assert!(matches!(info.validate(), Err(Error::AppMissingBase)));
    }

    #[rstest]
    fn test_app_valid_with_command_and_base() {
        let mut info = base_info(Kind::App);
        info.command = vec!["hello".into()];
        info.base = Some(Reference::new(
            "org.linyaps.base",
            Version::new(1, 0, 0, 1),
            Arch::X86_64,
            "binary",
        ));
        assert!(info.validate().is_ok());
    }

    #[rstest]
    fn test_runtime_does_not_require_command() {
        let info = base_info(Kind::Runtime);
        assert!(info.validate().is_ok());
    }

    #[rstest]
    fn test_binary_module_name_rejected() {
        assert!(validate_user_module_name("binary").is_err());
        assert!(validate_user_module_name("develop").is_ok());
    }
}
