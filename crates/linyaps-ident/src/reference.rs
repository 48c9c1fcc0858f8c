// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Arch, Error, Result, Version};

/// The channel used when a reference does not name one explicitly
pub const DEFAULT_CHANNEL: &str = "main";

/// A legacy channel name accepted when reading existing references.
///
/// New references are always written with [`DEFAULT_CHANNEL`]; `linglong`
/// is recognised only so that layers committed by older tooling keep
/// resolving.
const LEGACY_CHANNEL: &str = "linglong";

fn normalize_channel(channel: &str) -> String {
    if channel == LEGACY_CHANNEL {
        DEFAULT_CHANNEL.to_string()
    } else {
        channel.to_string()
    }
}

/// The fully-qualified identifier of one module of one package version
/// in the layer store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reference {
    pub channel: String,
    pub id: String,
    pub version: Version,
    pub arch: Arch,
    pub module: String,
}

impl Reference {
    pub fn new(id: impl Into<String>, version: Version, arch: Arch, module: impl Into<String>) -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            id: id.into(),
            version,
            arch,
            module: module.into(),
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = normalize_channel(&channel.into());
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}/{}/{}/{}",
            self.channel, self.id, self.version, self.arch, self.module
        )
    }
}

impl FromStr for Reference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (channel, rest) = match s.split_once(':') {
            Some((channel, rest)) => (normalize_channel(channel), rest),
            None => (DEFAULT_CHANNEL.to_string(), s),
        };
        let parts: Vec<&str> = rest.split('/').collect();
        let [id, version, arch, module]: [&str; 4] = parts.try_into().map_err(|_| Error::InvalidReference {
            given: s.to_string(),
            reason: "expected <channel>:<id>/<version>/<arch>/<module>".to_string(),
        })?;
        if id.is_empty() {
            return Err(Error::InvalidReference {
                given: s.to_string(),
                reason: "id must not be empty".to_string(),
            });
        }
        Ok(Self {
            channel,
            id: id.to_string(),
            version: version.parse()?,
            arch: arch.parse()?,
            module: module.to_string(),
        })
    }
}

/// A [`Reference`] in which any component may be absent. The layer
/// store resolves a `FuzzyReference` to one concrete `Reference`,
/// either from what is present locally or by forcing a remote lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FuzzyReference {
    pub channel: Option<String>,
    pub id: String,
    pub version: Option<Version>,
    pub arch: Option<Arch>,
    pub module: Option<String>,
}

impl FuzzyReference {
    /// The default module assumed when a fuzzy reference does not name one
    pub const DEFAULT_MODULE: &'static str = "binary";

    pub fn module_or_default(&self) -> &str {
        self.module.as_deref().unwrap_or(Self::DEFAULT_MODULE)
    }
}

impl Display for FuzzyReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(channel) = &self.channel {
            write!(f, "{channel}:")?;
        }
        f.write_str(&self.id)?;
        if let Some(version) = &self.version {
            write!(f, "/{version}")?;
        }
        if let Some(arch) = &self.arch {
            write!(f, "/{arch}")?;
        }
        if let Some(module) = &self.module {
            write!(f, "/{module}")?;
        }
        Ok(())
    }
}

impl FromStr for FuzzyReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (channel, rest) = match s.split_once(':') {
            Some((channel, rest)) => (Some(normalize_channel(channel)), rest),
            None => (None, s),
        };
        let mut parts = rest.split('/');
        let id = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::InvalidReference {
                given: s.to_string(),
                reason: "id must not be empty".to_string(),
            })?
            .to_string();
        let version = parts.next().map(|p| p.parse()).transpose()?;
        let arch = parts.next().map(|p| p.parse()).transpose()?;
        let module = parts.next().map(str::to_string);
        if parts.next().is_some() {
            return Err(Error::InvalidReference {
                given: s.to_string(),
                reason: "too many '/'-separated components".to_string(),
            });
        }
        Ok(Self {
            channel,
            id,
            version,
            arch,
            module,
        })
    }
}

impl From<Reference> for FuzzyReference {
    fn from(r: Reference) -> Self {
        Self {
            channel: Some(r.channel),
            id: r.id,
            version: Some(r.version),
            arch: Some(r.arch),
            module: Some(r.module),
        }
    }
}

#[cfg(test)]
mod reference_test {
    use rstest::rstest;

    use super::{FuzzyReference, Reference};

    #[rstest]
    fn test_reference_round_trip() {
        let r: Reference = "main:org.test.hello/1.0.0.1/x86_64/binary".parse().unwrap();
        assert_eq!(r.to_string(), "main:org.test.hello/1.0.0.1/x86_64/binary");
        let parsed: Reference = r.to_string().parse().unwrap();
        assert_eq!(r, parsed);
    }

    #[rstest]
    fn test_reference_defaults_channel_main() {
        let r: Reference = "org.test.hello/1.0.0.1/x86_64/binary".parse().unwrap();
        assert_eq!(r.channel, "main");
    }

    #[rstest]
    fn test_reference_legacy_channel_normalizes_to_main() {
        let r: Reference = "linglong:org.test.hello/1.0.0.1/x86_64/binary".parse().unwrap();
        assert_eq!(r.channel, "main");
        // new references are always written with the "main" channel
        assert!(r.to_string().starts_with("main:"));
    }

    #[rstest]
    fn test_reference_rejects_three_part_version() {
        let err = "org.test.hello/1.0.0/x86_64/binary".parse::<Reference>();
        assert!(err.is_err());
    }

    #[rstest]
    fn test_fuzzy_reference_partial() {
        let f: FuzzyReference = "org.test.hello".parse().unwrap();
        assert_eq!(f.id, "org.test.hello");
        assert!(f.version.is_none());
        assert_eq!(f.module_or_default(), "binary");
    }

    #[rstest]
    fn test_fuzzy_reference_from_full_reference() {
        let r: Reference = "main:org.test.hello/1.0.0.1/x86_64/develop".parse().unwrap();
        let f: FuzzyReference = r.clone().into();
        assert_eq!(f.module_or_default(), "develop");
        assert_eq!(f.to_string(), r.to_string());
    }
}
