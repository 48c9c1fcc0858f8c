// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A four-component version, `MAJOR.MINOR.PATCH.TWEAK`.
///
/// Three-part (semver-style) versions are deliberately rejected: every
/// reference in the store must resolve to an unambiguous, fully
/// qualified version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub tweak: u32,
}

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32, tweak: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            tweak,
        }
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.patch, self.tweak)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        let [major, minor, patch, tweak]: [&str; 4] = parts.try_into().map_err(|_| Error::InvalidVersion {
            given: s.to_string(),
        })?;
        let parse_component = |c: &str| -> Result<u32> {
            c.parse().map_err(|_| Error::InvalidVersion { given: s.to_string() })
        };
        Ok(Self {
            major: parse_component(major)?,
            minor: parse_component(minor)?,
            patch: parse_component(patch)?,
            tweak: parse_component(tweak)?,
        })
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod version_test {
    use rstest::rstest;

    use super::Version;

    #[rstest]
    fn test_version_round_trip() {
        let v = Version::new(1, 0, 0, 1);
        let parsed: Version = v.to_string().parse().expect("valid version string");
        assert_eq!(v, parsed);
    }

    #[rstest]
    #[case("1.0.0")]
    #[case("1.0")]
    #[case("1.0.0.0.1")]
    #[case("1.a.0.1")]
    #[case("")]
    fn test_version_rejects_non_four_part(#[case] given: &str) {
        assert!(
            given.parse::<Version>().is_err(),
            "{given} should not parse as a four-component version"
        );
    }

    #[rstest]
    fn test_version_ordering() {
        let a: Version = "1.0.0.1".parse().unwrap();
        let b: Version = "1.0.0.2".parse().unwrap();
        assert!(a < b);
    }
}
