// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A CPU architecture supported by the layer store and the container
/// runtime, each with a fixed GNU target triplet used to locate
/// architecture-specific library search paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    X86_64,
    Aarch64,
    Loongarch64,
    Sw64,
    Mips64el,
}

impl Arch {
    /// The GNU target triplet used when composing `ld.so.conf.d` search paths
    /// and when naming UAB/layer files.
    pub fn triplet(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64-linux-gnu",
            Arch::Aarch64 => "aarch64-linux-gnu",
            Arch::Loongarch64 => "loongarch64-linux-gnu",
            Arch::Sw64 => "sw_64-linux-gnu",
            Arch::Mips64el => "mips64el-linux-gnuabi64",
        }
    }

    /// The architecture of the machine this process is currently running on
    pub fn host() -> Result<Self> {
        match std::env::consts::ARCH {
            "x86_64" => Ok(Arch::X86_64),
            "aarch64" => Ok(Arch::Aarch64),
            "loongarch64" => Ok(Arch::Loongarch64),
            "sw_64" => Ok(Arch::Sw64),
            "mips64" | "mips64el" => Ok(Arch::Mips64el),
            other => Err(Error::UnsupportedArch(other.to_string())),
        }
    }
}

impl Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
            Arch::Loongarch64 => "loongarch64",
            Arch::Sw64 => "sw_64",
            Arch::Mips64el => "mips64el",
        };
        f.write_str(name)
    }
}

impl FromStr for Arch {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "x86_64" => Ok(Arch::X86_64),
            "aarch64" => Ok(Arch::Aarch64),
            "loongarch64" => Ok(Arch::Loongarch64),
            "sw_64" => Ok(Arch::Sw64),
            "mips64el" => Ok(Arch::Mips64el),
            other => Err(Error::UnsupportedArch(other.to_string())),
        }
    }
}

#[cfg(test)]
mod arch_test {
    use rstest::rstest;

    use super::Arch;

    #[rstest]
    #[case(Arch::X86_64)]
    #[case(Arch::Aarch64)]
    #[case(Arch::Loongarch64)]
    #[case(Arch::Sw64)]
    #[case(Arch::Mips64el)]
    fn test_arch_round_trip(#[case] arch: Arch) {
        let parsed: Arch = arch.to_string().parse().expect("valid arch string");
        assert_eq!(arch, parsed);
    }

    #[rstest]
    fn test_unsupported_arch() {
        assert!("riscv64".parse::<Arch>().is_err());
    }
}
