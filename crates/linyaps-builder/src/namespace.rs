// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! Prepare namespace (§4.3 stage 1): enter a new user+mount namespace
//! and map the host uid to root inside it, so the overlay/container
//! stages that follow can mount `fuse-overlayfs` without host root.

use nix::sched::{unshare, CloneFlags};
use nix::unistd::{getgid, getuid};

use crate::error::Result;

/// Enter a fresh user and mount namespace for the current process and
/// map the calling user/group to uid/gid 0 inside it. Must run before
/// any namespace-dependent child (fuse-overlayfs, ll-box) is spawned.
pub fn prepare() -> Result<()> {
    let uid = getuid();
    let gid = getgid();

    unshare(CloneFlags::CLONE_NEWUSER | CloneFlags::CLONE_NEWNS)?;

    std::fs::write("/proc/self/setgroups", b"deny")?;
    std::fs::write("/proc/self/uid_map", format!("0 {uid} 1"))?;
    std::fs::write("/proc/self/gid_map", format!("0 {gid} 1"))?;

    Ok(())
}
