// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! A scoped `fuse-overlayfs` mount: lowerdir is a pulled layer's
//! `files/`, upperdir+workdir live under `linglong/overlay/build_*/`
//! (§4.3 stage 4). The mount is torn down when the guard drops, so a
//! panicking or early-returning build never leaks a stale FUSE mount.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{Error, Result};

const MOUNT_TIMEOUT: Duration = Duration::from_secs(30);

/// One lowerdir+upperdir+workdir overlay, mounted at `merged`.
pub struct Overlay {
    merged: PathBuf,
    mounted: bool,
}

impl Overlay {
    /// Create `upperdir`/`workdir`/`merged` under `scratch_dir` and
    /// mount `fuse-overlayfs` with `lower` as the read-only base.
    pub async fn mount(scratch_dir: &Path, lower: &Path) -> Result<Self> {
        let upper = scratch_dir.join("upper");
        let work = scratch_dir.join("work");
        let merged = scratch_dir.join("merged");
        for dir in [&upper, &work, &merged] {
            std::fs::create_dir_all(dir).map_err(|source| Error::DirectoryCreate {
                path: dir.clone(),
                source,
            })?;
        }

        let options = format!(
            "lowerdir={},upperdir={},workdir={}",
            lower.display(),
            upper.display(),
            work.display()
        );
        let mut command = Command::new("fuse-overlayfs");
        command.arg("-o").arg(&options).arg(&merged);
        command.stdout(Stdio::null()).stderr(Stdio::piped());

        let output = timeout(MOUNT_TIMEOUT, command.output())
            .await
            .map_err(|_| Error::CommandTimeout("fuse-overlayfs".to_string()))??;
        if !output.status.success() {
            return Err(Error::CommandFailed {
                command: "fuse-overlayfs".to_string(),
                code: output.status.code(),
                stderr_tail: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(Overlay { merged, mounted: true })
    }

    pub fn merged_dir(&self) -> &Path {
        &self.merged
    }

    pub fn upper_dir(&self) -> PathBuf {
        // upper lives as a sibling of merged under the same scratch dir
        self.merged.parent().expect("scratch dir").join("upper")
    }
}

impl Drop for Overlay {
    fn drop(&mut self) {
        if !self.mounted {
            return;
        }
        let _ = std::process::Command::new("fusermount").arg("-u").arg(&self.merged).status();
        self.mounted = false;
    }
}
