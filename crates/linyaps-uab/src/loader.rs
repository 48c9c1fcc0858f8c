// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! The loader runtime algorithm (§4.2): what the appended-to ELF binary
//! does when a packed UAB is executed directly.

use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use linyaps_container::{ContainerConfigBuilder, ContainerOptions};
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::meta::UabMetaInfo;
use crate::section;

const DEBUG_ENV: &str = "LINGLONG_UAB_DEBUG";

/// Where the current UAB's layers are exploded to before `ll-box run` is
/// invoked. One directory per running instance, named by the UAB's uuid.
pub fn bundle_dir_for(meta: &UabMetaInfo) -> PathBuf {
    std::env::temp_dir()
        .join("linglong-uab")
        .join(&meta.uuid)
}

/// Read the metadata and bundle sections out of `self_path` (normally
/// `/proc/self/exe`) and unpack `linglong.bundle` into `bundle_dir`.
pub async fn unpack(self_path: &Path, bundle_dir: &Path) -> Result<UabMetaInfo> {
    let meta_bytes = section::dump(self_path, "linglong.meta").await?;
    let meta: UabMetaInfo = serde_json::from_slice(&meta_bytes).map_err(|_| Error::MetaMissing)?;
    if meta.version != crate::meta::META_VERSION {
        return Err(Error::UnsupportedVersion(meta.version.clone()));
    }

    std::fs::create_dir_all(bundle_dir).map_err(|source| Error::DirectoryCreate {
        path: bundle_dir.display().to_string(),
        source,
    })?;

    let erofs_path = bundle_dir.with_extension("erofs");
    let bundle_bytes = section::dump(self_path, &meta.sections.bundle).await?;
    std::fs::write(&erofs_path, bundle_bytes).map_err(Error::Io)?;

    let mut mount = Command::new("fuse.erofs");
    mount.arg(&erofs_path).arg(bundle_dir);
    mount.stdout(Stdio::null()).stderr(Stdio::piped());
    let output = mount.output().await.map_err(Error::Io)?;
    if !output.status.success() {
        return Err(Error::CommandFailed {
            command: "fuse.erofs".to_string(),
            code: output.status.code(),
            stderr_tail: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(meta)
}

/// Build a minimal [`ContainerOptions`] from the unpacked bundle's layer
/// set and hand it to `ll-box run` inside this process, propagating the
/// child's exit status or terminating signal.
pub async fn exec(meta: &UabMetaInfo, bundle_dir: &Path, args: Vec<String>) -> Result<i32> {
    let app = meta.app_layer().ok_or(Error::AppLayerMissing)?;

    let base_layer = bundle_dir.join("layers").join(format!(
        "base-{}-{}-binary",
        app.info.base.as_ref().map(|r| r.id.clone()).unwrap_or_default(),
        app.info.base.as_ref().map(|r| r.version.to_string()).unwrap_or_default(),
    ));
    let app_layer = bundle_dir.join("layers").join(format!(
        "app-{}-{}-binary",
        app.info.id, app.info.version
    ));

    let mut options = ContainerOptions::new(app.info.id.clone(), base_layer, bundle_dir.to_path_buf());
    options.runtime_layer = meta.runtime_layer().map(|_| {
        bundle_dir.join("layers").join(format!(
            "runtime-{}-{}-binary",
            app.info
                .runtime
                .as_ref()
                .map(|r| r.id.clone())
                .unwrap_or_default(),
            app.info
                .runtime
                .as_ref()
                .map(|r| r.version.to_string())
                .unwrap_or_default(),
        ))
    });
    options.app_layer = Some(app_layer);
    options
        .appended_env
        .insert("LINGLONG_APPID".to_string(), app.info.id.clone());

    let config = ContainerConfigBuilder::new(options).build()?;
    let config_path = bundle_dir.join("config.json");
    std::fs::write(&config_path, serde_json::to_vec(&config)?).map_err(Error::Io)?;

    let mut command = Command::new("ll-box");
    command.arg("run").arg("--bundle").arg(bundle_dir);
    if !args.is_empty() {
        command.arg("--").args(&args);
    }
    let status = command.status().await.map_err(Error::Io)?;

    if !std::env::var(DEBUG_ENV).map(|v| v == "1").unwrap_or(false) {
        let _ = std::fs::remove_dir_all(bundle_dir);
    }

    Ok(status.code().unwrap_or_else(|| 128 + status.signal().unwrap_or(0)))
}

/// Send `signal` to the `ll-box run` child so that signals delivered to
/// the loader (Ctrl-C, a session manager's TERM on logout) reach the
/// sandboxed application.
pub fn forward_signal(pid: i32, signal: Signal) -> Result<()> {
    nix::sys::signal::kill(Pid::from_raw(pid), signal).map_err(|err| Error::CommandFailed {
        command: "kill".to_string(),
        code: Some(err as i32),
        stderr_tail: err.to_string(),
    })
}
