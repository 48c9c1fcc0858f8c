// Copyright (c) Contributors to the linyaps project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/linuxdeepin/linglong

//! `InstallFromFile`: install a locally supplied `.layer` or UAB file
//! rather than pulling one from a remote (§4.4).

use std::path::Path;
use std::process::Stdio;

use linyaps_ident::{PackageInfo, Reference};
use linyaps_store::LayerStore;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::task::{TaskHandle, TaskState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Layer,
    Uab,
}

impl std::str::FromStr for FileType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "layer" => Ok(FileType::Layer),
            "uab" => Ok(FileType::Uab),
            other => Err(Error::UnsupportedFileType(other.to_string())),
        }
    }
}

pub async fn install_from_file<S: LayerStore>(
    store: &S,
    handle: &TaskHandle,
    path: &Path,
    file_type: FileType,
) -> Result<Reference> {
    handle.emit(TaskState::PreInstall, format!("reading {}", path.display()));
    handle.check_canceled()?;
    match file_type {
        FileType::Layer => install_layer(store, handle, path).await,
        FileType::Uab => install_uab(store, handle, path).await,
    }
}

async fn mount_erofs(image: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    let mut mount = Command::new("fuse.erofs");
    mount.arg(image).arg(dest);
    mount.stdout(Stdio::null()).stderr(Stdio::piped());
    let output = mount.output().await?;
    if !output.status.success() {
        return Err(Error::CommandFailed {
            command: "fuse.erofs".to_string(),
            code: output.status.code(),
            stderr_tail: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

fn unmount_best_effort(dest: &Path) {
    let _ = std::process::Command::new("fusermount").arg("-u").arg(dest).status();
    let _ = std::fs::remove_dir_all(dest);
}

async fn install_layer<S: LayerStore>(store: &S, handle: &TaskHandle, path: &Path) -> Result<Reference> {
    let workdir = tempfile::tempdir()?;
    let mount_dir = workdir.path().join("layer");
    mount_erofs(path, &mount_dir).await?;

    let info_bytes = std::fs::read(mount_dir.join("info.json"))?;
    let info: PackageInfo = match serde_json::from_slice(&info_bytes) {
        Ok(info) => info,
        Err(_) => {
            let value: serde_json::Value = serde_json::from_slice(&info_bytes)?;
            PackageInfo::from_v1_compat(value)?
        }
    };

    handle.emit(TaskState::InstallApp, format!("importing {}", info.id));
    handle.check_canceled()?;
    let reference = store.import_layer_dir(&mount_dir, None).await?;
    store.export_reference(&reference).await?;

    unmount_best_effort(&mount_dir);
    handle.emit(TaskState::Success, format!("installed {reference}"));
    Ok(reference)
}

async fn install_uab<S: LayerStore>(store: &S, handle: &TaskHandle, path: &Path) -> Result<Reference> {
    let meta = linyaps_uab::verify(path).await?;
    let app = meta.app_layer().ok_or(linyaps_uab::Error::AppLayerMissing)?;

    let workdir = tempfile::tempdir()?;
    let bundle_dir = workdir.path().join("bundle");
    linyaps_uab::loader::unpack(path, &bundle_dir).await?;

    // Import dependency layers first, then the app layer last, so a
    // reader never observes an app reference whose base/runtime are
    // still missing.
    let mut ordered: Vec<&linyaps_uab::UabLayerMeta> = meta.layers.iter().filter(|l| l.info.id != app.info.id).collect();
    ordered.push(app);

    let mut last_reference = None;
    for layer in ordered {
        let slot = format!(
            "{}-{}-{}-{}",
            match layer.info.kind {
                linyaps_ident::Kind::App => "app",
                linyaps_ident::Kind::Runtime => "runtime",
                linyaps_ident::Kind::Base => "base",
            },
            layer.info.id,
            layer.info.version,
            layer.info.module
        );
        let layer_dir = bundle_dir.join("layers").join(&slot);
        handle.emit(TaskState::InstallRuntime, format!("importing {}", layer.info.id));
        handle.check_canceled()?;

        let sub_ref = if layer.minified {
            Some(format!("minified/{}", meta.uuid))
        } else {
            None
        };
        let reference = store.import_layer_dir(&layer_dir, sub_ref.as_deref()).await?;

        if layer.minified {
            write_minified_tag(store, &reference, &meta.uuid).await?;
        }
        last_reference = Some(reference);
    }

    let reference = last_reference.ok_or(linyaps_uab::Error::AppLayerMissing)?;
    store.export_reference(&reference).await?;
    handle.emit(TaskState::Success, format!("installed {reference}"));
    Ok(reference)
}

/// Mark a minified import with a `.minified-<layer-id>` tag file next
/// to it, and append `{app-ref, uab-uuid}` to its sibling
/// `minified.json`, written atomically via write-temp-then-rename.
async fn write_minified_tag<S: LayerStore>(store: &S, reference: &Reference, uab_uuid: &str) -> Result<()> {
    let dir = store.get_merged_module_dir(reference, None).await?;
    let tag_path = dir.join(format!(".minified-{}", reference.id));
    tokio::fs::write(&tag_path, uab_uuid).await?;

    let minified_json = dir.join("minified.json");
    let mut entries: Vec<serde_json::Value> = if minified_json.exists() {
        serde_json::from_slice(&tokio::fs::read(&minified_json).await?)?
    } else {
        Vec::new()
    };
    entries.push(serde_json::json!({ "appRef": reference.to_string(), "uabUuid": uab_uuid }));

    let tmp_path = minified_json.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, serde_json::to_vec_pretty(&entries)?).await?;
    tokio::fs::rename(&tmp_path, &minified_json).await?;
    Ok(())
}
